//! # Riak CLI
//!
//! Probe a Riak cluster from the command line.
//!
//! ## Usage
//!
//! ```bash
//! # Ping every node once through the round-robin cluster
//! riak-cli ping -n 10.0.0.1:8087 -n 10.0.0.2:8087
//!
//! # Print node name and server version
//! riak-cli info -n 10.0.0.1
//!
//! # Stream the keys of a bucket
//! riak-cli list-keys users -n 10.0.0.1
//! ```
//!
//! Nodes default to `127.0.0.1:8087`. Credentials are read from
//! `RIAK_USER` and `RIAK_PASSWORD` when both are set.

use anyhow::Result;
use argh::FromArgs;
use futures::StreamExt;
use riak_cli::cluster_config;
use riak_cluster::{Cluster, Credentials};

/// Riak cluster command-line probe
#[derive(FromArgs)]
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Ping(PingArgs),
    Info(InfoArgs),
    ListKeys(ListKeysArgs),
}

/// Ping nodes through the cluster
#[derive(FromArgs)]
#[argh(subcommand, name = "ping")]
struct PingArgs {
    /// node address as host[:port], repeatable
    #[argh(option, short = 'n', long = "node")]
    nodes: Vec<String>,

    /// number of pings to send
    #[argh(option, short = 'c', default = "1")]
    count: u32,

    /// attempts per operation, including the first
    #[argh(option, long = "attempts", default = "3")]
    attempts: u32,

    /// wait between attempts in milliseconds
    #[argh(option, long = "retry-wait", default = "200")]
    retry_wait_ms: u64,
}

/// Print server info of the next node in rotation
#[derive(FromArgs)]
#[argh(subcommand, name = "info")]
struct InfoArgs {
    /// node address as host[:port], repeatable
    #[argh(option, short = 'n', long = "node")]
    nodes: Vec<String>,

    /// attempts per operation, including the first
    #[argh(option, long = "attempts", default = "3")]
    attempts: u32,

    /// wait between attempts in milliseconds
    #[argh(option, long = "retry-wait", default = "200")]
    retry_wait_ms: u64,
}

/// Stream every key in a bucket
#[derive(FromArgs)]
#[argh(subcommand, name = "list-keys")]
struct ListKeysArgs {
    /// bucket to list
    #[argh(positional)]
    bucket: String,

    /// node address as host[:port], repeatable
    #[argh(option, short = 'n', long = "node")]
    nodes: Vec<String>,

    /// attempts per operation, including the first
    #[argh(option, long = "attempts", default = "3")]
    attempts: u32,

    /// wait between attempts in milliseconds
    #[argh(option, long = "retry-wait", default = "200")]
    retry_wait_ms: u64,
}

fn credentials_from_env() -> Option<Credentials> {
    let username = std::env::var("RIAK_USER").ok()?;
    let password = std::env::var("RIAK_PASSWORD").ok()?;
    Some(Credentials::new(username, password))
}

async fn connect(nodes: &[String], attempts: u32, wait_ms: u64) -> Result<Cluster> {
    let mut config = cluster_config(nodes, attempts, wait_ms)?;
    config.credentials = credentials_from_env();
    tracing::debug!(nodes = config.nodes.len(), "Connecting to cluster");
    Ok(Cluster::new(config).await?)
}

/// Prints keys as pages arrive. Returns how many were printed.
async fn print_keys(cluster: &Cluster, bucket: &str) -> Result<usize> {
    let mut pages = cluster.list_keys(bucket).await?;
    let mut count = 0;
    while let Some(page) = pages.next().await {
        for key in page?.keys {
            println!("{key}");
            count += 1;
        }
    }
    Ok(count)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Set default log level to INFO, but allow RUST_LOG env var to override.
    // Logs go to stderr so command output stays pipeable.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ping(args) => {
            let cluster = connect(&args.nodes, args.attempts, args.retry_wait_ms).await?;
            let mut failures = 0;
            for i in 0..args.count {
                let start = tokio::time::Instant::now();
                match cluster.ping().await {
                    Ok(()) => println!("pong {} in {:?}", i + 1, start.elapsed()),
                    Err(e) => {
                        failures += 1;
                        println!("ping {} failed: {} ({:?})", i + 1, e, e.result_code());
                    }
                }
            }
            println!(
                "{} online, {} offline",
                cluster.load_balancer().online_count(),
                cluster.load_balancer().offline_count()
            );
            cluster.shutdown().await;
            if failures > 0 {
                anyhow::bail!("{failures} of {} pings failed", args.count);
            }
        }
        Commands::Info(args) => {
            let cluster = connect(&args.nodes, args.attempts, args.retry_wait_ms).await?;
            let result = cluster.server_info().await;
            cluster.shutdown().await;
            let info = result?;
            println!("node: {}", info.node.as_deref().unwrap_or("unknown"));
            println!(
                "server_version: {}",
                info.server_version.as_deref().unwrap_or("unknown")
            );
        }
        Commands::ListKeys(args) => {
            let cluster = connect(&args.nodes, args.attempts, args.retry_wait_ms).await?;
            let result = print_keys(&cluster, &args.bucket).await;
            cluster.shutdown().await;
            let count = result?;
            tracing::info!(bucket = %args.bucket, count, "Listed keys");
        }
    }

    Ok(())
}
