//! # Riak CLI
//!
//! Helpers behind the `riak-cli` binary: turning command-line node
//! addresses into cluster configuration.

use anyhow::{bail, Context, Result};
use riak_cluster::{ClusterConfig, NodeConfig, RetryConfig};

/// Default protocol buffers port of a Riak node.
pub const DEFAULT_PORT: u16 = 8087;

/// Parse `host` or `host:port` into a node configuration.
pub fn parse_node(addr: &str) -> Result<NodeConfig> {
    let addr = addr.trim();
    if addr.is_empty() {
        bail!("node address must not be empty");
    }

    let (host, port) = match addr.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid port in node address '{addr}'"))?;
            (host, port)
        }
        None => (addr, DEFAULT_PORT),
    };

    if host.is_empty() {
        bail!("missing host in node address '{addr}'");
    }
    if port == 0 {
        bail!("port must be non-zero in node address '{addr}'");
    }

    Ok(NodeConfig::new(host, port))
}

/// Build a validated cluster configuration from node addresses.
///
/// With no addresses the cluster points at a single local node.
pub fn cluster_config(nodes: &[String], attempts: u32, wait_ms: u64) -> Result<ClusterConfig> {
    let nodes = if nodes.is_empty() {
        vec![NodeConfig::default()]
    } else {
        nodes
            .iter()
            .map(|node| parse_node(node))
            .collect::<Result<Vec<_>>>()?
    };

    let config = ClusterConfig {
        nodes,
        retry: RetryConfig { attempts, wait_ms },
        ..Default::default()
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests;
