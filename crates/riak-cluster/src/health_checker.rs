use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::load_balancer::LoadBalancer;

/// Background task that brings offline nodes back.
///
/// Every `poll_interval` it pings each node in the load balancer's offline
/// set and moves the ones that answer back into the rotation. Nodes that do
/// not answer simply stay offline until the next pass. The task stops as
/// soon as the shutdown channel flips to `true` or its sender is dropped,
/// including in the middle of a pass.
pub struct HealthMonitor {
    load_balancer: Arc<LoadBalancer>,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl HealthMonitor {
    pub fn new(
        load_balancer: Arc<LoadBalancer>,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            load_balancer,
            poll_interval,
            shutdown,
        }
    }

    /// Starts the monitor task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Probes every offline node once. Returns how many were reactivated.
    pub async fn check_offline_nodes(&self) -> usize {
        probe_offline_nodes(&self.load_balancer).await
    }

    /// Main poll loop
    async fn run(mut self) {
        debug!(interval_ms = self.poll_interval.as_millis() as u64, "Health monitor started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if self.load_balancer.offline_count() == 0 {
                continue;
            }

            tokio::select! {
                _ = probe_offline_nodes(&self.load_balancer) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Health monitor stopped");
    }
}

async fn probe_offline_nodes(load_balancer: &LoadBalancer) -> usize {
    let mut recovered = 0;

    for node in load_balancer.offline_nodes() {
        match node.ping().await {
            Ok(()) => {
                if load_balancer.add_node(node.addr()) {
                    info!(addr = %node.addr(), "Node back online");
                    recovered += 1;
                }
            }
            Err(e) => {
                debug!(addr = %node.addr(), error = %e, "Node still offline");
            }
        }
    }

    recovered
}
