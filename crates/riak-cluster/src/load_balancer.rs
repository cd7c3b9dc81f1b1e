use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::node::{Node, NodeState};

/// Round-robin load balancer over the online nodes.
///
/// Nodes live in exactly one of two sets: the online rotation or the offline
/// holding set. Both sets sit behind one lock so a move between them is
/// atomic. Nodes are identified by address.
pub struct LoadBalancer {
    inner: Mutex<Membership>,
}

struct Membership {
    online: VecDeque<Arc<Node>>,
    offline: Vec<Arc<Node>>,
}

impl Membership {
    fn position_online(&self, addr: &str) -> Option<usize> {
        self.online.iter().position(|n| n.addr() == addr)
    }

    fn position_offline(&self, addr: &str) -> Option<usize> {
        self.offline.iter().position(|n| n.addr() == addr)
    }
}

impl LoadBalancer {
    /// Create a load balancer with every node online, in the given order
    pub fn new(nodes: Vec<Arc<Node>>) -> Self {
        let mut online: VecDeque<Arc<Node>> = VecDeque::with_capacity(nodes.len());
        for node in nodes {
            if !online.iter().any(|n| n.addr() == node.addr()) {
                online.push_back(node);
            }
        }

        Self {
            inner: Mutex::new(Membership {
                online,
                offline: Vec::new(),
            }),
        }
    }

    /// Get the next online node using round-robin
    pub fn select_node(&self) -> Option<Arc<Node>> {
        let mut inner = self.inner.lock();

        // Rotate: move first to back, return it
        let node = inner.online.pop_front()?;
        inner.online.push_back(node.clone());
        Some(node)
    }

    /// The named node if it is online, without advancing the rotation
    pub fn online_node(&self, addr: &str) -> Option<Arc<Node>> {
        let inner = self.inner.lock();
        inner
            .position_online(addr)
            .and_then(|i| inner.online.get(i).cloned())
    }

    /// Move a node from the rotation to the offline set.
    ///
    /// Returns false, changing nothing, if the node is not online.
    pub fn remove_node(&self, addr: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.position_online(addr).and_then(|i| inner.online.remove(i)) {
            Some(node) => {
                inner.offline.push(node);
                true
            }
            None => false,
        }
    }

    /// Move an offline node back into the rotation, first in line.
    ///
    /// Returns false, changing nothing, if the node is not offline.
    pub fn add_node(&self, addr: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.position_offline(addr) {
            Some(i) => {
                let node = inner.offline.swap_remove(i);
                inner.online.push_front(node);
                true
            }
            None => false,
        }
    }

    /// Which set a node is in, or `None` if the address is unknown
    pub fn state(&self, addr: &str) -> Option<NodeState> {
        let inner = self.inner.lock();
        if inner.position_online(addr).is_some() {
            Some(NodeState::Online)
        } else if inner.position_offline(addr).is_some() {
            Some(NodeState::Offline)
        } else {
            None
        }
    }

    /// Online nodes in rotation order, next to be selected first
    pub fn online_nodes(&self) -> Vec<Arc<Node>> {
        self.inner.lock().online.iter().cloned().collect()
    }

    /// Snapshot of the offline set
    pub fn offline_nodes(&self) -> Vec<Arc<Node>> {
        self.inner.lock().offline.clone()
    }

    pub fn online_count(&self) -> usize {
        self.inner.lock().online.len()
    }

    pub fn offline_count(&self) -> usize {
        self.inner.lock().offline.len()
    }

    /// Get the number of nodes in both sets
    pub fn node_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.online.len() + inner.offline.len()
    }
}
