//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::ServerDescriptor, LoadBalancer};

/// How the counter is reduced to a server index.
#[derive(Debug, Clone, Copy)]
enum Chooser {
    /// Pool size is a power of two: `counter & mask`.
    Mask(usize),
    /// Any other non-empty size: `counter % len`.
    Modulo(usize),
    Empty,
}

impl Chooser {
    fn for_len(len: usize) -> Self {
        if len == 0 {
            Chooser::Empty
        } else if len.is_power_of_two() {
            Chooser::Mask(len - 1)
        } else {
            Chooser::Modulo(len)
        }
    }
}

/// Round-robin selector over a fixed set of servers.
///
/// The counter is shared by every worker selecting from this pool; a single
/// `fetch_add` per call means no selection is ever lost. `fetch_add` wraps on
/// overflow and both reductions stay in range for any counter value.
#[derive(Debug)]
pub struct RoundRobin {
    servers: Box<[Arc<ServerDescriptor>]>,
    counter: AtomicUsize,
    chooser: Chooser,
}

impl RoundRobin {
    pub fn new(servers: Vec<Arc<ServerDescriptor>>) -> Self {
        Self::starting_at(servers, 0)
    }

    fn starting_at(servers: Vec<Arc<ServerDescriptor>>, start: usize) -> Self {
        let chooser = Chooser::for_len(servers.len());
        Self {
            servers: servers.into_boxed_slice(),
            counter: AtomicUsize::new(start),
            chooser,
        }
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self) -> Option<Arc<ServerDescriptor>> {
        let index = match self.chooser {
            Chooser::Empty => return None,
            Chooser::Mask(mask) => self.counter.fetch_add(1, Ordering::Relaxed) & mask,
            Chooser::Modulo(len) => self.counter.fetch_add(1, Ordering::Relaxed) % len,
        };
        self.servers.get(index).cloned()
    }

    fn servers(&self) -> &[Arc<ServerDescriptor>] {
        &self.servers
    }
}
