//! Per-worker idle connection cache.
//!
//! # Responsibilities
//! - Keep idle upstream sessions per pool, most recently released first
//! - Hand out a session for a specific server, dropping dead ones on the way
//! - Refuse sessions beyond a server's keep-alive budget
//!
//! # Design Decisions
//! - Owned by exactly one worker, so no locking and no atomics
//! - A session lives in at most one place: the cache or one in-flight request

use std::collections::{HashMap, VecDeque};

use crate::load_balancer::ServerDescriptor;
use crate::upstream::Upstream;

/// Idle upstream sessions keyed by pool name.
#[derive(Debug)]
pub struct ConnectionCache<C> {
    idle: HashMap<String, VecDeque<C>>,
}

impl<C> Default for ConnectionCache<C> {
    fn default() -> Self {
        Self {
            idle: HashMap::new(),
        }
    }
}

impl<C: Upstream> ConnectionCache<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take an idle session to `server` from `pool`, if one is cached.
    ///
    /// Closed sessions found in the pool are dropped.
    pub fn acquire(&mut self, pool: &str, server: &ServerDescriptor) -> Option<C> {
        let idle = self.idle.get_mut(pool)?;

        idle.retain(|conn| {
            let open = conn.is_open();
            if !open {
                tracing::trace!(connection_id = %conn.id(), server = %conn.server(), "Pruning closed idle connection");
            }
            open
        });

        let position = idle.iter().position(|conn| conn.server() == server);
        let conn = position.and_then(|position| idle.remove(position));

        if idle.is_empty() {
            self.idle.remove(pool);
        }
        conn
    }

    /// Return a session to `pool` for reuse.
    ///
    /// Returns false, and drops the session, if it is closed or its server
    /// already has `keepalive` idle sessions in this cache.
    pub fn release(&mut self, pool: &str, conn: C) -> bool {
        if !conn.is_open() {
            return false;
        }

        let budget = conn.server().keepalive;
        let idle = self.idle.entry(pool.to_string()).or_default();
        let cached_for_server = idle
            .iter()
            .filter(|cached| cached.server() == conn.server())
            .count();

        if cached_for_server >= budget {
            tracing::trace!(
                connection_id = %conn.id(),
                server = %conn.server(),
                budget,
                "Keep-alive budget reached, dropping connection"
            );
            if idle.is_empty() {
                self.idle.remove(pool);
            }
            return false;
        }

        idle.push_front(conn);
        true
    }

    /// Number of idle sessions cached for `pool`.
    pub fn idle_count(&self, pool: &str) -> usize {
        self.idle.get(pool).map_or(0, VecDeque::len)
    }

    /// Number of idle sessions across all pools.
    pub fn total_idle(&self) -> usize {
        self.idle.values().map(VecDeque::len).sum()
    }
}
