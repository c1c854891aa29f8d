//! Worker-local state.

use std::cell::RefCell;

use crate::load_balancer::ServerDescriptor;
use crate::proxy::cache::ConnectionCache;
use crate::upstream::Upstream;

/// State owned by one worker and shared by every request it serves.
///
/// Borrows of the cache are confined to single calls here and are never
/// held across an await point.
#[derive(Debug)]
pub struct WorkerContext<C> {
    id: usize,
    cache: RefCell<ConnectionCache<C>>,
}

impl<C: Upstream> WorkerContext<C> {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            cache: RefCell::new(ConnectionCache::new()),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn acquire(&self, pool: &str, server: &ServerDescriptor) -> Option<C> {
        self.cache.borrow_mut().acquire(pool, server)
    }

    pub fn release(&self, pool: &str, conn: C) -> bool {
        self.cache.borrow_mut().release(pool, conn)
    }

    pub fn idle_count(&self, pool: &str) -> usize {
        self.cache.borrow().idle_count(pool)
    }
}
