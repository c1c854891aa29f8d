//! Worker threads.
//!
//! # Responsibilities
//! - Run one single-threaded tokio runtime per OS thread
//! - Receive accepted sockets from the acceptor, round-robin
//! - Keep every connection, client or upstream, on the worker that received it
//!
//! # Design Decisions
//! - Sockets cross threads as `std::net::TcpStream` and are re-registered
//!   with the receiving worker's reactor
//! - Per-worker state is built on the worker thread, so it may be `!Send`
//! - Stopping a worker drops its `LocalSet`, which cancels its connections

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::{broadcast, mpsc};
use tokio::task::LocalSet;

use crate::net::listener::ConnectionPermit;

/// A connection handed from the acceptor to a worker.
#[derive(Debug)]
pub struct Accepted {
    pub stream: std::net::TcpStream,
    pub peer: SocketAddr,
    pub permit: ConnectionPermit,
}

/// Fixed set of worker threads.
#[derive(Debug)]
pub struct WorkerPool {
    senders: Vec<mpsc::UnboundedSender<Accepted>>,
    handles: Vec<JoinHandle<()>>,
    next: usize,
}

impl WorkerPool {
    /// Start `count` workers.
    ///
    /// `factory` runs once on each worker thread, inside its `LocalSet`, and
    /// returns the function that takes over each connection dispatched to it.
    pub fn spawn<F, H>(
        count: usize,
        shutdown: &broadcast::Sender<()>,
        factory: F,
    ) -> io::Result<Self>
    where
        F: Fn(usize) -> H + Send + Sync + 'static,
        H: Fn(Accepted) + 'static,
    {
        let factory = Arc::new(factory);
        let mut senders = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);

        for id in 0..count.max(1) {
            let (tx, rx) = mpsc::unbounded_channel();
            let factory = factory.clone();
            let shutdown_rx = shutdown.subscribe();

            let handle = std::thread::Builder::new()
                .name(format!("proxy-worker-{}", id))
                .spawn(move || run_worker(id, rx, shutdown_rx, factory.as_ref()))?;

            senders.push(tx);
            handles.push(handle);
        }

        tracing::info!(workers = senders.len(), "Worker pool started");
        Ok(Self {
            senders,
            handles,
            next: 0,
        })
    }

    /// Number of workers.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Hand a connection to the next worker in turn.
    ///
    /// Skips workers that have stopped; gives the connection back if none is left.
    pub fn dispatch(&mut self, accepted: Accepted) -> Result<(), Accepted> {
        let mut accepted = accepted;
        for _ in 0..self.senders.len() {
            let index = self.next;
            self.next = (self.next + 1) % self.senders.len();

            match self.senders[index].send(accepted) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(returned)) => {
                    tracing::warn!(worker = index, "Worker stopped, trying next");
                    accepted = returned;
                }
            }
        }
        Err(accepted)
    }

    /// Stop feeding the workers and wait for their threads to exit.
    pub fn join(self) {
        drop(self.senders);
        for (id, handle) in self.handles.into_iter().enumerate() {
            if handle.join().is_err() {
                tracing::error!(worker = id, "Worker thread panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

fn run_worker<F, H>(
    id: usize,
    mut rx: mpsc::UnboundedReceiver<Accepted>,
    mut shutdown: broadcast::Receiver<()>,
    factory: &F,
) where
    F: Fn(usize) -> H,
    H: Fn(Accepted) + 'static,
{
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(worker = id, error = %e, "Failed to build worker runtime");
            return;
        }
    };

    let local = LocalSet::new();
    local.block_on(&runtime, async move {
        let handler = factory(id);
        tracing::debug!(worker = id, "Worker started");

        loop {
            tokio::select! {
                accepted = rx.recv() => match accepted {
                    Some(accepted) => handler(accepted),
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }

        tracing::debug!(worker = id, "Worker stopping");
    });
}
