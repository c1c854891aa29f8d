//! Client connection identity and liveness.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Expose whether a client connection is still open to the proxy engine
//! - Detect peer close on the socket itself (EOF or I/O error)

use std::cell::Cell;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a client or upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle to the client connection a request arrived on.
///
/// Cheap to clone; all clones observe the same closed flag. Not `Send`:
/// a client connection never leaves the worker that accepted it.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    closed: Rc<Cell<bool>>,
}

impl ClientHandle {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            peer: Some(peer),
            closed: Rc::new(Cell::new(false)),
        }
    }

    /// A handle not bound to any socket.
    pub fn detached() -> Self {
        Self {
            id: ConnectionId::new(),
            peer: None,
            closed: Rc::new(Cell::new(false)),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// True once the client went away; no response can be delivered.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn mark_closed(&self) {
        self.closed.set(true);
    }

    /// Wrap the client socket so EOF and I/O errors mark this handle closed.
    pub fn track<T>(&self, io: T) -> TrackedIo<T> {
        TrackedIo {
            inner: io,
            closed: self.closed.clone(),
        }
    }
}

/// I/O wrapper that flags the owning [`ClientHandle`] closed on EOF or error.
#[derive(Debug)]
pub struct TrackedIo<T> {
    inner: T,
    closed: Rc<Cell<bool>>,
}

impl<T: AsyncRead + Unpin> AsyncRead for TrackedIo<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let wanted = buf.remaining() > 0;

        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        match &poll {
            Poll::Ready(Ok(())) if wanted && buf.filled().len() == before => this.closed.set(true),
            Poll::Ready(Err(_)) => this.closed.set(true),
            _ => {}
        }
        poll
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for TrackedIo<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Err(_)) = &poll {
            this.closed.set(true);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn client_handle_clones_share_state() {
        let client = ClientHandle::detached();
        let clone = client.clone();
        assert!(!clone.is_closed());
        client.mark_closed();
        assert!(clone.is_closed());
        assert_eq!(client.id(), clone.id());
    }

    #[tokio::test]
    async fn tracked_io_flags_eof() {
        let client = ClientHandle::detached();
        let (near, mut far) = tokio::io::duplex(64);
        let mut io = client.track(near);

        far.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        io.read_exact(&mut buf).await.unwrap();
        assert!(!client.is_closed());

        drop(far);
        let n = io.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
        assert!(client.is_closed());
    }
}
