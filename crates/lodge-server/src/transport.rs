//! TCP transport with keep-alive and a per-connection idle timeout.
//!
//! [`GuardedListener`] plugs into `axum::serve` in place of a plain
//! `TcpListener`. Every accepted stream is wrapped in a [`GuardedStream`],
//! which fails the connection once no bytes have moved in either direction
//! for the idle timeout, and logs I/O errors before handing them to hyper.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::{Instant, Sleep};

/// Pending connections the kernel queues before `accept`.
const LISTEN_BACKLOG: u32 = 1024;

/// Listener that hands out [`GuardedStream`]s.
#[derive(Debug)]
pub struct GuardedListener {
    inner: TcpListener,
    idle_timeout: Duration,
}

impl GuardedListener {
    /// Bind a listener on `addr`.
    ///
    /// SO_KEEPALIVE set on the listening socket is inherited by accepted ones.
    pub fn bind(addr: SocketAddr, keepalive: bool, idle_timeout: Duration) -> io::Result<Self> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.set_keepalive(keepalive)?;
        socket.bind(addr)?;
        let inner = socket.listen(LISTEN_BACKLOG)?;

        Ok(Self {
            inner,
            idle_timeout,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

impl axum::serve::Listener for GuardedListener {
    type Io = GuardedStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
                    }
                    tracing::trace!(peer = %peer, "Connection accepted");
                    return (GuardedStream::new(stream, peer, self.idle_timeout), peer);
                }
                Err(e) if is_connection_error(&e) => continue,
                Err(e) => {
                    // Usually fd exhaustion; back off instead of spinning.
                    tracing::error!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream
// ─────────────────────────────────────────────────────────────────────────────

/// Accepted connection guarded by an idle deadline.
#[derive(Debug)]
pub struct GuardedStream {
    inner: TcpStream,
    peer: SocketAddr,
    idle_timeout: Duration,
    deadline: Pin<Box<Sleep>>,
    faulted: bool,
}

impl GuardedStream {
    fn new(inner: TcpStream, peer: SocketAddr, idle_timeout: Duration) -> Self {
        Self {
            inner,
            peer,
            idle_timeout,
            deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            faulted: false,
        }
    }

    /// Whether the connection has hit an error or timed out.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    fn touch(&mut self) {
        let next = Instant::now() + self.idle_timeout;
        self.deadline.as_mut().reset(next);
    }

    fn fault(&mut self, error: io::Error) -> io::Error {
        if !self.faulted {
            self.faulted = true;
            if error.kind() == io::ErrorKind::TimedOut {
                tracing::debug!(peer = %self.peer, "Connection idle timeout");
            } else {
                tracing::warn!(peer = %self.peer, error = %error, "Connection error");
            }
        }
        error
    }

    /// Turn a pending poll into a timeout once the deadline passes.
    fn poll_idle<T>(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<T>> {
        match self.deadline.as_mut().poll(cx) {
            Poll::Ready(()) => {
                let error = io::Error::new(io::ErrorKind::TimedOut, "connection idle timeout");
                Poll::Ready(Err(self.fault(error)))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn settle<T>(&mut self, poll: Poll<io::Result<T>>, cx: &mut Context<'_>) -> Poll<io::Result<T>> {
        match poll {
            Poll::Ready(Ok(value)) => {
                self.touch();
                Poll::Ready(Ok(value))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(self.fault(e))),
            Poll::Pending => self.poll_idle(cx),
        }
    }
}

impl AsyncRead for GuardedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        this.settle(poll, cx)
    }
}

impl AsyncWrite for GuardedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        this.settle(poll, cx)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_flush(cx);
        this.settle(poll, cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_shutdown(cx) {
            Poll::Ready(Err(e)) => Poll::Ready(Err(this.fault(e))),
            other => other,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
