use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::domain::AdapterIdentity;
use crate::ports::{BoxedStream, ProxyStream};

/// A tunnel that finished negotiation, tagged with the adapter that produced it.
///
/// Dropping the connection closes the underlying stream. [`close`](Self::close)
/// shuts it down explicitly and may be called any number of times.
pub struct NegotiatedConn {
    inner: Option<BoxedStream>,
    adapter: Arc<AdapterIdentity>,
}

impl NegotiatedConn {
    pub fn new(inner: BoxedStream, adapter: Arc<AdapterIdentity>) -> Self {
        Self {
            inner: Some(inner),
            adapter,
        }
    }

    pub fn adapter(&self) -> &AdapterIdentity {
        &self.adapter
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    pub async fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            if let Err(e) = inner.shutdown().await {
                debug!(adapter = %self.adapter, "shutdown on close failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for NegotiatedConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiatedConn")
            .field("adapter", &self.adapter.to_string())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection closed")
}

impl AsyncRead for NegotiatedConn {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.inner.as_mut() {
            Some(inner) => Pin::new(inner).poll_read(cx, buf),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl AsyncWrite for NegotiatedConn {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.inner.as_mut() {
            Some(inner) => Pin::new(inner).poll_write(cx, buf),
            None => Poll::Ready(Err(closed())),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.inner.as_mut() {
            Some(inner) => Pin::new(inner).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.inner.as_mut() {
            Some(inner) => Pin::new(inner).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl ProxyStream for NegotiatedConn {
    fn tcp_socket(&self) -> Option<&TcpStream> {
        self.inner.as_ref().and_then(|inner| inner.tcp_socket())
    }
}
