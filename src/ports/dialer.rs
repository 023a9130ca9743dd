use crate::domain::{DialContext, Network, Result};
use async_trait::async_trait;
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// A duplex byte stream produced by any stage of the pipeline.
pub trait ProxyStream: AsyncRead + AsyncWrite + Send + Unpin {
    /// The TCP socket at the bottom of this stream, if there is one.
    fn tcp_socket(&self) -> Option<&TcpStream> {
        None
    }
}

pub type BoxedStream = Box<dyn ProxyStream>;

impl ProxyStream for TcpStream {
    fn tcp_socket(&self) -> Option<&TcpStream> {
        Some(self)
    }
}

impl ProxyStream for BoxedStream {
    fn tcp_socket(&self) -> Option<&TcpStream> {
        (**self).tcp_socket()
    }
}

impl<S: ProxyStream> ProxyStream for TlsStream<S> {
    fn tcp_socket(&self) -> Option<&TcpStream> {
        self.get_ref().0.tcp_socket()
    }
}

impl ProxyStream for TokioIo<Upgraded> {}

impl ProxyStream for DuplexStream {}

/// Port for opening raw transport connections
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, network: Network, address: &str, ctx: &DialContext) -> Result<BoxedStream>;
}
