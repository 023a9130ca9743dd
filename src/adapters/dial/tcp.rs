use crate::domain::{DialContext, DialError, DialOptions, Network, Result};
use crate::ports::{BoxedStream, Dialer, ProxyStream};
use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tracing::debug;

const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(30);

/// Plain TCP dialer applying the folded socket options of one adapter.
#[derive(Debug, Clone, Default)]
pub struct TcpDialer {
    options: DialOptions,
}

impl TcpDialer {
    pub fn new(options: DialOptions) -> Self {
        Self { options }
    }

    async fn resolve(&self, address: &str, ctx: &DialContext) -> Result<Vec<SocketAddr>> {
        let addrs = ctx
            .run(async {
                lookup_host(address)
                    .await
                    .map_err(|e| DialError::transport(address, e))
            })
            .await?
            .collect();

        let addrs = self.options.prefer.arrange(addrs);
        if addrs.is_empty() {
            return Err(DialError::transport(
                address,
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no address matches ip version {:?}", self.options.prefer),
                ),
            ));
        }
        Ok(addrs)
    }

    fn socket_for(&self, addr: SocketAddr) -> io::Result<TcpSocket> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        #[cfg(target_os = "linux")]
        {
            let sock = SockRef::from(&socket);
            if let Some(interface) = &self.options.interface {
                sock.bind_device(Some(interface.as_bytes()))?;
            }
            if let Some(mark) = self.options.routing_mark {
                sock.set_mark(mark)?;
            }
        }

        Ok(socket)
    }

    async fn connect_one(&self, addr: SocketAddr, ctx: &DialContext) -> Result<TcpStream> {
        let socket = self
            .socket_for(addr)
            .map_err(|e| DialError::transport(addr.to_string(), e))?;
        ctx.run(async {
            socket
                .connect(addr)
                .await
                .map_err(|e| DialError::transport(addr.to_string(), e))
        })
        .await
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, network: Network, address: &str, ctx: &DialContext) -> Result<BoxedStream> {
        if network != Network::Tcp {
            return Err(DialError::transport(
                address,
                io::Error::new(io::ErrorKind::Unsupported, format!("{network} is not supported")),
            ));
        }
        if self.options.tfo {
            debug!(target = %address, "tcp fast open requested, dialing without it");
        }

        let mut last_error = None;
        for addr in self.resolve(address, ctx).await? {
            match self.connect_one(addr, ctx).await {
                Ok(stream) => {
                    debug!(target = %address, peer = %addr, "tcp connected");
                    return Ok(Box::new(stream));
                }
                Err(DialError::Transport { source, .. }) => {
                    debug!(target = %address, peer = %addr, "tcp connect failed: {}", source);
                    last_error = Some(source);
                }
                Err(e) => return Err(e),
            }
        }

        Err(DialError::transport(
            address,
            last_error.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address to dial")),
        ))
    }
}

/// Enables keep-alive when the stream bottoms out on a TCP socket. Failures are only logged.
pub fn tcp_keep_alive(stream: &dyn ProxyStream) {
    let Some(tcp) = stream.tcp_socket() else {
        return;
    };
    let sock = SockRef::from(tcp);
    let keepalive = TcpKeepalive::new()
        .with_time(KEEP_ALIVE_PERIOD)
        .with_interval(KEEP_ALIVE_PERIOD);
    if let Err(e) = sock.set_tcp_keepalive(&keepalive) {
        debug!("failed to enable tcp keep-alive: {}", e);
    }
}
