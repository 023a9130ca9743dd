use crate::connection::NegotiatedConn;
use crate::domain::{AdapterIdentity, DialContext, DialOption, Metadata, Network, Result};
use crate::ports::{BoxedStream, Dialer};
use async_trait::async_trait;
use std::sync::Arc;

/// An outbound proxy that can turn a target into a negotiated tunnel.
#[async_trait]
pub trait ProxyAdapter: Send + Sync {
    fn identity(&self) -> &Arc<AdapterIdentity>;

    fn name(&self) -> &str {
        self.identity().name()
    }

    fn addr(&self) -> &str {
        self.identity().addr()
    }

    fn supported_network(&self) -> Network {
        self.identity().network()
    }

    /// Runs the optional TLS layer and the tunnel handshake over an already
    /// connected stream.
    async fn stream_conn(&self, stream: BoxedStream, metadata: &Metadata, ctx: &DialContext) -> Result<BoxedStream>;

    /// Full pipeline using the process dialer, honouring the adapter's chain setting.
    async fn dial_context(
        &self,
        ctx: &DialContext,
        metadata: &Metadata,
        overrides: &[DialOption],
    ) -> Result<NegotiatedConn>;

    /// Full pipeline where the raw connection comes from `dialer`.
    async fn dial_context_with_dialer(
        &self,
        ctx: &DialContext,
        dialer: Arc<dyn Dialer>,
        metadata: &Metadata,
    ) -> Result<NegotiatedConn>;
}

/// Read-only lookup of configured adapters by name.
pub trait AdapterRegistry: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Arc<dyn ProxyAdapter>>;
}
