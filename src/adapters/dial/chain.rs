use crate::domain::{DialContext, DialError, Metadata, Network, Result};
use crate::ports::{AdapterRegistry, BoxedStream, Dialer, ProxyAdapter};
use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Dialer whose connections are tunnels opened through another configured adapter.
pub struct ChainDialer {
    adapter: Arc<dyn ProxyAdapter>,
    base: Arc<dyn Dialer>,
}

impl ChainDialer {
    pub fn new(adapter: Arc<dyn ProxyAdapter>, base: Arc<dyn Dialer>) -> Self {
        Self { adapter, base }
    }
}

#[async_trait]
impl Dialer for ChainDialer {
    async fn dial(&self, network: Network, address: &str, ctx: &DialContext) -> Result<BoxedStream> {
        if network != self.adapter.supported_network() {
            return Err(DialError::transport(
                address,
                io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("{} does not carry {network}", self.adapter.name()),
                ),
            ));
        }

        let metadata = Metadata::from_address(address)?;
        debug!(adapter = %self.adapter.name(), target = %address, "dialing through chained adapter");
        let conn = self
            .adapter
            .dial_context_with_dialer(ctx, self.base.clone(), &metadata)
            .await?;
        Ok(Box::new(conn))
    }
}

/// Resolves an optional `dialer-proxy` name into the dialer that opens the raw connection.
///
/// No name leaves `base` untouched. Names are checked against the registry and the
/// context trail before anything touches the network.
pub fn resolve(
    name: Option<&str>,
    base: Arc<dyn Dialer>,
    registry: &Weak<dyn AdapterRegistry>,
    ctx: &DialContext,
) -> Result<Arc<dyn Dialer>> {
    let Some(name) = name else {
        return Ok(base);
    };

    let adapter = registry
        .upgrade()
        .and_then(|registry| registry.lookup(name))
        .ok_or_else(|| DialError::UnknownAdapter(name.to_string()))?;

    if ctx.is_resolving(name) {
        let mut cycle = ctx.trail().to_vec();
        cycle.push(name.to_string());
        return Err(DialError::ChainCycle(cycle));
    }

    Ok(Arc::new(ChainDialer::new(adapter, base)))
}
