use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::{ConnectionInfo, DialContext, DialError, DialOption, Metadata, Result};
use crate::connection::NegotiatedConn;
use crate::ports::{AdapterRegistry, TrackingPort};

/// Dials targets through named adapters and keeps the tunnel ledger.
#[derive(Clone)]
pub struct ConnectService {
    registry: Arc<dyn AdapterRegistry>,
    tracker: Arc<dyn TrackingPort>,
}

impl ConnectService {
    pub fn new(registry: Arc<dyn AdapterRegistry>, tracker: Arc<dyn TrackingPort>) -> Self {
        Self { registry, tracker }
    }

    pub async fn connect(
        &self,
        adapter: &str,
        metadata: &Metadata,
        ctx: &DialContext,
        overrides: &[DialOption],
    ) -> Result<(Uuid, NegotiatedConn)> {
        let proxy = self
            .registry
            .lookup(adapter)
            .ok_or_else(|| DialError::UnknownAdapter(adapter.to_string()))?;

        let conn = match proxy.dial_context(ctx, metadata, overrides).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(adapter = %adapter, target = %metadata.remote_address(), "dial failed: {}", e);
                return Err(e);
            }
        };

        let info = ConnectionInfo::new(adapter.to_string(), metadata.remote_address());
        let id = info.id;
        self.tracker.track_connection(info).await?;

        Ok((id, conn))
    }

    pub async fn close_connection(&self, id: Uuid) -> Result<()> {
        self.tracker.close_connection(id).await
    }
}
