use crate::domain::{ConnectionInfo, Result};
use crate::ports::TrackingPort;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::info;
use uuid::Uuid;

/// Closed tunnels stay listed this long before the sweeper drops them.
const CLOSED_RETENTION: Duration = Duration::from_secs(4);

/// In-memory record of tunnels opened through the service
pub struct ConnectionTracker {
    connections: Arc<RwLock<Vec<ConnectionInfo>>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Start background sweep of closed tunnels
    pub fn start_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let connections = self.connections.clone();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(250));
            loop {
                ticker.tick().await;
                let now = Instant::now();
                connections.write().await.retain(|conn| match conn.closed_at {
                    Some(closed_at) => now.duration_since(closed_at) < CLOSED_RETENTION,
                    None => true,
                });
            }
        })
    }

    pub async fn tracked_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackingPort for ConnectionTracker {
    async fn track_connection(&self, info: ConnectionInfo) -> Result<()> {
        info!(id = %info.id, adapter = %info.adapter, target = %info.target, "tunnel opened");
        self.connections.write().await.push(info);
        Ok(())
    }

    async fn close_connection(&self, id: Uuid) -> Result<()> {
        let mut conns = self.connections.write().await;
        if let Some(conn) = conns.iter_mut().find(|c| c.id == id && c.closed_at.is_none()) {
            conn.close();
            info!(id = %id, adapter = %conn.adapter, "tunnel closed after {:?}", conn.opened_at.elapsed());
        }
        Ok(())
    }

    async fn get_active_connections(&self) -> Result<Vec<ConnectionInfo>> {
        let conns = self.connections.read().await;
        Ok(conns.iter().filter(|c| c.closed_at.is_none()).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_track_and_close() {
        let tracker = ConnectionTracker::new();
        let info = ConnectionInfo::new("p".into(), "example.com:443".into());
        let id = info.id;

        tracker.track_connection(info).await.unwrap();
        assert_eq!(tracker.get_active_connections().await.unwrap().len(), 1);

        tracker.close_connection(id).await.unwrap();
        tracker.close_connection(id).await.unwrap();
        assert!(tracker.get_active_connections().await.unwrap().is_empty());
        assert_eq!(tracker.tracked_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_is_ignored() {
        let tracker = ConnectionTracker::new();
        tracker.close_connection(Uuid::new_v4()).await.unwrap();
        assert_eq!(tracker.tracked_count().await, 0);
    }
}
