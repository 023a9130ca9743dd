use crate::adapters::tls::ClientIdentity;
use crate::domain::Result;
use std::sync::Arc;

/// Source of TLS client identities used to shape the ClientHello.
pub trait ClientIdentityRegistry: Send + Sync {
    /// Identity used when an adapter does not ask for a fingerprint.
    fn default_identity(&self) -> Arc<ClientIdentity>;

    /// Fails with `UnknownFingerprint` when `id` names no known profile.
    fn identity_by_id(&self, id: &str) -> Result<Arc<ClientIdentity>>;
}
