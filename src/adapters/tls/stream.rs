use super::verifier::NoVerifier;
use crate::domain::{DialContext, DialError, Result};
use crate::ports::{BoxedStream, ClientIdentityRegistry};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Inner bound on every TLS handshake, regardless of the caller deadline.
pub const DEFAULT_TLS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsProfile {
    pub server_name: String,
    pub skip_cert_verify: bool,
    /// Unset selects the process-wide default identity.
    pub fingerprint: Option<String>,
    pub next_protos: Vec<String>,
}

/// Prebuilt client side of a TLS layer: config and server name are fixed at construction.
#[derive(Clone)]
pub struct TlsWrapper {
    connector: TlsConnector,
    server_name: ServerName<'static>,
    handshake_timeout: Duration,
}

impl std::fmt::Debug for TlsWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsWrapper")
            .field("server_name", &self.server_name)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish()
    }
}

impl TlsWrapper {
    pub fn new(profile: &TlsProfile, identities: &dyn ClientIdentityRegistry) -> Result<Self> {
        let identity = match profile.fingerprint.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => identities.identity_by_id(id)?,
            None => identities.default_identity(),
        };

        let provider = identity.crypto_provider();
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let mut config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| DialError::Configuration(format!("tls protocol versions: {e}")))?
            .with_root_certificates(roots)
            .with_no_client_auth();
        config.alpn_protocols = profile.next_protos.iter().map(|p| p.as_bytes().to_vec()).collect();
        if profile.skip_cert_verify {
            config
                .dangerous()
                .set_certificate_verifier(Arc::new(NoVerifier::new(provider)));
        }

        let server_name = ServerName::try_from(profile.server_name.clone())
            .map_err(|e| DialError::Configuration(format!("invalid server name {}: {e}", profile.server_name)))?;

        debug!(
            server_name = %profile.server_name,
            fingerprint = %identity.fingerprint(),
            "tls client config built"
        );

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            server_name,
            handshake_timeout: DEFAULT_TLS_TIMEOUT,
        })
    }

    /// Runs the client handshake over `stream`. `address` only labels errors.
    ///
    /// The effective deadline is the earlier of the inner timeout and the caller's.
    pub async fn handshake(&self, stream: BoxedStream, address: &str, ctx: &DialContext) -> Result<BoxedStream> {
        let inner = Instant::now() + self.handshake_timeout;
        let deadline = ctx.deadline().map_or(inner, |outer| outer.min(inner));

        let connect = self.connector.connect(self.server_name.clone(), stream);
        let result = tokio::select! {
            biased;
            _ = ctx.cancel_token().cancelled() => return Err(DialError::Cancelled),
            result = timeout_at(deadline, connect) => result,
        };

        match result {
            Ok(Ok(tls)) => {
                debug!(target = %address, "tls handshake complete");
                Ok(Box::new(tls))
            }
            Ok(Err(e)) => Err(DialError::tls(address, e)),
            Err(_) => Err(DialError::tls(
                address,
                io::Error::new(io::ErrorKind::TimedOut, "tls handshake timed out"),
            )),
        }
    }
}
