use super::handshake::shake_hand;
use crate::adapters::dial::{self, tcp_keep_alive, TcpDialer};
use crate::adapters::registry::AdapterEnv;
use crate::adapters::tls::{TlsProfile, TlsWrapper};
use crate::connection::NegotiatedConn;
use crate::domain::{
    AdapterIdentity, Credentials, DialContext, DialError, DialOption, DialOptions, HandshakeRequest, HttpOption,
    Metadata, Network, Result,
};
use crate::ports::{AdapterRegistry, BoxedStream, Dialer, ProxyAdapter};
use async_trait::async_trait;
use hyper::header::{HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Outbound adapter speaking HTTP CONNECT, optionally over TLS.
pub struct HttpAdapter {
    identity: Arc<AdapterIdentity>,
    credentials: Option<Credentials>,
    headers: BTreeMap<String, String>,
    tls: Option<TlsWrapper>,
    dialer_proxy: Option<String>,
    registry: Weak<dyn AdapterRegistry>,
}

impl HttpAdapter {
    pub fn new(option: &HttpOption, env: &AdapterEnv) -> Result<Self> {
        let identity = AdapterIdentity::new(option.name.clone(), &option.server, option.port, option.dial_options())?;

        for (key, value) in &option.headers {
            HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| DialError::Configuration(format!("{}: header {key:?}: {e}", option.name)))?;
            HeaderValue::from_str(value)
                .map_err(|e| DialError::Configuration(format!("{}: header {key:?} value: {e}", option.name)))?;
        }

        let tls = if option.tls {
            let profile = TlsProfile {
                server_name: option.server_name().to_string(),
                skip_cert_verify: option.skip_cert_verify,
                fingerprint: option.fingerprint.clone(),
                next_protos: Vec::new(),
            };
            Some(TlsWrapper::new(&profile, env.identities.as_ref())?)
        } else {
            None
        };

        Ok(Self {
            identity: Arc::new(identity),
            credentials: option.credentials(),
            headers: option.headers.clone(),
            tls,
            dialer_proxy: option.dialer_proxy().map(str::to_string),
            registry: env.registry.clone(),
        })
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    fn handshake_request(&self, metadata: &Metadata) -> HandshakeRequest {
        HandshakeRequest::new(metadata.remote_address())
            .with_credentials(self.credentials.clone())
            .with_headers(self.headers.clone())
    }
}

#[async_trait]
impl ProxyAdapter for HttpAdapter {
    fn identity(&self) -> &Arc<AdapterIdentity> {
        &self.identity
    }

    async fn stream_conn(&self, stream: BoxedStream, metadata: &Metadata, ctx: &DialContext) -> Result<BoxedStream> {
        let stream = match &self.tls {
            Some(tls) => tls.handshake(stream, self.addr(), ctx).await?,
            None => stream,
        };
        shake_hand(stream, &self.handshake_request(metadata), self.addr(), ctx).await
    }

    async fn dial_context(
        &self,
        ctx: &DialContext,
        metadata: &Metadata,
        overrides: &[DialOption],
    ) -> Result<NegotiatedConn> {
        let options = DialOptions::from_list(&self.identity.dial_options(overrides));
        self.dial_context_with_dialer(ctx, Arc::new(TcpDialer::new(options)), metadata)
            .await
    }

    async fn dial_context_with_dialer(
        &self,
        ctx: &DialContext,
        dialer: Arc<dyn Dialer>,
        metadata: &Metadata,
    ) -> Result<NegotiatedConn> {
        let ctx = ctx.enter(self.name())?;
        let dialer = dial::resolve(self.dialer_proxy.as_deref(), dialer, &self.registry, &ctx)?;

        let stream = dialer.dial(Network::Tcp, self.addr(), &ctx).await?;
        tcp_keep_alive(stream.as_ref());
        debug!(adapter = %self.identity, chained = ?self.dialer_proxy, "proxy connected");

        let stream = self.stream_conn(stream, metadata, &ctx).await?;
        info!(adapter = %self.identity, target = %metadata.remote_address(), "tunnel established");
        Ok(NegotiatedConn::new(stream, self.identity.clone()))
    }
}
