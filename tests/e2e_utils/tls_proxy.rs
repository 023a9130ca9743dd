#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::Acceptor;
use rustls::ServerConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::LazyConfigAcceptor;

use super::intermediate_proxy::{serve_connect, Behaviour};

/// What the server read from a client's ClientHello.
#[derive(Clone, Debug, Default)]
pub struct ClientHelloSeen {
    pub cipher_suites: Vec<u16>,
    pub alpn: Vec<Vec<u8>>,
}

/// CONNECT proxy behind TLS, using a freshly generated self-signed certificate for `localhost`.
pub struct TlsProxy {
    addr: SocketAddr,
    hellos: Arc<Mutex<Vec<ClientHelloSeen>>>,
    requests: Arc<Mutex<Vec<Vec<String>>>>,
    handle: JoinHandle<()>,
}

impl TlsProxy {
    pub async fn start(behaviour: Behaviour) -> std::io::Result<Self> {
        let config = Arc::new(server_config());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let hellos = Arc::new(Mutex::new(Vec::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let (seen, recorded) = (hellos.clone(), requests.clone());
        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let (config, behaviour) = (config.clone(), behaviour.clone());
                let (seen, recorded) = (seen.clone(), recorded.clone());
                tokio::spawn(async move {
                    let Ok(start) = LazyConfigAcceptor::new(Acceptor::default(), socket).await else {
                        return;
                    };
                    let hello = start.client_hello();
                    let record = ClientHelloSeen {
                        cipher_suites: hello.cipher_suites().iter().map(|suite| u16::from(*suite)).collect(),
                        alpn: hello
                            .alpn()
                            .map(|protocols| protocols.map(<[u8]>::to_vec).collect())
                            .unwrap_or_default(),
                    };
                    seen.lock().unwrap().push(record);

                    if let Ok(tls) = start.into_stream(config).await {
                        serve_connect(tls, behaviour, recorded).await;
                    }
                });
            }
        });

        Ok(Self {
            addr,
            hellos,
            requests,
            handle,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn hellos(&self) -> Vec<ClientHelloSeen> {
        self.hellos.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for TlsProxy {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn server_config() -> ServerConfig {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).expect("self-signed certificate");
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .expect("server certificate")
}
