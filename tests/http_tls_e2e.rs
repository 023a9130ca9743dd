mod e2e_utils;

use e2e_utils::{local_tls_option, Behaviour, EchoServer, TlsProxy};
use hopdial::adapters::tls::{ClientFingerprint, ClientIdentity};
use hopdial::adapters::{AdapterEnv, ClientIdentityCatalog, HttpAdapter};
use hopdial::domain::{DialContext, DialError, Metadata};
use hopdial::ports::ProxyAdapter;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const RENEGOTIATION_INFO_SCSV: u16 = 0x00ff;

fn env() -> AdapterEnv {
    AdapterEnv::standalone(Arc::new(ClientIdentityCatalog::default()))
}

fn ctx() -> DialContext {
    DialContext::new().with_timeout(Duration::from_secs(5))
}

fn offered_suites(proxy: &TlsProxy) -> Vec<u16> {
    let hellos = proxy.hellos();
    assert_eq!(hellos.len(), 1);
    hellos[0]
        .cipher_suites
        .iter()
        .copied()
        .filter(|suite| *suite != RENEGOTIATION_INFO_SCSV)
        .collect()
}

#[tokio::test]
async fn test_tls_tunnel_with_skip_cert_verify() {
    let echo = EchoServer::start().await.expect("echo server");
    let proxy = TlsProxy::start(Behaviour::Relay).await.expect("tls proxy");

    let option = local_tls_option("secure", proxy.port(), true);
    let adapter = HttpAdapter::new(&option, &env()).expect("adapter");

    let mut conn = adapter
        .dial_context(&ctx(), &Metadata::new("127.0.0.1", echo.addr().port()), &[])
        .await
        .expect("tunnel over tls should be established");
    assert_eq!(conn.adapter().name(), "secure");

    conn.write_all(b"sealed").await.unwrap();
    let mut buf = [0u8; 6];
    conn.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"sealed");
    conn.close().await;

    let requests = proxy.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0][0], format!("CONNECT 127.0.0.1:{} HTTP/1.1", echo.addr().port()));

    // default identity is chrome, and the adapter offers no ALPN
    assert_eq!(
        offered_suites(&proxy),
        vec![0x1301, 0x1302, 0x1303, 0xc02b, 0xc02f, 0xc02c, 0xc030, 0xcca9, 0xcca8]
    );
    assert!(proxy.hellos()[0].alpn.is_empty());
}

#[tokio::test]
async fn test_untrusted_certificate_fails_handshake() {
    let proxy = TlsProxy::start(Behaviour::Relay).await.expect("tls proxy");

    let option = local_tls_option("strict", proxy.port(), false);
    let adapter = HttpAdapter::new(&option, &env()).expect("adapter");

    let err = adapter
        .dial_context(&ctx(), &Metadata::new("example.com", 443), &[])
        .await
        .expect_err("self-signed certificate must be refused");
    assert!(
        matches!(err, DialError::TlsHandshake { ref address, .. } if address == &format!("127.0.0.1:{}", proxy.port())),
        "unexpected error {err:?}"
    );
    assert!(proxy.requests().is_empty());
}

#[tokio::test]
async fn test_client_hello_follows_selected_fingerprint() {
    let proxy = TlsProxy::start(Behaviour::Answer("HTTP/1.1 200 Connection established\r\n\r\n"))
        .await
        .expect("tls proxy");

    let mut option = local_tls_option("firefox", proxy.port(), true);
    option.fingerprint = Some("firefox".into());
    let adapter = HttpAdapter::new(&option, &env()).expect("adapter");

    let mut conn = adapter
        .dial_context(&ctx(), &Metadata::new("example.com", 443), &[])
        .await
        .expect("tunnel");
    conn.close().await;

    let expected: Vec<u16> = ClientIdentity::new(ClientFingerprint::Firefox)
        .cipher_suites()
        .iter()
        .map(|suite| u16::from(suite.suite()))
        .collect();
    assert_eq!(offered_suites(&proxy), expected);
    assert_eq!(expected[..3], [0x1301, 0x1303, 0x1302]);
}
