#![cfg(test)]
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod intermediate_proxy;
pub mod tls_proxy;

pub use intermediate_proxy::{Behaviour, EchoServer, IntermediateProxy};
pub use tls_proxy::{ClientHelloSeen, TlsProxy};

use hopdial::domain::HttpOption;

/// Plaintext adapter option pointing at a local proxy port.
pub fn local_option(name: &str, port: u16) -> HttpOption {
    HttpOption {
        name: name.to_string(),
        server: "127.0.0.1".to_string(),
        port: i64::from(port),
        ..Default::default()
    }
}

/// TLS adapter option pointing at a local proxy port, with SNI `localhost`.
pub fn local_tls_option(name: &str, port: u16, skip_cert_verify: bool) -> HttpOption {
    HttpOption {
        tls: true,
        sni: Some("localhost".to_string()),
        skip_cert_verify,
        ..local_option(name, port)
    }
}
