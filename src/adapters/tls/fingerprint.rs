use crate::domain::{DialError, Result};
use crate::ports::ClientIdentityRegistry;
use rustls::crypto::ring::{cipher_suite, default_provider};
use rustls::crypto::CryptoProvider;
use rustls::SupportedCipherSuite;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Browser profiles a ClientHello can be shaped after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientFingerprint {
    Chrome,
    Firefox,
    Safari,
    Ios,
    Edge,
    Android,
    Random,
    Qq,
    Browser360,
    /// Plain rustls defaults.
    None,
}

impl ClientFingerprint {
    pub const ALL: [ClientFingerprint; 10] = [
        ClientFingerprint::Chrome,
        ClientFingerprint::Firefox,
        ClientFingerprint::Safari,
        ClientFingerprint::Ios,
        ClientFingerprint::Edge,
        ClientFingerprint::Android,
        ClientFingerprint::Random,
        ClientFingerprint::Qq,
        ClientFingerprint::Browser360,
        ClientFingerprint::None,
    ];

    /// Cipher suite ids in ClientHello order. Empty means the provider defaults.
    fn cipher_suite_ids(self) -> &'static [u16] {
        match self {
            // No per-connection shuffling; random settles on the chrome ordering.
            ClientFingerprint::Chrome
            | ClientFingerprint::Edge
            | ClientFingerprint::Android
            | ClientFingerprint::Random
            | ClientFingerprint::Qq
            | ClientFingerprint::Browser360 => &[
                0x1301, 0x1302, 0x1303, 0xc02b, 0xc02f, 0xc02c, 0xc030, 0xcca9, 0xcca8, 0xc013, 0xc014,
                0x009c, 0x009d, 0x002f, 0x0035,
            ],
            ClientFingerprint::Firefox => &[
                0x1301, 0x1303, 0x1302, 0xc02b, 0xc02f, 0xcca9, 0xcca8, 0xc02c, 0xc030, 0xc013, 0xc014,
            ],
            ClientFingerprint::Safari | ClientFingerprint::Ios => &[
                0x1301, 0x1302, 0x1303, 0xc02c, 0xc02b, 0xc030, 0xc02f, 0xcca9, 0xcca8, 0xc014, 0xc013,
                0x009d, 0x009c, 0x0035, 0x002f,
            ],
            ClientFingerprint::None => &[],
        }
    }
}

impl FromStr for ClientFingerprint {
    type Err = DialError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" => Ok(Self::Chrome),
            "firefox" => Ok(Self::Firefox),
            "safari" => Ok(Self::Safari),
            "ios" => Ok(Self::Ios),
            "edge" => Ok(Self::Edge),
            "android" => Ok(Self::Android),
            "random" | "randomized" => Ok(Self::Random),
            "qq" => Ok(Self::Qq),
            "360" => Ok(Self::Browser360),
            "none" => Ok(Self::None),
            _ => Err(DialError::UnknownFingerprint(s.to_string())),
        }
    }
}

impl fmt::Display for ClientFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientFingerprint::Chrome => "chrome",
            ClientFingerprint::Firefox => "firefox",
            ClientFingerprint::Safari => "safari",
            ClientFingerprint::Ios => "ios",
            ClientFingerprint::Edge => "edge",
            ClientFingerprint::Android => "android",
            ClientFingerprint::Random => "random",
            ClientFingerprint::Qq => "qq",
            ClientFingerprint::Browser360 => "360",
            ClientFingerprint::None => "none",
        };
        f.write_str(name)
    }
}

fn ring_suite(id: u16) -> Option<SupportedCipherSuite> {
    match id {
        0x1301 => Some(cipher_suite::TLS13_AES_128_GCM_SHA256),
        0x1302 => Some(cipher_suite::TLS13_AES_256_GCM_SHA384),
        0x1303 => Some(cipher_suite::TLS13_CHACHA20_POLY1305_SHA256),
        0xc02b => Some(cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256),
        0xc02f => Some(cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256),
        0xc02c => Some(cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384),
        0xc030 => Some(cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384),
        0xcca9 => Some(cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256),
        0xcca8 => Some(cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256),
        // CBC and static RSA suites are not offered by rustls.
        _ => None,
    }
}

/// A resolved TLS client profile ready to back a rustls config.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    fingerprint: ClientFingerprint,
    cipher_suites: Vec<SupportedCipherSuite>,
}

impl ClientIdentity {
    pub fn new(fingerprint: ClientFingerprint) -> Self {
        let cipher_suites = fingerprint
            .cipher_suite_ids()
            .iter()
            .filter_map(|id| ring_suite(*id))
            .collect();
        Self {
            fingerprint,
            cipher_suites,
        }
    }

    pub fn fingerprint(&self) -> ClientFingerprint {
        self.fingerprint
    }

    pub fn cipher_suites(&self) -> &[SupportedCipherSuite] {
        &self.cipher_suites
    }

    pub fn crypto_provider(&self) -> Arc<CryptoProvider> {
        if self.cipher_suites.is_empty() {
            return Arc::new(default_provider());
        }
        Arc::new(CryptoProvider {
            cipher_suites: self.cipher_suites.clone(),
            ..default_provider()
        })
    }
}

/// Immutable set of every known client identity plus the process default.
#[derive(Debug, Clone)]
pub struct ClientIdentityCatalog {
    default: Arc<ClientIdentity>,
    identities: HashMap<ClientFingerprint, Arc<ClientIdentity>>,
}

impl ClientIdentityCatalog {
    /// `default_id` falls back to chrome when unset or empty.
    pub fn new(default_id: Option<&str>) -> Result<Self> {
        let fingerprint = match default_id.filter(|id| !id.is_empty()) {
            Some(id) => id.parse()?,
            None => ClientFingerprint::Chrome,
        };
        Ok(Self::with_default(fingerprint))
    }

    pub fn with_default(fingerprint: ClientFingerprint) -> Self {
        let identities: HashMap<_, _> = ClientFingerprint::ALL
            .iter()
            .map(|fingerprint| (*fingerprint, Arc::new(ClientIdentity::new(*fingerprint))))
            .collect();
        let default = identities
            .get(&fingerprint)
            .cloned()
            .unwrap_or_else(|| Arc::new(ClientIdentity::new(fingerprint)));
        Self { default, identities }
    }
}

impl Default for ClientIdentityCatalog {
    fn default() -> Self {
        Self::with_default(ClientFingerprint::Chrome)
    }
}

impl ClientIdentityRegistry for ClientIdentityCatalog {
    fn default_identity(&self) -> Arc<ClientIdentity> {
        self.default.clone()
    }

    fn identity_by_id(&self, id: &str) -> Result<Arc<ClientIdentity>> {
        let fingerprint: ClientFingerprint = id.parse()?;
        Ok(self
            .identities
            .get(&fingerprint)
            .cloned()
            .unwrap_or_else(|| Arc::new(ClientIdentity::new(fingerprint))))
    }
}
