use std::fmt;
use std::io;

use thiserror::Error;

/// Why a remote proxy actively refused to open a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AuthRequired,
    MethodNotAllowed,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::AuthRequired => write!(f, "HTTP need auth"),
            Rejection::MethodNotAllowed => write!(f, "CONNECT method not allowed by proxy"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("unknown fingerprint: {0}")]
    UnknownFingerprint(String),
    #[error("unknown adapter: {0}")]
    UnknownAdapter(String),
    #[error("dialer chain cycle: {}", .0.join(" -> "))]
    ChainCycle(Vec<String>),
    #[error("{address} connect error: {source}")]
    Transport {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("{address} tls handshake error: {source}")]
    TlsHandshake {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Rejected(Rejection),
    #[error("can not connect remote: {0}")]
    Failed(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation timed out")]
    Timeout,
}

impl DialError {
    pub fn transport(address: impl Into<String>, source: io::Error) -> Self {
        DialError::Transport {
            address: address.into(),
            source,
        }
    }

    pub fn tls(address: impl Into<String>, source: io::Error) -> Self {
        DialError::TlsHandshake {
            address: address.into(),
            source,
        }
    }

    /// Errors detected while building an adapter, before any connection attempt.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DialError::Configuration(_) | DialError::UnknownFingerprint(_)
        )
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            DialError::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DialError>;
