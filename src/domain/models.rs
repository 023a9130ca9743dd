use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use super::{DialError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Udp,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
            Network::Udp => write!(f, "udp"),
        }
    }
}

/// Address family preference applied to resolved proxy addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IpVersion {
    #[default]
    Dual,
    Ipv4,
    Ipv6,
    Ipv4Prefer,
    Ipv6Prefer,
}

impl IpVersion {
    /// Filters or reorders addresses; relative order within a family is kept.
    pub fn arrange(self, addrs: Vec<SocketAddr>) -> Vec<SocketAddr> {
        match self {
            IpVersion::Dual => addrs,
            IpVersion::Ipv4 => addrs.into_iter().filter(SocketAddr::is_ipv4).collect(),
            IpVersion::Ipv6 => addrs.into_iter().filter(SocketAddr::is_ipv6).collect(),
            IpVersion::Ipv4Prefer => {
                let (mut first, rest): (Vec<_>, Vec<_>) = addrs.into_iter().partition(SocketAddr::is_ipv4);
                first.extend(rest);
                first
            }
            IpVersion::Ipv6Prefer => {
                let (mut first, rest): (Vec<_>, Vec<_>) = addrs.into_iter().partition(SocketAddr::is_ipv6);
                first.extend(rest);
                first
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialOption {
    Interface(String),
    RoutingMark(u32),
    TcpFastOpen(bool),
    Prefer(IpVersion),
}

/// Effective socket settings after folding a list of [`DialOption`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialOptions {
    pub interface: Option<String>,
    pub routing_mark: Option<u32>,
    pub tfo: bool,
    pub prefer: IpVersion,
}

impl DialOptions {
    /// Later options win over earlier ones.
    pub fn from_list(options: &[DialOption]) -> Self {
        let mut folded = DialOptions::default();
        for option in options {
            match option {
                DialOption::Interface(name) => folded.interface = Some(name.clone()),
                DialOption::RoutingMark(mark) => folded.routing_mark = Some(*mark),
                DialOption::TcpFastOpen(enabled) => folded.tfo = *enabled,
                DialOption::Prefer(version) => folded.prefer = *version,
            }
        }
        folded
    }
}

/// Immutable description of one configured proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterIdentity {
    name: String,
    addr: String,
    network: Network,
    options: DialOptions,
}

impl AdapterIdentity {
    pub fn new(name: impl Into<String>, server: &str, port: i64, options: DialOptions) -> Result<Self> {
        let name = name.into();
        if server.trim().is_empty() {
            return Err(DialError::Configuration(format!("{name}: server is empty")));
        }
        let port = u16::try_from(port)
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| DialError::Configuration(format!("{name}: port {port} out of range 1-65535")))?;

        Ok(Self {
            name,
            addr: join_host_port(server, port),
            network: Network::Tcp,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Caller overrides first, then this adapter's configured settings.
    pub fn dial_options(&self, overrides: &[DialOption]) -> Vec<DialOption> {
        let mut options = overrides.to_vec();
        if let Some(interface) = &self.options.interface {
            options.push(DialOption::Interface(interface.clone()));
        }
        if let Some(mark) = self.options.routing_mark {
            options.push(DialOption::RoutingMark(mark));
        }
        if self.options.prefer != IpVersion::Dual {
            options.push(DialOption::Prefer(self.options.prefer));
        }
        if self.options.tfo {
            options.push(DialOption::TcpFastOpen(true));
        }
        options
    }
}

impl fmt::Display for AdapterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.addr)
    }
}

/// Formats `host:port`, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Final destination of a tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub host: String,
    pub port: u16,
}

impl Metadata {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn from_address(address: &str) -> Result<Self> {
        let invalid = || DialError::Configuration(format!("invalid address: {address}"));
        let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }

    pub fn remote_address(&self) -> String {
        join_host_port(&self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Only a full username/password pair is ever sent.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn to_basic_auth(&self) -> String {
        use base64::Engine;
        let credentials = format!("{}:{}", self.username, self.password);
        format!("Basic {}", base64::prelude::BASE64_STANDARD.encode(credentials))
    }
}

/// Everything needed to negotiate one CONNECT tunnel. Built per attempt.
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    pub target: String,
    pub credentials: Option<Credentials>,
    pub headers: BTreeMap<String, String>,
}

impl HandshakeRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            credentials: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// A caller-supplied Host header switches negotiation to the raw request form.
    pub fn has_explicit_host(&self) -> bool {
        self.headers.keys().any(|key| key.eq_ignore_ascii_case("host"))
    }

    pub fn proxy_authorization(&self) -> Option<String> {
        self.credentials
            .as_ref()
            .filter(|credentials| credentials.is_complete())
            .map(Credentials::to_basic_auth)
    }

    /// Raw request used when the Host header is supplied explicitly.
    pub fn raw_request(&self) -> String {
        let mut request = format!("CONNECT {} HTTP/1.1\r\n", self.target);
        for (key, value) in &self.headers {
            request.push_str(&format!("{key}: {value}\r\n"));
        }
        if let Some(auth) = self.proxy_authorization() {
            request.push_str(&format!("Proxy-Authorization: {auth}\r\n"));
        }
        request.push_str("\r\n");
        request
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: uuid::Uuid,
    pub adapter: String,
    pub target: String,
    pub opened_at: std::time::Instant,
    pub closed_at: Option<std::time::Instant>,
}

impl ConnectionInfo {
    pub fn new(adapter: String, target: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            adapter,
            target,
            opened_at: std::time::Instant::now(),
            closed_at: None,
        }
    }

    pub fn close(&mut self) {
        self.closed_at = Some(std::time::Instant::now());
    }
}
