use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Credentials, DialOptions, IpVersion};

/// One HTTP proxy adapter as written in the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HttpOption {
    pub name: String,
    pub server: String,
    pub port: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub tls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,
    pub skip_cert_verify: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_mark: Option<u32>,
    pub ip_version: IpVersion,
    pub tfo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialer_proxy: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl HttpOption {
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username.clone(), password.clone())),
            _ => None,
        }
    }

    pub fn dial_options(&self) -> DialOptions {
        DialOptions {
            interface: self.interface_name.clone().filter(|name| !name.is_empty()),
            routing_mark: self.routing_mark.filter(|mark| *mark != 0),
            tfo: self.tfo,
            prefer: self.ip_version,
        }
    }

    /// SNI falls back to the server host when not set.
    pub fn server_name(&self) -> &str {
        self.sni
            .as_deref()
            .filter(|sni| !sni.is_empty())
            .unwrap_or(&self.server)
    }

    pub fn dialer_proxy(&self) -> Option<&str> {
        self.dialer_proxy.as_deref().filter(|name| !name.is_empty())
    }
}

/// Profile file: the process-wide client identity plus every configured adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ProfileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_client_fingerprint: Option<String>,
    pub proxies: Vec<HttpOption>,
}
