use super::http::HttpAdapter;
use crate::domain::{DialError, HttpOption, Result};
use crate::ports::{AdapterRegistry, ClientIdentityRegistry, ProxyAdapter};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Shared, read-only environment handed to adapters at construction.
#[derive(Clone)]
pub struct AdapterEnv {
    pub identities: Arc<dyn ClientIdentityRegistry>,
    pub registry: Weak<dyn AdapterRegistry>,
}

impl AdapterEnv {
    /// Environment without a registry; any `dialer-proxy` resolves to `UnknownAdapter`.
    pub fn standalone(identities: Arc<dyn ClientIdentityRegistry>) -> Self {
        Self {
            identities,
            registry: Weak::<AdapterTable>::new(),
        }
    }
}

/// Immutable table of every configured adapter, keyed by name.
#[derive(Default)]
pub struct AdapterTable {
    adapters: HashMap<String, Arc<dyn ProxyAdapter>>,
}

impl AdapterTable {
    /// Builds every adapter from the profile; adapters resolve chains through the returned table.
    pub fn from_options(options: &[HttpOption], identities: Arc<dyn ClientIdentityRegistry>) -> Result<Arc<Self>> {
        let mut failure = None;
        let table = Arc::new_cyclic(|weak: &Weak<AdapterTable>| {
            let env = AdapterEnv {
                identities,
                registry: weak.clone(),
            };
            match Self::build(options, &env) {
                Ok(table) => table,
                Err(e) => {
                    failure = Some(e);
                    AdapterTable::default()
                }
            }
        });

        match failure {
            Some(e) => Err(e),
            None => {
                debug!(adapters = table.adapters.len(), "adapter table ready");
                Ok(table)
            }
        }
    }

    /// Table over adapters built elsewhere.
    pub fn from_adapters(adapters: Vec<Arc<dyn ProxyAdapter>>) -> Result<Arc<Self>> {
        let mut table = AdapterTable::default();
        for adapter in adapters {
            table.insert(adapter)?;
        }
        Ok(Arc::new(table))
    }

    fn build(options: &[HttpOption], env: &AdapterEnv) -> Result<Self> {
        let mut table = AdapterTable::default();
        for option in options {
            let adapter = HttpAdapter::new(option, env).map_err(|e| match e {
                DialError::Configuration(detail) if !detail.starts_with(&option.name) => {
                    DialError::Configuration(format!("{}: {detail}", option.name))
                }
                other => other,
            })?;
            table.insert(Arc::new(adapter))?;
        }
        Ok(table)
    }

    fn insert(&mut self, adapter: Arc<dyn ProxyAdapter>) -> Result<()> {
        let name = adapter.name().to_string();
        if name.is_empty() {
            return Err(DialError::Configuration(format!("adapter {} has no name", adapter.addr())));
        }
        if self.adapters.contains_key(&name) {
            return Err(DialError::Configuration(format!("duplicate adapter name: {name}")));
        }
        self.adapters.insert(name, adapter);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl AdapterRegistry for AdapterTable {
    fn lookup(&self, name: &str) -> Option<Arc<dyn ProxyAdapter>> {
        self.adapters.get(name).cloned()
    }
}
