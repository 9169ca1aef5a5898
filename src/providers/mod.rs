//! DNS provider capability and implementations.

mod linode;


pub use linode::LinodeProvider;

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-assigned identifier of a domain (zone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(pub u64);

/// Provider-assigned identifier of a resource record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A domain as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub domain: String,
    pub domain_id: DomainId,
}

/// A resource record as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub resource_id: ResourceId,
    /// Current record value, as the provider reports it.
    pub target: String,
}

/// Remote DNS provider.
///
/// Calls are single-shot: retrying is left to the scheduler.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &'static str;

    /// List every domain visible to the configured credentials.
    async fn list_domains(&self) -> Result<Vec<Domain>>;

    /// List the resource records of one domain, in provider order.
    async fn list_resources(&self, domain_id: DomainId) -> Result<Vec<Resource>>;

    /// Point a resource record at `target`.
    async fn update_resource(
        &self,
        domain_id: DomainId,
        resource_id: ResourceId,
        target: &str,
    ) -> Result<()>;
}

/// Create a provider from configuration.
pub fn create_provider(config: &Config) -> Result<Box<dyn DnsProvider>> {
    let token = resolve_env(&config.api_key);
    let provider = match &config.api_url {
        Some(url) => LinodeProvider::with_base_url(token, url.clone(), config.request_timeout())?,
        None => LinodeProvider::new(token, config.request_timeout())?,
    };
    Ok(Box::new(provider))
}

/// Resolve environment variable references (values starting with $).
fn resolve_env(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| {
            tracing::warn!("Environment variable {} not set", var_name);
            value.to_string()
        })
    } else {
        value.to_string()
    }
}
