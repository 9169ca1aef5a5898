//! Configuration management for linode-ddns.

use crate::error::{DdnsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Linode API token (or environment variable name if prefixed with $).
    pub api_key: String,

    /// Delay between the end of one cycle and the start of the next, in seconds.
    #[serde(default = "default_interval", alias = "poll_rate")]
    pub poll_interval_secs: u64,

    /// Timeout for a single IP detection request, in seconds.
    #[serde(default = "default_observe_timeout")]
    pub observe_timeout_secs: u64,

    /// Timeout for a single provider API request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// IP detection services to use, tried in order.
    #[serde(default = "default_ip_services")]
    pub ip_services: Vec<String>,

    /// Override for the provider API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Records to keep in sync, in order.
    #[serde(default, rename = "domain")]
    pub domains: Vec<DomainSpec>,
}

fn default_interval() -> u64 {
    300
}

fn default_observe_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}

fn default_ip_services() -> Vec<String> {
    vec![
        "https://api.ipify.org".to_string(),
        "https://icanhazip.com".to_string(),
        "https://ifconfig.me/ip".to_string(),
        "https://ipecho.net/plain".to_string(),
    ]
}

/// One DNS record to keep pointed at the public IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainSpec {
    /// Zone name as the provider lists it (e.g. "example.com").
    pub domain: String,
    /// Record name inside the zone (e.g. "home"). Empty or "@" is the apex.
    #[serde(default)]
    pub subdomain: String,
}

impl DomainSpec {
    pub fn new(domain: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            subdomain: subdomain.into(),
        }
    }

    /// Record name as the provider lists it; the apex is the empty name.
    pub fn record_name(&self) -> &str {
        match self.subdomain.trim() {
            "@" => "",
            name => name,
        }
    }
}

impl fmt::Display for DomainSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.record_name().is_empty() {
            write!(f, "{}", self.domain)
        } else {
            write!(f, "{}.{}", self.subdomain, self.domain)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            poll_interval_secs: default_interval(),
            observe_timeout_secs: default_observe_timeout(),
            request_timeout_secs: default_request_timeout(),
            ip_services: default_ip_services(),
            api_url: None,
            domains: Vec::new(),
        }
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DdnsError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("linode-ddns").join("config.toml"))
    }

    /// Load and validate configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DdnsError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations the daemon cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(DdnsError::Config("api_key must not be empty".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(DdnsError::Config(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.observe_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(DdnsError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.ip_services.is_empty() {
            return Err(DdnsError::Config(
                "at least one ip service is required".to_string(),
            ));
        }
        if self.domains.is_empty() {
            return Err(DdnsError::Config(
                "at least one [[domain]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for spec in &self.domains {
            if spec.domain.trim().is_empty() {
                return Err(DdnsError::Config(format!(
                    "domain must be set (got {:?})",
                    spec
                )));
            }
            if !seen.insert((spec.domain.as_str(), spec.record_name())) {
                return Err(DdnsError::Config(format!("duplicate domain entry: {}", spec)));
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn observe_timeout(&self) -> Duration {
        Duration::from_secs(self.observe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Generate example configuration.
    pub fn example() -> Self {
        Self {
            api_key: "$LINODE_TOKEN".to_string(),
            domains: vec![
                DomainSpec::new("example.com", "home"),
                DomainSpec::new("example.com", "vpn"),
            ],
            ..Self::default()
        }
    }
}
