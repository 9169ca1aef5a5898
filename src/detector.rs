//! Public IP detection.

use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of the host's current public IP address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IpObserver: Send + Sync {
    /// Return the current public IPv4 address.
    async fn observe(&self) -> Result<IpAddr>;
}

/// IP detector with multiple fallback services.
pub struct IpDetector {
    client: reqwest::Client,
    services: Vec<String>,
}

impl IpDetector {
    /// Create a detector over the given services with the default timeout.
    pub fn new(services: Vec<String>) -> Result<Self> {
        Self::with_timeout(services, DEFAULT_TIMEOUT)
    }

    /// Create a detector whose requests are each bounded by `timeout`.
    pub fn with_timeout(services: Vec<String>, timeout: Duration) -> Result<Self> {
        if services.is_empty() {
            return Err(DdnsError::Config(
                "IP detector needs at least one service".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DdnsError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, services })
    }

    /// Detect public IPv4 address.
    pub async fn detect_ipv4(&self) -> Result<IpAddr> {
        let mut last_error = None;

        for service in &self.services {
            match self.try_service(service).await {
                Ok(ip) if ip.is_ipv4() => {
                    tracing::debug!("Detected IPv4 {} from {}", ip, service);
                    return Ok(ip);
                }
                Ok(ip) => {
                    tracing::warn!("Service {} answered with non-IPv4 address {}", service, ip);
                    last_error = Some(DdnsError::MalformedResponse(format!(
                        "{} is not an IPv4 address",
                        ip
                    )));
                }
                Err(e) => {
                    tracing::warn!("Service {} failed: {}", service, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DdnsError::Unreachable("All IP detection services failed".to_string())
        }))
    }

    /// Try a single IP detection service.
    async fn try_service(&self, url: &str) -> Result<IpAddr> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(DdnsError::Unreachable(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let text = response.text().await?;
        let ip_str = text.trim();

        ip_str
            .parse()
            .map_err(|_| DdnsError::MalformedResponse(format!("Invalid IP response: {}", ip_str)))
    }
}

#[async_trait]
impl IpObserver for IpDetector {
    async fn observe(&self) -> Result<IpAddr> {
        self.detect_ipv4().await
    }
}
