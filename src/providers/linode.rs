//! Linode DNS provider (API v4).

use super::{DnsProvider, Domain, DomainId, Resource, ResourceId};
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.linode.com";
const PAGE_SIZE: u32 = 500;
const MAX_PAGES: u32 = 100;

/// Linode DNS provider.
pub struct LinodeProvider {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default = "first_page")]
    pages: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct LinodeErrors {
    #[serde(default)]
    errors: Vec<LinodeError>,
}

#[derive(Debug, Deserialize)]
struct LinodeError {
    reason: String,
    field: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DomainEntry {
    id: u64,
    domain: String,
}

#[derive(Debug, Deserialize)]
struct RecordEntry {
    id: u64,
    name: String,
    target: String,
    #[serde(rename = "type")]
    record_type: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    target: &'a str,
}

impl LinodeProvider {
    /// Create a new Linode provider.
    pub fn new(api_token: String, timeout: Duration) -> Result<Self> {
        Self::with_base_url(api_token, DEFAULT_BASE_URL.to_string(), timeout)
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(api_token: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DdnsError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch every page of a paginated collection.
    async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}{}?page={}&page_size={}",
                self.base_url, path, page, PAGE_SIZE
            );
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_token)
                .send()
                .await?;

            let body: Page<T> = decode(response).await?;
            items.extend(body.data);

            // Paging is driven by the local counter so a server repeating
            // the same page cannot keep the loop alive.
            if page >= body.pages.min(MAX_PAGES) {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

/// Turn an API response into `T`, mapping error payloads to `RemoteRejected`.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let reason = serde_json::from_slice::<LinodeErrors>(&bytes)
            .ok()
            .and_then(|body| body.errors.into_iter().next())
            .map(|e| match e.field {
                Some(field) => format!("{} ({})", e.reason, field),
                None => e.reason,
            })
            .unwrap_or_else(|| "Unknown error".to_string());

        return Err(if status.is_server_error() {
            DdnsError::Unreachable(format!("HTTP {}: {}", status, reason))
        } else {
            DdnsError::RemoteRejected(format!("HTTP {}: {}", status, reason))
        });
    }

    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl DnsProvider for LinodeProvider {
    fn name(&self) -> &'static str {
        "linode"
    }

    async fn list_domains(&self) -> Result<Vec<Domain>> {
        let entries: Vec<DomainEntry> = self.get_all("/v4/domains").await?;

        Ok(entries
            .into_iter()
            .map(|d| Domain {
                domain: d.domain,
                domain_id: DomainId(d.id),
            })
            .collect())
    }

    async fn list_resources(&self, domain_id: DomainId) -> Result<Vec<Resource>> {
        let path = format!("/v4/domains/{}/records", domain_id);
        let entries: Vec<RecordEntry> = self.get_all(&path).await?;

        // IPv4 only: other record types never get an address written into them.
        Ok(entries
            .into_iter()
            .filter(|r| r.record_type.eq_ignore_ascii_case("A"))
            .map(|r| Resource {
                name: r.name,
                resource_id: ResourceId(r.id),
                target: r.target,
            })
            .collect())
    }

    async fn update_resource(
        &self,
        domain_id: DomainId,
        resource_id: ResourceId,
        target: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/v4/domains/{}/records/{}",
            self.base_url, domain_id, resource_id
        );

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .json(&UpdateRequest { target })
            .send()
            .await?;

        let record: RecordEntry = decode(response).await?;
        if record.target != target {
            return Err(DdnsError::RemoteRejected(format!(
                "record {} still targets {}",
                resource_id, record.target
            )));
        }

        Ok(())
    }
}
