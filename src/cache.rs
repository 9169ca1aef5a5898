//! Resolution of configured records to provider identifiers.
//!
//! [`resolve`] is a pure pass over provider listings: it never touches the
//! cache. [`ResourceCache::apply`] merges its results into the per-spec state
//! the reconciler keeps between cycles.

use crate::config::DomainSpec;
use crate::providers::{DnsProvider, DomainId, Resource, ResourceId};
use std::collections::HashMap;
use thiserror::Error;

/// Provider-side address of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceHandle {
    pub domain_id: DomainId,
    pub resource_id: ResourceId,
}

/// A spec resolved during the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub handle: ResourceHandle,
    /// Record value reported by the provider at resolution time.
    pub target: String,
}

/// Why a spec could not be resolved this cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("domain {0} is not listed by the provider")]
    DomainNotFound(String),

    #[error("no record named {subdomain} in {domain}")]
    SubdomainNotFound { domain: String, subdomain: String },

    #[error("provider lookup failed: {0}")]
    Provider(String),
}

impl ResolutionError {
    /// Whether the record is known to be missing, as opposed to unknowable.
    pub fn is_not_found(&self) -> bool {
        !matches!(self, ResolutionError::Provider(_))
    }
}

pub type Resolution = Result<ResolvedResource, ResolutionError>;

/// Resolve every spec against the provider, one result per spec in order.
///
/// The domain list is fetched once, and each matching domain's records at
/// most once, however many specs share it. When several records share a
/// name the first one in provider order is used.
pub async fn resolve(provider: &dyn DnsProvider, specs: &[DomainSpec]) -> Vec<Resolution> {
    let domains = match provider.list_domains().await {
        Ok(domains) => domains,
        Err(e) => {
            tracing::warn!("Failed to list domains: {}", e);
            let reason = e.to_string();
            return specs
                .iter()
                .map(|_| Err(ResolutionError::Provider(reason.clone())))
                .collect();
        }
    };

    let mut listings: HashMap<DomainId, Result<Vec<Resource>, String>> = HashMap::new();
    let mut results = Vec::with_capacity(specs.len());

    for spec in specs {
        let Some(domain) = domains.iter().find(|d| d.domain == spec.domain) else {
            results.push(Err(ResolutionError::DomainNotFound(spec.domain.clone())));
            continue;
        };

        if !listings.contains_key(&domain.domain_id) {
            let listing = provider
                .list_resources(domain.domain_id)
                .await
                .map_err(|e| {
                    tracing::warn!("Failed to list records for {}: {}", spec.domain, e);
                    e.to_string()
                });
            listings.insert(domain.domain_id, listing);
        }

        let resolution = match &listings[&domain.domain_id] {
            Err(reason) => Err(ResolutionError::Provider(reason.clone())),
            Ok(resources) => resources
                .iter()
                .find(|r| r.name == spec.record_name())
                .map(|r| ResolvedResource {
                    handle: ResourceHandle {
                        domain_id: domain.domain_id,
                        resource_id: r.resource_id,
                    },
                    target: r.target.clone(),
                })
                .ok_or_else(|| ResolutionError::SubdomainNotFound {
                    domain: spec.domain.clone(),
                    subdomain: spec.subdomain.clone(),
                }),
        };

        results.push(resolution);
    }

    results
}

/// What the daemon believes about one configured record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceState {
    pub handle: Option<ResourceHandle>,
    /// Target last seen on, or written to, the provider.
    pub last_known_ip: Option<String>,
}

/// Per-spec state, indexed by position in the configured spec list.
#[derive(Debug, Clone)]
pub struct ResourceCache {
    states: Vec<ResourceState>,
}

impl ResourceCache {
    /// One empty state per configured spec.
    pub fn new(spec_count: usize) -> Self {
        Self {
            states: vec![ResourceState::default(); spec_count],
        }
    }

    pub fn get(&self, index: usize) -> Option<&ResourceState> {
        self.states.get(index)
    }

    /// Merge a resolution batch produced by [`resolve`] for the same specs.
    pub fn apply(&mut self, resolutions: &[Resolution]) {
        for (state, resolution) in self.states.iter_mut().zip(resolutions) {
            match resolution {
                Ok(resolved) => {
                    state.handle = Some(resolved.handle);
                    state.last_known_ip = Some(resolved.target.clone());
                }
                Err(e) if e.is_not_found() => state.handle = None,
                // Lookup failed: nothing new was learned.
                Err(_) => {}
            }
        }
    }

    /// Record a successful write.
    pub fn record_update(&mut self, index: usize, ip: &str) {
        if let Some(state) = self.states.get_mut(index) {
            state.last_known_ip = Some(ip.to_string());
        }
    }

    /// Drop a handle the provider no longer accepts.
    pub fn invalidate(&mut self, index: usize) {
        if let Some(state) = self.states.get_mut(index) {
            state.handle = None;
        }
    }

    /// Seed a state, e.g. from a previous run.
    pub fn set(&mut self, index: usize, state: ResourceState) {
        if let Some(slot) = self.states.get_mut(index) {
            *slot = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DdnsError;
    use crate::providers::{Domain, MockDnsProvider};
    use mockall::predicate::eq;

    fn domain(name: &str, id: u64) -> Domain {
        Domain {
            domain: name.to_string(),
            domain_id: DomainId(id),
        }
    }

    fn resource(name: &str, id: u64, target: &str) -> Resource {
        Resource {
            name: name.to_string(),
            resource_id: ResourceId(id),
            target: target.to_string(),
        }
    }

    fn handle(domain_id: u64, resource_id: u64) -> ResourceHandle {
        ResourceHandle {
            domain_id: DomainId(domain_id),
            resource_id: ResourceId(resource_id),
        }
    }

    #[tokio::test]
    async fn test_shared_domain_is_listed_once() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_list_domains()
            .times(1)
            .returning(|| Ok(vec![domain("example.com", 7)]));
        provider
            .expect_list_resources()
            .with(eq(DomainId(7)))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    resource("home", 42, "9.9.9.9"),
                    resource("vpn", 43, "9.9.9.9"),
                ])
            });

        let specs = vec![
            DomainSpec::new("example.com", "home"),
            DomainSpec::new("example.com", "vpn"),
        ];
        let results = resolve(&provider, &specs).await;

        assert_eq!(results[0].as_ref().unwrap().handle, handle(7, 42));
        assert_eq!(results[1].as_ref().unwrap().handle, handle(7, 43));
    }

    #[tokio::test]
    async fn test_unknown_domain_is_not_listed() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_list_domains()
            .returning(|| Ok(vec![domain("example.com", 7)]));
        provider.expect_list_resources().never();

        let specs = vec![DomainSpec::new("example.net", "home")];
        let results = resolve(&provider, &specs).await;

        assert_eq!(
            results[0],
            Err(ResolutionError::DomainNotFound("example.net".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_subdomain_does_not_affect_others() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_list_domains()
            .returning(|| Ok(vec![domain("example.com", 7)]));
        provider
            .expect_list_resources()
            .returning(|_| Ok(vec![resource("home", 42, "9.9.9.9")]));

        let specs = vec![
            DomainSpec::new("example.com", "nas"),
            DomainSpec::new("example.com", "home"),
        ];
        let results = resolve(&provider, &specs).await;

        assert!(matches!(
            results[0],
            Err(ResolutionError::SubdomainNotFound { .. })
        ));
        assert_eq!(results[1].as_ref().unwrap().target, "9.9.9.9");
    }

    #[tokio::test]
    async fn test_apex_record_matches_empty_name() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_list_domains()
            .returning(|| Ok(vec![domain("example.com", 7)]));
        provider.expect_list_resources().times(1).returning(|_| {
            Ok(vec![
                resource("www", 41, "9.9.9.9"),
                resource("", 40, "9.9.9.9"),
            ])
        });

        let specs = vec![
            DomainSpec::new("example.com", "@"),
            DomainSpec::new("example.com", ""),
        ];
        let results = resolve(&provider, &specs).await;

        assert_eq!(results[0].as_ref().unwrap().handle, handle(7, 40));
        assert_eq!(results[1].as_ref().unwrap().handle, handle(7, 40));
    }

    #[tokio::test]
    async fn test_duplicate_names_pick_first() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_list_domains()
            .returning(|| Ok(vec![domain("example.com", 7)]));
        provider.expect_list_resources().returning(|_| {
            Ok(vec![
                resource("home", 50, "1.1.1.1"),
                resource("home", 42, "2.2.2.2"),
            ])
        });

        let specs = vec![DomainSpec::new("example.com", "home")];
        for _ in 0..3 {
            let results = resolve(&provider, &specs).await;
            assert_eq!(results[0].as_ref().unwrap().handle, handle(7, 50));
        }
    }

    #[tokio::test]
    async fn test_domain_list_failure_fails_every_spec() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_list_domains()
            .returning(|| Err(DdnsError::Unreachable("connection refused".to_string())));
        provider.expect_list_resources().never();

        let specs = vec![
            DomainSpec::new("example.com", "home"),
            DomainSpec::new("example.org", "nas"),
        ];
        let results = resolve(&provider, &specs).await;

        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(ResolutionError::Provider(_)))));
    }

    #[tokio::test]
    async fn test_record_list_failure_is_scoped_to_domain() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_list_domains()
            .returning(|| Ok(vec![domain("example.com", 7), domain("example.org", 8)]));
        provider
            .expect_list_resources()
            .with(eq(DomainId(7)))
            .times(1)
            .returning(|_| Err(DdnsError::MalformedResponse("truncated".to_string())));
        provider
            .expect_list_resources()
            .with(eq(DomainId(8)))
            .returning(|_| Ok(vec![resource("nas", 90, "9.9.9.9")]));

        let specs = vec![
            DomainSpec::new("example.com", "home"),
            DomainSpec::new("example.com", "vpn"),
            DomainSpec::new("example.org", "nas"),
        ];
        let results = resolve(&provider, &specs).await;

        assert!(matches!(results[0], Err(ResolutionError::Provider(_))));
        assert!(matches!(results[1], Err(ResolutionError::Provider(_))));
        assert_eq!(results[2].as_ref().unwrap().handle, handle(8, 90));
    }

    #[test]
    fn test_apply_overwrites_and_clears() {
        let mut cache = ResourceCache::new(3);
        for i in 0..3 {
            cache.set(
                i,
                ResourceState {
                    handle: Some(handle(1, 1)),
                    last_known_ip: Some("1.1.1.1".to_string()),
                },
            );
        }

        cache.apply(&[
            Ok(ResolvedResource {
                handle: handle(7, 42),
                target: "2.2.2.2".to_string(),
            }),
            Err(ResolutionError::SubdomainNotFound {
                domain: "example.com".to_string(),
                subdomain: "gone".to_string(),
            }),
            Err(ResolutionError::Provider("timeout".to_string())),
        ]);

        assert_eq!(cache.get(0).unwrap().handle, Some(handle(7, 42)));
        assert_eq!(cache.get(0).unwrap().last_known_ip.as_deref(), Some("2.2.2.2"));
        assert_eq!(cache.get(1).unwrap().handle, None);
        assert_eq!(cache.get(2).unwrap().handle, Some(handle(1, 1)));
        assert_eq!(cache.get(2).unwrap().last_known_ip.as_deref(), Some("1.1.1.1"));
    }

    #[test]
    fn test_record_update_and_invalidate() {
        let mut cache = ResourceCache::new(1);
        cache.record_update(0, "8.8.8.8");
        cache.invalidate(0);

        assert_eq!(
            cache.get(0),
            Some(&ResourceState {
                handle: None,
                last_known_ip: Some("8.8.8.8".to_string()),
            })
        );
        assert_eq!(cache.get(1), None);
    }
}
