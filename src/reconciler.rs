//! One reconciliation cycle: observe, resolve, compare, update.

use crate::cache::{self, ResourceCache};
use crate::config::DomainSpec;
use crate::detector::IpObserver;
use crate::providers::DnsProvider;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

/// Result of one spec within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum SpecOutcome {
    /// The record was rewritten to the observed IP.
    Updated { previous: Option<String>, ip: String },
    /// The record already pointed at the observed IP.
    Unchanged,
    /// The record could not be resolved this cycle.
    SkippedUnresolved { reason: String },
    /// The cycle or the write failed for this record.
    Failed { reason: String },
}

impl fmt::Display for SpecOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecOutcome::Updated { previous: Some(prev), ip } => {
                write!(f, "updated ({} -> {})", prev, ip)
            }
            SpecOutcome::Updated { previous: None, ip } => write!(f, "updated ({})", ip),
            SpecOutcome::Unchanged => write!(f, "unchanged"),
            SpecOutcome::SkippedUnresolved { reason } => write!(f, "skipped ({})", reason),
            SpecOutcome::Failed { reason } => write!(f, "failed ({})", reason),
        }
    }
}

/// Outcome of a single spec, labelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecReport {
    pub spec: DomainSpec,
    #[serde(flatten)]
    pub outcome: SpecOutcome,
}

/// Everything one cycle did.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub observed_ip: Option<IpAddr>,
    /// Set when the IP could not be observed and the cycle was abandoned.
    pub observation_error: Option<String>,
    pub specs: Vec<SpecReport>,
}

impl CycleReport {
    /// Whether the cycle was abandoned before touching the provider.
    pub fn is_aborted(&self) -> bool {
        self.observation_error.is_some()
    }

    pub fn count(&self, pred: impl Fn(&SpecOutcome) -> bool) -> usize {
        self.specs.iter().filter(|s| pred(&s.outcome)).count()
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, SpecOutcome::Updated { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, SpecOutcome::Unchanged))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SpecOutcome::SkippedUnresolved { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SpecOutcome::Failed { .. }))
    }

    /// Emit the report through `tracing`.
    pub fn log(&self) {
        if let Some(err) = &self.observation_error {
            tracing::error!("Cycle aborted, could not observe public IP: {}", err);
            return;
        }

        for entry in &self.specs {
            match &entry.outcome {
                SpecOutcome::Updated { .. } => tracing::info!("{}: {}", entry.spec, entry.outcome),
                SpecOutcome::Unchanged => tracing::debug!("{}: {}", entry.spec, entry.outcome),
                SpecOutcome::SkippedUnresolved { .. } | SpecOutcome::Failed { .. } => {
                    tracing::warn!("{}: {}", entry.spec, entry.outcome)
                }
            }
        }

        tracing::info!(
            updated = self.updated(),
            unchanged = self.unchanged(),
            skipped = self.skipped(),
            failed = self.failed(),
            "Cycle complete"
        );
    }
}

/// Keeps the configured records pointed at the observed IP.
///
/// A reconciler owns the per-spec state; only one cycle can run at a time
/// because [`Reconciler::run_cycle`] takes `&mut self`.
pub struct Reconciler {
    observer: Box<dyn IpObserver>,
    provider: Box<dyn DnsProvider>,
    specs: Vec<DomainSpec>,
    cache: ResourceCache,
}

impl Reconciler {
    pub fn new(
        observer: Box<dyn IpObserver>,
        provider: Box<dyn DnsProvider>,
        specs: Vec<DomainSpec>,
    ) -> Self {
        let cache = ResourceCache::new(specs.len());
        Self {
            observer,
            provider,
            specs,
            cache,
        }
    }

    pub fn specs(&self) -> &[DomainSpec] {
        &self.specs
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResourceCache {
        &mut self.cache
    }

    pub fn provider(&self) -> &dyn DnsProvider {
        self.provider.as_ref()
    }

    pub fn observer(&self) -> &dyn IpObserver {
        self.observer.as_ref()
    }

    /// Run one cycle, writing only records that drifted.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.reconcile(false).await
    }

    /// Run one cycle, writing every resolved record.
    pub async fn run_forced_cycle(&mut self) -> CycleReport {
        self.reconcile(true).await
    }

    async fn reconcile(&mut self, force: bool) -> CycleReport {
        let timestamp = Utc::now();
        tracing::debug!("Starting reconciliation of {} record(s)", self.specs.len());

        let ip = match self.observer.observe().await {
            Ok(ip) => ip,
            Err(e) => {
                let reason = e.to_string();
                return CycleReport {
                    timestamp,
                    observed_ip: None,
                    observation_error: Some(reason.clone()),
                    specs: self
                        .specs
                        .iter()
                        .map(|spec| SpecReport {
                            spec: spec.clone(),
                            outcome: SpecOutcome::Failed {
                                reason: reason.clone(),
                            },
                        })
                        .collect(),
                };
            }
        };
        tracing::debug!("Observed public IP {}", ip);

        let resolutions = cache::resolve(self.provider.as_ref(), &self.specs).await;
        self.cache.apply(&resolutions);

        let ip_str = ip.to_string();
        let mut reports = Vec::with_capacity(self.specs.len());

        for (index, (spec, resolution)) in self.specs.iter().zip(&resolutions).enumerate() {
            let outcome = match resolution {
                Err(e) => SpecOutcome::SkippedUnresolved {
                    reason: e.to_string(),
                },
                Ok(resolved) => {
                    let previous = self
                        .cache
                        .get(index)
                        .and_then(|state| state.last_known_ip.clone());

                    if !force && previous.as_deref().is_some_and(|known| same_ip(known, ip)) {
                        SpecOutcome::Unchanged
                    } else {
                        let handle = resolved.handle;
                        match self
                            .provider
                            .update_resource(handle.domain_id, handle.resource_id, &ip_str)
                            .await
                        {
                            Ok(()) => {
                                self.cache.record_update(index, &ip_str);
                                SpecOutcome::Updated {
                                    previous,
                                    ip: ip_str.clone(),
                                }
                            }
                            Err(e) => {
                                if e.is_rejection() {
                                    self.cache.invalidate(index);
                                }
                                SpecOutcome::Failed {
                                    reason: e.to_string(),
                                }
                            }
                        }
                    }
                }
            };

            reports.push(SpecReport {
                spec: spec.clone(),
                outcome,
            });
        }

        CycleReport {
            timestamp,
            observed_ip: Some(ip),
            observation_error: None,
            specs: reports,
        }
    }
}

/// Compare a stored record value with an observed address.
fn same_ip(known: &str, ip: IpAddr) -> bool {
    let known = known.trim();
    match known.parse::<IpAddr>() {
        Ok(parsed) => parsed == ip,
        Err(_) => known == ip.to_string(),
    }
}
