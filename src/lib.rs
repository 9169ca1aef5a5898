//! # linode-ddns
//!
//! A dynamic DNS daemon that keeps Linode DNS records pointed at the host's
//! public IPv4 address.
//!
//! ## Features
//!
//! - Resolves configured `domain`/`subdomain` pairs to Linode record ids
//! - Rewrites only records whose target drifted from the observed IP
//! - Fixed-interval scheduling that survives every per-cycle failure
//! - Multiple IP echo services with fallback and a short timeout
//!
//! ## Usage
//!
//! ```bash
//! # Show current IP and how each record resolves
//! linode-ddns status
//!
//! # Run a single reconciliation cycle
//! linode-ddns once
//!
//! # Run as daemon
//! linode-ddns daemon
//! ```

pub mod cache;
pub mod config;
pub mod detector;
pub mod error;
pub mod providers;
pub mod reconciler;
pub mod scheduler;

pub use config::{Config, DomainSpec};
pub use detector::{IpDetector, IpObserver};
pub use error::{DdnsError, Result};
pub use reconciler::{CycleReport, Reconciler, SpecOutcome};
pub use scheduler::Scheduler;
