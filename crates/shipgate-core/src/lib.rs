//! Core library for shipgate.
//!
//! Release gating and contributor provenance for automated release
//! pipelines. The `shipgate` CLI is a thin layer over this crate.
//!
//! # Modules
//!
//! - [`remote`] - Git remote URL parsing into `owner/repo` identities
//! - [`process`] - External process boundary
//! - [`git`] - Git queries used by the resolver and the CLI
//! - [`origin`] - Memoized resolution of the origin repository
//! - [`github`] - GitHub contributors API boundary, HTTP client, retry policy
//! - [`contributors`] - Contributor records, snapshots and aggregation
//! - [`store`] - Atomic on-disk persistence of snapshots
//! - [`publications`] - Publication comparison markers
//! - [`decision`] - Release gating
//! - [`config`] - Configuration loading and management
//! - [`error`] - Configuration error types
//!
//! # Quick Start
//!
//! ```no_run
//! use shipgate_core::decision::{DecisionInputs, decide};
//! use shipgate_core::publications::{ComparisonMarker, has_differences};
//!
//! let markers = vec![ComparisonMarker::new("mockito-core.jar", 0)];
//! let inputs = DecisionInputs {
//!     branch: "master".into(),
//!     releasable_branch_regex: "master|release/.+".into(),
//!     ..DecisionInputs::default()
//! };
//! let decision = decide(&inputs, has_differences(&markers)).unwrap();
//! println!("{}: {}", decision.should_release, decision.reason);
//! ```
#![deny(unsafe_code)]

pub mod config;

pub mod contributors;

pub mod decision;

pub mod error;

pub mod git;

pub mod github;

pub mod origin;

pub mod process;

pub mod publications;

pub mod remote;

pub mod store;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use remote::RepositoryIdentity;
