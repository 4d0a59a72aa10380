//! # pinsync
//!
//! 服务版本清单的保结构编辑与平台发布快照比较。
//!
//! Structure-preserving edits of service version manifests, and comparison of
//! platform release snapshots.
//!
//! ## Overview
//!
//! A platform's deployment chart carries a manifest that pins every deployed
//! service to a version. Entries use one of two layouts: a flat
//! `serviceVersion` field, or a nested `podspec.containers.<name>.tag`.
//! This crate reads such manifests, rewrites only the pins that change, and
//! writes the document back with comments and layout of everything else
//! intact. Two manifests taken at different platform releases can be diffed
//! into changed, inserted and deleted services.
//!
//! ## Key Features
//!
//! - **Round-trip documents**: [`document::parse`] / [`document::serialize`]
//!   keep comments, blank lines and key order
//! - **Schema-agnostic decoding**: [`manifest::ManifestDocument`] loads both
//!   entry layouts into one [`ServiceMap`]
//! - **Transactional rewrites**: [`manifest::ManifestDocument::replace`]
//!   applies all edits or none
//! - **Snapshot diffing**: [`compare::compare`] with a text report
//! - **Concurrent fetches**: [`reconcile::Reconciler`] over pluggable
//!   [`transport`] collaborators, with cancellation
//!
//! ## Quick Start
//!
//! ```rust
//! use pinsync::manifest::ManifestDocument;
//! use pinsync::types::service_map;
//!
//! let source = b"services:\n  # edge\n  api:\n    serviceVersion: v1.0.0\n";
//! let mut doc = ManifestDocument::parse(source)?;
//! doc.replace(&service_map([("api", "v1.1.0"), ("worker", "v2")]))?;
//! assert_eq!(
//!     String::from_utf8_lossy(&doc.content()),
//!     "services:\n  # edge\n  api:\n    serviceVersion: v1.1.0\n  worker:\n    serviceVersion: v2\n"
//! );
//! # Ok::<(), pinsync::manifest::ManifestError>(())
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`document`] | Comment-preserving document tree, parser and emitter |
//! | [`manifest`] | Service entry codec and manifest load/replace |
//! | [`types`] | Releases, service entries, snapshots |
//! | [`compare`] | Snapshot comparison and report rendering |
//! | [`transport`] | Content, release and commit collaborators |
//! | [`reconcile`] | Concurrent reconciliation workflow |
//! | [`config`] | Typed configuration with environment overrides |
//! | [`logging`] | Subscriber setup |

pub mod compare;
pub mod config;
pub mod document;
pub mod logging;
pub mod manifest;
pub mod reconcile;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use compare::{compare, ComparisonResult, VersionChange};
pub use config::ReconcilerConfig;
pub use manifest::{ManifestDocument, ServiceEdit};
pub use reconcile::{BumpOutcome, Reconciler, ServiceReleases};
pub use types::{PlatformSnapshot, Release, Releases, SchemaVariant, ServiceEntry, ServiceMap};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
