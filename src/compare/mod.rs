//! Snapshot comparison.
//!
//! 比较两个平台快照中的服务版本差异。
//!
//! [`compare`] splits the services of two [`PlatformSnapshot`](crate::types::PlatformSnapshot)s
//! into changed, inserted and deleted sets, always reading from the older
//! release to the newer one. [`ComparisonResult`] renders as a text report.

mod engine;
mod model;
pub mod report;

pub use engine::compare;
pub use model::{ComparisonResult, VersionChange};
