//! 核心数据类型：服务条目、发布版本与平台快照。
//!
//! # Types Module
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ServiceEntry`] | A service name with its pinned version and layout |
//! | [`ServiceMap`] | Ordered name to entry map decoded from a manifest |
//! | [`Release`] | Published release metadata (tag, notes, URL, date) |
//! | [`Releases`] | Releases of one repository, newest first |
//! | [`PlatformSnapshot`] | A release plus the services pinned at it |

pub mod release;
pub mod service;
pub mod snapshot;

pub use release::{Release, Releases};
pub use service::{service_map, SchemaVariant, ServiceEntry, ServiceMap};
pub use snapshot::PlatformSnapshot;
