//! Service manifests.
//!
//! 服务版本清单的读取与改写。
//!
//! A manifest pins one version per service, either directly under the
//! document root or inside a leading `services:` block. Entries use one of
//! two layouts (see [`codec`]). [`ManifestDocument`] keeps the full document
//! tree, so rewriting a version leaves every other byte as it was.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`ManifestDocument::load`] | Decode the service map (fail-closed) |
//! | [`ManifestDocument::replace`] | Apply desired versions, append new entries |
//! | [`ManifestDocument::content`] | Serialize the possibly edited document |

pub mod codec;
mod error;
mod parser;

pub use codec::ServiceSchema;
pub use error::ManifestError;
pub use parser::{load, rewrite, ManifestDocument, ServiceEdit, SERVICES_KEY};

/// Manifest path inside a platform chart repository.
pub const DEFAULT_MANIFEST_PATH: &str = "charts/services/values.yaml";
