//! Manifest state at a release

use super::{Release, ServiceMap};
use serde::{Deserialize, Serialize};

/// Service versions decoded from a manifest fetched at `release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSnapshot {
    pub release: Release,
    pub services: ServiceMap,
}

impl PlatformSnapshot {
    pub fn new(release: Release, services: ServiceMap) -> Self {
        Self { release, services }
    }

    pub fn version(&self) -> &str {
        &self.release.version
    }
}
