//! Comparison output types.
//!
//! Collections are `BTreeMap`s so reports and serialized output are ordered
//! by service name.

use crate::types::{Release, ServiceMap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Version of a service in the earlier and the later snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionChange {
    pub from: String,
    pub to: String,
}

/// Difference between two platform snapshots, oldest release first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Release of the earlier snapshot.
    pub initial_release: Release,
    /// Release of the later snapshot.
    pub final_release: Release,
    /// Services present in both snapshots with different versions.
    pub changed: BTreeMap<String, VersionChange>,
    /// Services only in the later snapshot.
    pub inserted: ServiceMap,
    /// Services only in the earlier snapshot.
    pub deleted: ServiceMap,
    /// Render without terminal colors (e.g. when writing to a file).
    #[serde(skip)]
    pub disable_color: bool,
}

impl ComparisonResult {
    pub fn initial_version(&self) -> &str {
        &self.initial_release.version
    }

    pub fn final_version(&self) -> &str {
        &self.final_release.version
    }

    /// True when no service changed, appeared or disappeared.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.inserted.is_empty() && self.deleted.is_empty()
    }

    /// Every service name that shows up in one of the three sets.
    pub fn touched(&self) -> BTreeSet<&str> {
        self.changed
            .keys()
            .chain(self.inserted.keys())
            .chain(self.deleted.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn without_color(mut self) -> Self {
        self.disable_color = true;
        self
    }

    /// Human-readable report. `color` adds ANSI colors.
    pub fn render(&self, color: bool) -> String {
        super::report::render(self, color)
    }
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(!self.disable_color))
    }
}
