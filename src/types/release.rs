//! Release metadata from a release directory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A published release of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    /// Tag the release was cut from.
    pub version: String,
    #[serde(default)]
    pub changelog: String,
    #[serde(default)]
    pub url: String,
    /// Publish time. Unpublished releases sort before any published one.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Release {
    pub fn new(version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            name: version.clone(),
            version,
            changelog: String::new(),
            url: String::new(),
            published_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_changelog(mut self, changelog: impl Into<String>) -> Self {
        self.changelog = changelog.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    /// True when `self` was published strictly after `other`.
    pub fn is_newer_than(&self, other: &Release) -> bool {
        self.published_at > other.published_at
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.published_at {
            Some(at) => write!(f, "{} ({})", self.version, at.format("%Y-%m-%d")),
            None => f.write_str(&self.version),
        }
    }
}

/// Releases of one repository, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Releases(Vec<Release>);

impl Releases {
    pub fn new(mut releases: Vec<Release>) -> Self {
        releases.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Self(releases)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Release> {
        self.0.iter()
    }

    pub fn latest(&self) -> Option<&Release> {
        self.0.first()
    }

    pub fn versions(&self) -> Vec<&str> {
        self.0.iter().map(|r| r.version.as_str()).collect()
    }

    pub fn by_version(&self, version: &str) -> Option<&Release> {
        self.0.iter().find(|r| r.version == version)
    }

    /// Releases published strictly after `release`, newest first.
    pub fn newer_than(&self, release: &Release) -> Releases {
        Releases(
            self.0
                .iter()
                .filter(|r| r.is_newer_than(release))
                .cloned()
                .collect(),
        )
    }

    /// `version` and every release published before it, newest first.
    pub fn up_to(&self, version: &str) -> Releases {
        let Some(target) = self.by_version(version) else {
            return Releases::default();
        };
        Releases(
            self.0
                .iter()
                .filter(|r| r.version == version || target.is_newer_than(r))
                .cloned()
                .collect(),
        )
    }

    pub fn into_inner(self) -> Vec<Release> {
        self.0
    }
}

impl From<Vec<Release>> for Releases {
    fn from(releases: Vec<Release>) -> Self {
        Releases::new(releases)
    }
}

impl IntoIterator for Releases {
    type Item = Release;
    type IntoIter = std::vec::IntoIter<Release>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Releases {
    type Item = &'a Release;
    type IntoIter = std::slice::Iter<'a, Release>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
