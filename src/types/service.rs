//! Service entries decoded from a manifest

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which of the two manifest layouts a service entry uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVariant {
    /// `serviceVersion: <version>`
    #[default]
    Flat,
    /// `podspec.containers.<name>.tag: <version>`
    Nested,
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVariant::Flat => f.write_str("flat"),
            SchemaVariant::Nested => f.write_str("nested"),
        }
    }
}

/// One service pinned by a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub schema: SchemaVariant,
}

impl ServiceEntry {
    /// Entry in the flat layout, the layout used for new entries.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            schema: SchemaVariant::Flat,
        }
    }

    pub fn with_schema(mut self, schema: SchemaVariant) -> Self {
        self.schema = schema;
        self
    }
}

impl fmt::Display for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.version)
    }
}

/// Service name to entry. Ordered so reports and new entries come out sorted.
pub type ServiceMap = BTreeMap<String, ServiceEntry>;

/// Build a [`ServiceMap`] from `(name, version)` pairs.
pub fn service_map<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> ServiceMap
where
    N: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(name, version)| {
            let entry = ServiceEntry::new(name, version);
            (entry.name.clone(), entry)
        })
        .collect()
}
