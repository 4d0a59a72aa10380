//! Load and rewrite the services block of a manifest.

use super::codec::{self, ServiceSchema};
use super::ManifestError;
use crate::document::{self, DocumentError, MapEntry, NodeId, NodeKind, ScalarStyle, Tree};
use crate::types::{SchemaVariant, ServiceEntry, ServiceMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Root key that marks the services block when it is the first root entry.
pub const SERVICES_KEY: &str = "services";

/// A change applied by [`ManifestDocument::replace`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceEdit {
    Updated {
        service: String,
        from: String,
        to: String,
        schema: SchemaVariant,
    },
    Inserted {
        service: String,
        version: String,
    },
}

impl ServiceEdit {
    pub fn service(&self) -> &str {
        match self {
            ServiceEdit::Updated { service, .. } | ServiceEdit::Inserted { service, .. } => service,
        }
    }
}

impl fmt::Display for ServiceEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceEdit::Updated { service, from, to, .. } => {
                write!(f, "updated {} from {} to {}", service, from, to)
            }
            ServiceEdit::Inserted { service, version } => {
                write!(f, "inserted {} at {}", service, version)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServicesBlock {
    Mapping(NodeId),
    /// `services:` is the first root entry but holds no entries yet, either
    /// with no value at all or an empty `{}`.
    Vacant { root: NodeId },
}

/// A parsed manifest that can be read, edited and written back.
///
/// ```rust
/// use pinsync::manifest::ManifestDocument;
/// use pinsync::types::service_map;
///
/// let mut doc = ManifestDocument::parse(b"services:\n  api:\n    serviceVersion: v1\n")?;
/// assert_eq!(doc.load()?["api"].version, "v1");
///
/// doc.replace(&service_map([("api", "v2")]))?;
/// assert_eq!(doc.content(), b"services:\n  api:\n    serviceVersion: v2\n");
/// # Ok::<(), pinsync::manifest::ManifestError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ManifestDocument {
    tree: Tree,
    services: ServicesBlock,
}

impl ManifestDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let tree = document::parse(bytes)?;
        let root = tree.root();
        let kind = tree.kind(root);
        if kind != NodeKind::Mapping {
            return Err(DocumentError::shape(format!(
                "manifest root is a {}, expected a mapping",
                kind
            ))
            .into());
        }
        let services = locate_services(&tree, root);
        Ok(Self { tree, services })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Mapping node that holds the service entries, if it exists yet.
    pub fn services_node(&self) -> Option<NodeId> {
        match self.services {
            ServicesBlock::Mapping(id) => Some(id),
            ServicesBlock::Vacant { .. } => None,
        }
    }

    /// Decode every service entry. One unreadable entry fails the whole load.
    pub fn load(&self) -> Result<ServiceMap, ManifestError> {
        let mut services = ServiceMap::new();
        for (name, entry) in self.named_entries() {
            if services.contains_key(&name) {
                return Err(ManifestError::DuplicateService { service: name });
            }
            let schema = codec::classify(&self.tree, &name, entry.value)?;
            let version = codec::version_of(&self.tree, &schema);
            services.insert(
                name.clone(),
                ServiceEntry::new(name, version).with_schema(schema.variant()),
            );
        }
        debug!(services = services.len(), "loaded manifest");
        Ok(services)
    }

    /// Bring the manifest in line with `desired`.
    ///
    /// Existing entries are rewritten in place when their version differs;
    /// names not yet present are appended as flat entries in name order.
    /// Every targeted entry is decoded before anything is written, so on
    /// error the document is left exactly as it was.
    pub fn replace(&mut self, desired: &ServiceMap) -> Result<Vec<ServiceEdit>, ManifestError> {
        if let Some(entry) = desired.values().find(|e| e.version.is_empty()) {
            return Err(ManifestError::schema(&entry.name, "requested version is empty"));
        }

        let mut remaining: BTreeMap<&str, &ServiceEntry> =
            desired.iter().map(|(name, entry)| (name.as_str(), entry)).collect();
        let mut updates: Vec<(String, ServiceSchema, String, String)> = Vec::new();
        for (name, entry) in self.named_entries() {
            let Some(want) = remaining.remove(name.as_str()) else {
                continue;
            };
            let schema = codec::classify(&self.tree, &name, entry.value)?;
            let current = codec::version_of(&self.tree, &schema);
            if current != want.version {
                updates.push((name, schema, current, want.version.clone()));
            }
        }

        let mut tree = self.tree.clone();
        let mut services = self.services;
        let mut edits = Vec::with_capacity(updates.len() + remaining.len());

        for (service, schema, from, to) in updates {
            codec::set_version(&mut tree, &schema, &to)?;
            edits.push(ServiceEdit::Updated {
                service,
                from,
                to,
                schema: schema.variant(),
            });
        }
        if !remaining.is_empty() {
            let block = ensure_services_mapping(&mut tree, &mut services)?;
            for (name, want) in remaining {
                let value = codec::new_flat_entry(&mut tree, &want.version)?;
                tree.push_entry(block, name, value)?;
                edits.push(ServiceEdit::Inserted {
                    service: name.to_string(),
                    version: want.version.clone(),
                });
            }
        }

        self.tree = tree;
        self.services = services;
        for edit in &edits {
            match edit {
                ServiceEdit::Updated { service, from, to, .. } => {
                    info!(service = %service, from = %from, to = %to, "updated service version")
                }
                ServiceEdit::Inserted { service, version } => {
                    info!(service = %service, version = %version, "inserted service")
                }
            }
        }
        Ok(edits)
    }

    /// Serialized document, including any edits.
    pub fn content(&self) -> Vec<u8> {
        document::serialize(&self.tree)
    }

    /// Service entries with normalised names. Keys that normalise to an
    /// empty name are skipped.
    fn named_entries(&self) -> Vec<(String, MapEntry)> {
        let Some(block) = self.services_node() else {
            return Vec::new();
        };
        self.tree
            .entries(block)
            .iter()
            .filter_map(|entry| {
                let name = self.tree.scalar_value(entry.key)?.replace(' ', "");
                (!name.is_empty()).then_some((name, *entry))
            })
            .collect()
    }
}

fn locate_services(tree: &Tree, root: NodeId) -> ServicesBlock {
    let Some(first) = tree.entries(root).first() else {
        return ServicesBlock::Mapping(root);
    };
    if tree.scalar_value(first.key) != Some(SERVICES_KEY) {
        return ServicesBlock::Mapping(root);
    }
    match tree.kind(first.value) {
        NodeKind::Mapping => ServicesBlock::Mapping(first.value),
        NodeKind::Scalar if is_vacant(tree, first.value) => ServicesBlock::Vacant { root },
        _ => ServicesBlock::Mapping(root),
    }
}

fn is_vacant(tree: &Tree, value: NodeId) -> bool {
    let Some(scalar) = tree.scalar(value) else {
        return false;
    };
    match scalar.style() {
        ScalarStyle::Flow => scalar
            .header()
            .chars()
            .filter(|c| !c.is_whitespace())
            .eq("{}".chars()),
        _ => scalar.value().is_empty(),
    }
}

fn ensure_services_mapping(
    tree: &mut Tree,
    services: &mut ServicesBlock,
) -> Result<NodeId, ManifestError> {
    match *services {
        ServicesBlock::Mapping(id) => Ok(id),
        ServicesBlock::Vacant { root } => {
            let first = *tree
                .entries(root)
                .first()
                .ok_or_else(|| DocumentError::shape("services block disappeared from the root"))?;
            // `services: {} # note` keeps its comment on the key line
            if let Some(comment) = tree.decor_mut(first.value).inline.take() {
                tree.decor_mut(first.key).inline.get_or_insert(comment);
            }
            let block = tree.new_mapping();
            tree.replace_entry_value(root, 0, block)?;
            *services = ServicesBlock::Mapping(block);
            Ok(block)
        }
    }
}

/// Decode the service map of a manifest.
pub fn load(bytes: &[u8]) -> Result<ServiceMap, ManifestError> {
    ManifestDocument::parse(bytes)?.load()
}

/// Apply `desired` to a manifest and return the new bytes with the edits made.
pub fn rewrite(bytes: &[u8], desired: &ServiceMap) -> Result<(Vec<u8>, Vec<ServiceEdit>), ManifestError> {
    let mut doc = ManifestDocument::parse(bytes)?;
    let edits = doc.replace(desired)?;
    Ok((doc.content(), edits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::service_map;

    #[test]
    fn test_services_block_under_first_key() {
        let doc = ManifestDocument::parse(b"services:\n  a:\n    serviceVersion: v1\n").unwrap();
        let services = doc.load().unwrap();
        assert_eq!(services.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_root_mapping_holds_services_without_marker() {
        let doc = ManifestDocument::parse(b"a:\n  serviceVersion: v1\nb:\n  serviceVersion: v2\n").unwrap();
        assert_eq!(doc.load().unwrap().len(), 2);
    }

    #[test]
    fn test_services_marker_must_be_first() {
        let yaml = b"global:\n  serviceVersion: v0\nservices:\n  a:\n    serviceVersion: v1\n";
        let err = ManifestDocument::parse(yaml).unwrap().load().unwrap_err();
        assert_eq!(err.service(), Some("services"));
    }

    #[test]
    fn test_key_spaces_are_stripped() {
        let services = load(b"\"my api\":\n  serviceVersion: v1\n").unwrap();
        assert!(services.contains_key("myapi"));
    }

    #[test]
    fn test_duplicate_after_normalisation() {
        let err = load(b"\"a b\":\n  serviceVersion: v1\nab:\n  serviceVersion: v2\n").unwrap_err();
        assert_eq!(err, ManifestError::DuplicateService { service: "ab".to_string() });
    }

    #[test]
    fn test_non_mapping_root_is_invalid() {
        let err = load(b"- a\n- b\n").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidDocument(_)));
    }

    #[test]
    fn test_vacant_services_block_gets_entries() {
        let mut doc = ManifestDocument::parse(b"services: # pinned versions\n").unwrap();
        assert!(doc.load().unwrap().is_empty());
        doc.replace(&service_map([("api", "v1")])).unwrap();
        assert_eq!(
            String::from_utf8(doc.content()).unwrap(),
            "services: # pinned versions\n  api:\n    serviceVersion: v1\n"
        );
    }

    #[test]
    fn test_empty_flow_services_block_gets_entries() {
        let mut doc = ManifestDocument::parse(b"services: {} # pinned versions\nglobal: x\n").unwrap();
        assert!(doc.load().unwrap().is_empty());
        doc.replace(&service_map([("api", "v1")])).unwrap();
        assert_eq!(
            String::from_utf8(doc.content()).unwrap(),
            "services: # pinned versions\n  api:\n    serviceVersion: v1\nglobal: x\n"
        );
        assert_eq!(doc.load().unwrap()["api"].version, "v1");
    }

    #[test]
    fn test_replace_reports_edits() {
        let mut doc = ManifestDocument::parse(b"services:\n  a:\n    serviceVersion: v1\n").unwrap();
        let edits = doc.replace(&service_map([("a", "v2"), ("b", "v1")])).unwrap();
        assert_eq!(
            edits,
            vec![
                ServiceEdit::Updated {
                    service: "a".to_string(),
                    from: "v1".to_string(),
                    to: "v2".to_string(),
                    schema: SchemaVariant::Flat,
                },
                ServiceEdit::Inserted {
                    service: "b".to_string(),
                    version: "v1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_empty_requested_version_is_rejected() {
        let mut doc = ManifestDocument::parse(b"a:\n  serviceVersion: v1\n").unwrap();
        assert!(doc.replace(&service_map([("a", "")])).is_err());
        assert_eq!(doc.content(), b"a:\n  serviceVersion: v1\n");
    }
}
