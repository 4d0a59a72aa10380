//! Service entry layouts.
//!
//! A service entry is one of:
//!
//! ```yaml
//! flat-service:
//!   serviceVersion: v1.0.6
//!
//! nested-service:
//!   podspec:
//!     containers:
//!       fpm:
//!         tag: v1.17.3
//!       nginx:
//!         env:
//!           CLIENT_MAX_BODY_SIZE: 10m
//! ```
//!
//! `containers` may also be a sequence of mappings that carry a `name` field.
//! [`classify`] tries the flat layout first and only accepts it when the
//! version is non-empty, then falls back to the first container with a
//! non-empty `tag`.

use super::ManifestError;
use crate::document::{NodeId, NodeKind, Tree};
use crate::types::SchemaVariant;

pub const FLAT_VERSION_KEY: &str = "serviceVersion";
pub const POD_SPEC_KEY: &str = "podspec";
pub const CONTAINERS_KEY: &str = "containers";
pub const TAG_KEY: &str = "tag";
pub const CONTAINER_NAME_KEY: &str = "name";

/// Where a service entry keeps its version, as handles into the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceSchema {
    Flat { version: NodeId },
    Nested { container: String, tag: NodeId },
}

impl ServiceSchema {
    pub fn variant(&self) -> SchemaVariant {
        match self {
            ServiceSchema::Flat { .. } => SchemaVariant::Flat,
            ServiceSchema::Nested { .. } => SchemaVariant::Nested,
        }
    }

    /// Scalar node holding the version.
    pub fn version_node(&self) -> NodeId {
        match self {
            ServiceSchema::Flat { version } => *version,
            ServiceSchema::Nested { tag, .. } => *tag,
        }
    }
}

/// Work out which layout the entry value `entry` of `service` uses.
pub fn classify(tree: &Tree, service: &str, entry: NodeId) -> Result<ServiceSchema, ManifestError> {
    let kind = tree.kind(entry);
    if kind != NodeKind::Mapping {
        return Err(ManifestError::schema(
            service,
            format!("entry is a {}, expected a mapping", kind),
        ));
    }
    if let Some(version) = non_empty_scalar(tree, tree.get(entry, FLAT_VERSION_KEY)) {
        return Ok(ServiceSchema::Flat { version });
    }
    if let Some((container, tag)) = nested_tag(tree, entry) {
        return Ok(ServiceSchema::Nested { container, tag });
    }
    Err(ManifestError::schema(
        service,
        format!(
            "no version tag found under '{}' or '{}.{}.*.{}'",
            FLAT_VERSION_KEY, POD_SPEC_KEY, CONTAINERS_KEY, TAG_KEY
        ),
    ))
}

/// Current version held by an already classified entry.
pub fn version_of(tree: &Tree, schema: &ServiceSchema) -> String {
    tree.scalar_value(schema.version_node())
        .unwrap_or_default()
        .to_string()
}

pub fn get_version(tree: &Tree, service: &str, entry: NodeId) -> Result<String, ManifestError> {
    classify(tree, service, entry).map(|schema| version_of(tree, &schema))
}

/// Overwrite the version through the handle found by [`classify`]. Only that
/// scalar changes; sibling containers and fields are left alone.
pub fn set_version(tree: &mut Tree, schema: &ServiceSchema, version: &str) -> Result<(), ManifestError> {
    tree.set_scalar(schema.version_node(), version)?;
    Ok(())
}

/// Allocate a detached flat entry value: `serviceVersion: <version>`.
pub fn new_flat_entry(tree: &mut Tree, version: &str) -> Result<NodeId, ManifestError> {
    let entry = tree.new_mapping();
    let value = tree.new_scalar(version);
    tree.push_entry(entry, FLAT_VERSION_KEY, value)?;
    Ok(entry)
}

fn non_empty_scalar(tree: &Tree, id: Option<NodeId>) -> Option<NodeId> {
    let id = id?;
    tree.scalar_value(id).filter(|v| !v.is_empty()).map(|_| id)
}

fn nested_tag(tree: &Tree, entry: NodeId) -> Option<(String, NodeId)> {
    let spec = tree.get(entry, POD_SPEC_KEY)?;
    let containers = tree.get(spec, CONTAINERS_KEY)?;
    match tree.kind(containers) {
        NodeKind::Mapping => tree.entries(containers).iter().find_map(|c| {
            let tag = non_empty_scalar(tree, tree.get(c.value, TAG_KEY))?;
            let name = tree.scalar_value(c.key).unwrap_or_default().to_string();
            Some((name, tag))
        }),
        NodeKind::Sequence => tree
            .items(containers)
            .iter()
            .enumerate()
            .find_map(|(index, &item)| {
                let tag = non_empty_scalar(tree, tree.get(item, TAG_KEY))?;
                let name = tree
                    .get(item, CONTAINER_NAME_KEY)
                    .and_then(|n| tree.scalar_value(n))
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("#{}", index));
                Some((name, tag))
            }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse;

    fn entry(tree: &Tree, name: &str) -> NodeId {
        tree.get(tree.root(), name).unwrap()
    }

    #[test]
    fn test_flat_entry() {
        let tree = parse(b"api:\n  serviceVersion: v1.0.6\n").unwrap();
        let schema = classify(&tree, "api", entry(&tree, "api")).unwrap();
        assert_eq!(schema.variant(), SchemaVariant::Flat);
        assert_eq!(version_of(&tree, &schema), "v1.0.6");
    }

    #[test]
    fn test_empty_flat_version_falls_back_to_nested() {
        let yaml = b"api:\n  serviceVersion: \"\"\n  podspec:\n    containers:\n      app:\n        tag: v2\n";
        let tree = parse(yaml).unwrap();
        let schema = classify(&tree, "api", entry(&tree, "api")).unwrap();
        assert_eq!(
            schema,
            ServiceSchema::Nested {
                container: "app".to_string(),
                tag: schema.version_node()
            }
        );
        assert_eq!(version_of(&tree, &schema), "v2");
    }

    #[test]
    fn test_nested_skips_containers_without_tag() {
        let yaml = b"svc:\n  podspec:\n    containers:\n      nginx:\n        env:\n          A: b\n      fpm:\n        tag: v1.17.3\n";
        let tree = parse(yaml).unwrap();
        let schema = classify(&tree, "svc", entry(&tree, "svc")).unwrap();
        match schema {
            ServiceSchema::Nested { ref container, .. } => assert_eq!(container, "fpm"),
            _ => panic!("expected nested schema"),
        }
    }

    #[test]
    fn test_nested_container_sequence() {
        let yaml = b"svc:\n  podspec:\n    containers:\n      - name: sidecar\n      - name: app\n        tag: v3\n";
        let tree = parse(yaml).unwrap();
        let schema = classify(&tree, "svc", entry(&tree, "svc")).unwrap();
        assert_eq!(version_of(&tree, &schema), "v3");
        assert!(matches!(schema, ServiceSchema::Nested { ref container, .. } if container == "app"));
    }

    #[test]
    fn test_unknown_layout_is_schema_error() {
        let tree = parse(b"svc:\n  image: nginx\n").unwrap();
        let err = classify(&tree, "svc", entry(&tree, "svc")).unwrap_err();
        assert_eq!(err.service(), Some("svc"));
        assert!(matches!(err, ManifestError::Schema { .. }));
    }

    #[test]
    fn test_scalar_entry_is_schema_error() {
        let tree = parse(b"svc: v1\n").unwrap();
        assert!(get_version(&tree, "svc", entry(&tree, "svc")).is_err());
    }

    #[test]
    fn test_set_version_quotes_numeric_text() {
        let mut tree = parse(b"svc:\n  serviceVersion: v1\n").unwrap();
        let schema = classify(&tree, "svc", entry(&tree, "svc")).unwrap();
        set_version(&mut tree, &schema, "1234").unwrap();
        assert_eq!(crate::document::to_string(&tree), "svc:\n  serviceVersion: \"1234\"\n");
    }
}
