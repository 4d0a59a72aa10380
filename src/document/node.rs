//! Arena storage for document nodes.
//!
//! Nodes are never removed; a [`NodeId`] stays valid for the life of the
//! [`Tree`] that issued it.

use super::scalar::{self, ScalarStyle};
use super::DocumentError;
use std::fmt;

/// Stable handle to a node inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Mapping,
    Sequence,
    Scalar,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Document => "document",
            NodeKind::Mapping => "mapping",
            NodeKind::Sequence => "sequence",
            NodeKind::Scalar => "scalar",
        };
        f.write_str(name)
    }
}

/// One full line of decoration that sits above a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecorLine {
    Blank,
    /// Comment text including the leading `#`, placed `offset` columns
    /// from the indentation of the node that owns it.
    Comment { offset: isize, text: String },
}

/// Comments and blank lines attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decor {
    pub leading: Vec<DecorLine>,
    /// End-of-line comment including the leading `#`.
    pub inline: Option<String>,
}

impl Decor {
    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.inline.is_none()
    }
}

/// A scalar value together with the source text it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub(crate) style: ScalarStyle,
    /// Inline source text, or the `|`/`>` header for block scalars. Starts
    /// with `props` when the scalar has a tag or anchor.
    pub(crate) raw: String,
    /// Tag and anchor tokens in front of the value.
    pub(crate) props: String,
    pub(crate) value: String,
    /// Lines after the first. For block scalars they are relative to the block
    /// indentation; for wrapped flow scalars, to the indentation of the owning
    /// mapping or sequence. Blank lines are empty.
    pub(crate) block: Vec<String>,
}

impl Scalar {
    pub(crate) fn inline(style: ScalarStyle, raw: String, value: String) -> Self {
        Self {
            style,
            raw,
            props: String::new(),
            value,
            block: Vec::new(),
        }
    }

    pub(crate) fn with_properties(mut self, props: &str) -> Self {
        self.props = props.to_string();
        self
    }

    pub(crate) fn empty() -> Self {
        Self::inline(ScalarStyle::Empty, String::new(), String::new())
    }

    /// Scalar that serializes `value` with the canonical quoting rules.
    pub(crate) fn encoded(value: &str) -> Self {
        let (style, raw) = scalar::encode(value);
        Self::inline(style, raw, value.to_string())
    }

    pub fn style(&self) -> ScalarStyle {
        self.style
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Source text without the tag and anchor.
    pub fn header(&self) -> &str {
        self.raw[self.props.len()..].trim_start()
    }

    pub fn properties(&self) -> &str {
        &self.props
    }

    /// Decoded text. Null-like and empty scalars decode to `""`.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_block(&self) -> bool {
        matches!(self.style, ScalarStyle::Literal | ScalarStyle::Folded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEntry {
    pub key: NodeId,
    pub value: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document {
        root: NodeId,
        explicit_start: bool,
        /// Comment and blank lines after the last content line, kept verbatim.
        trailing: Vec<String>,
        /// Lines end in `\r\n` rather than `\n`.
        crlf: bool,
    },
    Mapping(Vec<MapEntry>),
    Sequence(Vec<NodeId>),
    Scalar(Scalar),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) data: NodeData,
    pub(crate) decor: Decor,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            data,
            decor: Decor::default(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Document { .. } => NodeKind::Document,
            NodeData::Mapping(_) => NodeKind::Mapping,
            NodeData::Sequence(_) => NodeKind::Sequence,
            NodeData::Scalar(_) => NodeKind::Scalar,
        }
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn decor(&self) -> &Decor {
        &self.decor
    }
}

/// Arena-backed document tree.
///
/// Every node is addressed through a [`NodeId`]. Entries keep their source
/// order and each node carries its own [`Decor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    nodes: Vec<Node>,
    document: NodeId,
}

impl Tree {
    pub(crate) fn builder() -> TreeBuilder {
        TreeBuilder { nodes: Vec::new() }
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn root(&self) -> NodeId {
        match &self.nodes[self.document.0].data {
            NodeData::Document { root, .. } => *root,
            _ => self.document,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind()
    }

    pub fn decor(&self, id: NodeId) -> &Decor {
        &self.nodes[id.0].decor
    }

    pub fn decor_mut(&mut self, id: NodeId) -> &mut Decor {
        &mut self.nodes[id.0].decor
    }

    pub fn scalar(&self, id: NodeId) -> Option<&Scalar> {
        match &self.nodes[id.0].data {
            NodeData::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Decoded value of a scalar node.
    pub fn scalar_value(&self, id: NodeId) -> Option<&str> {
        self.scalar(id).map(Scalar::value)
    }

    /// Mapping entries in source order; empty for other kinds.
    pub fn entries(&self, id: NodeId) -> &[MapEntry] {
        match &self.nodes[id.0].data {
            NodeData::Mapping(entries) => entries,
            _ => &[],
        }
    }

    /// Sequence items in source order; empty for other kinds.
    pub fn items(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].data {
            NodeData::Sequence(items) => items,
            _ => &[],
        }
    }

    /// Value of the first entry of `mapping` whose key decodes to `key`.
    pub fn get(&self, mapping: NodeId, key: &str) -> Option<NodeId> {
        self.entries(mapping)
            .iter()
            .find(|entry| self.scalar_value(entry.key) == Some(key))
            .map(|entry| entry.value)
    }

    pub fn is_explicit_start(&self) -> bool {
        matches!(
            self.nodes[self.document.0].data,
            NodeData::Document {
                explicit_start: true,
                ..
            }
        )
    }

    pub fn is_crlf(&self) -> bool {
        matches!(
            self.nodes[self.document.0].data,
            NodeData::Document { crlf: true, .. }
        )
    }

    pub fn trailing(&self) -> &[String] {
        match &self.nodes[self.document.0].data {
            NodeData::Document { trailing, .. } => trailing,
            _ => &[],
        }
    }

    /// Allocate a detached scalar holding `value`.
    pub fn new_scalar(&mut self, value: &str) -> NodeId {
        self.push(Node::new(NodeData::Scalar(Scalar::encoded(value))))
    }

    /// Allocate a detached, empty mapping.
    pub fn new_mapping(&mut self) -> NodeId {
        self.push(Node::new(NodeData::Mapping(Vec::new())))
    }

    /// Overwrite the value of a scalar node, re-encoding it. Decor, tags and
    /// anchors are kept; an alias becomes a plain value.
    pub fn set_scalar(&mut self, id: NodeId, value: &str) -> Result<(), DocumentError> {
        let found = self.kind(id);
        if let NodeData::Scalar(s) = &mut self.nodes[id.0].data {
            let props = std::mem::take(&mut s.props);
            let mut scalar = Scalar::encoded(value);
            if !props.is_empty() {
                scalar.raw = format!("{} {}", props, scalar.raw);
                scalar.props = props;
            }
            *s = scalar;
            return Ok(());
        }
        Err(DocumentError::WrongKind {
            expected: NodeKind::Scalar,
            found,
        })
    }

    /// Append `key: value` to the end of `mapping`.
    pub fn push_entry(
        &mut self,
        mapping: NodeId,
        key: &str,
        value: NodeId,
    ) -> Result<NodeId, DocumentError> {
        let found = self.kind(mapping);
        if found != NodeKind::Mapping {
            return Err(DocumentError::WrongKind {
                expected: NodeKind::Mapping,
                found,
            });
        }
        let key = self.new_scalar(key);
        if let NodeData::Mapping(entries) = &mut self.nodes[mapping.0].data {
            entries.push(MapEntry { key, value });
        }
        Ok(key)
    }

    /// Point the entry at `index` of `mapping` to a different value node.
    pub fn replace_entry_value(
        &mut self,
        mapping: NodeId,
        index: usize,
        value: NodeId,
    ) -> Result<(), DocumentError> {
        let found = self.kind(mapping);
        let NodeData::Mapping(entries) = &mut self.nodes[mapping.0].data else {
            return Err(DocumentError::WrongKind {
                expected: NodeKind::Mapping,
                found,
            });
        };
        let entry = entries.get_mut(index).ok_or_else(|| {
            DocumentError::shape(format!("mapping has no entry at index {}", index))
        })?;
        entry.value = value;
        Ok(())
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }
}

/// Allocation front-end used while parsing, before the document node exists.
pub(crate) struct TreeBuilder {
    nodes: Vec<Node>,
}

impl TreeBuilder {
    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub(crate) fn push_entry(&mut self, mapping: NodeId, entry: MapEntry) {
        if let NodeData::Mapping(entries) = &mut self.nodes[mapping.0].data {
            entries.push(entry);
        }
    }

    pub(crate) fn push_item(&mut self, sequence: NodeId, item: NodeId) {
        if let NodeData::Sequence(items) = &mut self.nodes[sequence.0].data {
            items.push(item);
        }
    }

    pub(crate) fn finish(
        mut self,
        root: NodeId,
        explicit_start: bool,
        decor: Decor,
        trailing: Vec<String>,
        crlf: bool,
    ) -> Tree {
        let mut document = Node::new(NodeData::Document {
            root,
            explicit_start,
            trailing,
            crlf,
        });
        document.decor = decor;
        let document = self.push(document);
        Tree {
            nodes: self.nodes,
            document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree() -> (Tree, NodeId) {
        let mut builder = Tree::builder();
        let root = builder.push(Node::new(NodeData::Mapping(Vec::new())));
        let key = builder.push(Node::new(NodeData::Scalar(Scalar::encoded("name"))));
        let value = builder.push(Node::new(NodeData::Scalar(Scalar::encoded("api"))));
        builder.push_entry(root, MapEntry { key, value });
        (builder.finish(root, false, Decor::default(), Vec::new(), false), value)
    }

    #[test]
    fn test_get_by_key() {
        let (tree, value) = small_tree();
        assert_eq!(tree.get(tree.root(), "name"), Some(value));
        assert_eq!(tree.get(tree.root(), "missing"), None);
    }

    #[test]
    fn test_set_scalar_rejects_mapping() {
        let (mut tree, _) = small_tree();
        let root = tree.root();
        let err = tree.set_scalar(root, "x").unwrap_err();
        assert_eq!(
            err,
            DocumentError::WrongKind {
                expected: NodeKind::Scalar,
                found: NodeKind::Mapping
            }
        );
    }

    #[test]
    fn test_set_scalar_keeps_properties() {
        let (mut tree, value) = small_tree();
        if let NodeData::Scalar(s) = &mut tree.nodes[value.0].data {
            s.raw = "&svc api".to_string();
            s.props = "&svc".to_string();
        }
        tree.set_scalar(value, "1234").unwrap();
        let scalar = tree.scalar(value).unwrap();
        assert_eq!(scalar.raw(), "&svc \"1234\"");
        assert_eq!(scalar.header(), "\"1234\"");
        assert_eq!(scalar.value(), "1234");
    }

    #[test]
    fn test_push_entry_appends_in_order() {
        let (mut tree, _) = small_tree();
        let root = tree.root();
        let value = tree.new_scalar("v2");
        tree.push_entry(root, "version", value).unwrap();
        let keys: Vec<_> = tree
            .entries(root)
            .iter()
            .map(|e| tree.scalar_value(e.key).unwrap())
            .collect();
        assert_eq!(keys, vec!["name", "version"]);
    }
}
