//! Canonical writer: two-space indentation, comments re-emitted where they
//! were attached, scalars written from their stored source text, and the
//! line ending the document was read with.

use super::node::{DecorLine, NodeData, NodeId, Tree};
use super::parse::block_indent_indicator;

const INDENT: usize = 2;

/// Serialize `tree` to bytes.
pub fn serialize(tree: &Tree) -> Vec<u8> {
    to_string(tree).into_bytes()
}

pub fn to_string(tree: &Tree) -> String {
    let mut emitter = Emitter {
        tree,
        out: String::new(),
    };
    emitter.document();
    if tree.is_crlf() {
        return emitter.out.replace('\n', "\r\n");
    }
    emitter.out
}

struct Emitter<'t> {
    tree: &'t Tree,
    out: String,
}

impl<'t> Emitter<'t> {
    fn document(&mut self) {
        let tree = self.tree;
        let doc = tree.document();
        self.leading(doc, 0);
        if tree.is_explicit_start() {
            self.out.push_str("---");
            self.comment(tree.decor(doc).inline.as_deref());
            self.out.push('\n');
        }
        self.block(tree.root(), 0, None);
        for line in tree.trailing() {
            self.out.push_str(line);
            self.out.push('\n');
        }
    }

    /// Write a node that starts its own line. `prefix` replaces the
    /// indentation of the first line (it carries `- ` markers for sequence items).
    fn block(&mut self, id: NodeId, indent: usize, mut prefix: Option<String>) {
        let tree = self.tree;
        match tree.node(id).data() {
            NodeData::Mapping(entries) if entries.is_empty() => {
                self.start(&mut prefix, indent);
                self.out.push_str("{}\n");
            }
            NodeData::Mapping(entries) => {
                for entry in entries {
                    self.leading(entry.key, indent);
                    self.start(&mut prefix, indent);
                    if let Some(key) = tree.scalar(entry.key) {
                        self.out.push_str(key.raw());
                    }
                    self.out.push(':');
                    self.value(entry.key, entry.value, indent);
                }
            }
            NodeData::Sequence(items) if items.is_empty() => {
                self.start(&mut prefix, indent);
                self.out.push_str("[]\n");
            }
            NodeData::Sequence(items) => {
                for &item in items {
                    match tree.node(item).data() {
                        NodeData::Mapping(inner) if !inner.is_empty() => {
                            let dash = self.dash(&mut prefix, indent);
                            self.block(item, indent + INDENT, Some(dash));
                        }
                        NodeData::Sequence(inner) if !inner.is_empty() => {
                            let dash = self.dash(&mut prefix, indent);
                            self.block(item, indent + INDENT, Some(dash));
                        }
                        NodeData::Scalar(_) => {
                            self.leading(item, indent + INDENT);
                            self.start(&mut prefix, indent);
                            self.out.push('-');
                            self.scalar_tail(item, None, indent, true);
                        }
                        NodeData::Mapping(_) => {
                            self.start(&mut prefix, indent);
                            self.out.push_str("- {}\n");
                        }
                        NodeData::Sequence(_) => {
                            self.start(&mut prefix, indent);
                            self.out.push_str("- []\n");
                        }
                        NodeData::Document { .. } => {}
                    }
                }
            }
            NodeData::Scalar(_) => {
                self.leading(id, indent);
                self.start(&mut prefix, indent);
                self.scalar_tail(id, None, indent, false);
            }
            NodeData::Document { .. } => {}
        }
    }

    /// Everything after `key:` for one mapping entry.
    fn value(&mut self, key: NodeId, value: NodeId, indent: usize) {
        let tree = self.tree;
        let key_comment = tree.decor(key).inline.as_deref();
        match tree.node(value).data() {
            NodeData::Scalar(_) => self.scalar_tail(value, Some(key), indent, true),
            NodeData::Mapping(entries) if entries.is_empty() => {
                self.out.push_str(" {}");
                self.comment(key_comment);
                self.out.push('\n');
            }
            NodeData::Sequence(items) if items.is_empty() => {
                self.out.push_str(" []");
                self.comment(key_comment);
                self.out.push('\n');
            }
            NodeData::Mapping(_) | NodeData::Sequence(_) => {
                self.comment(key_comment);
                self.out.push('\n');
                self.block(value, indent + INDENT, None);
            }
            NodeData::Document { .. } => self.out.push('\n'),
        }
    }

    fn scalar_tail(&mut self, id: NodeId, key: Option<NodeId>, indent: usize, space: bool) {
        let tree = self.tree;
        let Some(scalar) = tree.scalar(id) else {
            self.out.push('\n');
            return;
        };
        if !scalar.raw().is_empty() {
            if space {
                self.out.push(' ');
            }
            self.out.push_str(scalar.raw());
        }
        let comment = tree
            .decor(id)
            .inline
            .as_deref()
            .or_else(|| key.and_then(|k| tree.decor(k).inline.as_deref()));
        self.comment(comment);
        self.out.push('\n');

        let width = if scalar.is_block() {
            block_indent_indicator(scalar.header())
                .ok()
                .flatten()
                .unwrap_or(INDENT)
        } else {
            0
        };
        for line in &scalar.block {
            if !line.is_empty() {
                self.spaces(indent + width);
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
    }

    fn leading(&mut self, id: NodeId, indent: usize) {
        let tree = self.tree;
        for line in &tree.decor(id).leading {
            match line {
                DecorLine::Blank => {}
                DecorLine::Comment { offset, text } => {
                    let column = (indent as isize + offset).max(0) as usize;
                    self.spaces(column);
                    self.out.push_str(text);
                }
            }
            self.out.push('\n');
        }
    }

    fn comment(&mut self, comment: Option<&str>) {
        if let Some(text) = comment {
            self.out.push(' ');
            self.out.push_str(text);
        }
    }

    fn start(&mut self, prefix: &mut Option<String>, indent: usize) {
        match prefix.take() {
            Some(p) => self.out.push_str(&p),
            None => self.spaces(indent),
        }
    }

    fn dash(&self, prefix: &mut Option<String>, indent: usize) -> String {
        let mut dash = prefix.take().unwrap_or_else(|| " ".repeat(indent));
        dash.push_str("- ");
        dash
    }

    fn spaces(&mut self, n: usize) {
        self.out.extend(std::iter::repeat(' ').take(n));
    }
}
