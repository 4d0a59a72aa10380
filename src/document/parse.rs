//! Line-oriented reader for block-style manifest documents.
//!
//! Supported: block mappings and sequences (including compact `- key: v`
//! items), plain/quoted scalars, `|`/`>` block scalars, a leading `---`
//! marker, full-line and end-of-line comments, plain and quoted scalars
//! wrapped over several lines, tags and anchors on scalars, and aliases to
//! anchored scalars. Flow collections are kept as opaque scalar text.
//! Multi-document streams, directives, tab indentation and properties on
//! collections are rejected.

use super::node::{Decor, DecorLine, MapEntry, Node, NodeData, NodeId, Scalar, Tree, TreeBuilder};
use super::scalar::{self, ScalarStyle};
use super::DocumentError;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Debug, Clone)]
struct Line {
    number: usize,
    indent: usize,
    /// Content after the indentation, right-trimmed. Empty for blank lines.
    text: String,
}

impl Line {
    fn is_blank(&self) -> bool {
        self.text.is_empty()
    }

    fn is_decor(&self) -> bool {
        self.is_blank() || self.text.starts_with('#')
    }

    fn verbatim(&self) -> String {
        if self.is_blank() {
            String::new()
        } else {
            format!("{}{}", " ".repeat(self.indent), self.text)
        }
    }
}

/// Parse `input` into a [`Tree`].
pub fn parse(input: &[u8]) -> Result<Tree> {
    let text = std::str::from_utf8(input).map_err(|e| DocumentError::Encoding(e.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let crlf = text
        .find('\n')
        .map_or(false, |end| text[..end].ends_with('\r'));
    let lines = split_lines(text)?;
    Parser::new(lines).document(crlf)
}

fn split_lines(text: &str) -> Result<Vec<Line>> {
    let mut raw: Vec<&str> = text.split('\n').collect();
    if text.ends_with('\n') {
        raw.pop();
    }
    raw.into_iter()
        .enumerate()
        .map(|(i, line)| {
            let number = i + 1;
            let line = line.strip_suffix('\r').unwrap_or(line);
            let content = line.trim_start_matches(' ');
            let text = content.trim_end();
            if text.is_empty() {
                return Ok(Line {
                    number,
                    indent: 0,
                    text: String::new(),
                });
            }
            if content.starts_with('\t') {
                return Err(DocumentError::syntax(
                    number,
                    "tab characters are not allowed in indentation",
                ));
            }
            Ok(Line {
                number,
                indent: line.len() - content.len(),
                text: text.to_string(),
            })
        })
        .collect()
}

struct Parser {
    lines: Vec<Line>,
    pos: usize,
    tree: TreeBuilder,
    /// Comment and blank lines waiting for the next node.
    pending: Vec<Line>,
    /// Decoded values of anchored scalars seen so far.
    anchors: HashMap<String, String>,
}

impl Parser {
    fn new(lines: Vec<Line>) -> Self {
        Self {
            lines,
            pos: 0,
            tree: Tree::builder(),
            pending: Vec::new(),
            anchors: HashMap::new(),
        }
    }

    fn document(mut self, crlf: bool) -> Result<Tree> {
        self.collect_decor();
        let mut decor = Decor::default();
        let mut explicit_start = false;

        if let Some(line) = self.current() {
            if line.text.starts_with('%') {
                return Err(DocumentError::syntax(
                    line.number,
                    "directives are not supported",
                ));
            }
            if is_document_start(&line.text) {
                let (body, comment) = split_inline_comment(&line.text);
                if body != "---" {
                    return Err(DocumentError::syntax(
                        line.number,
                        "content on the document start line is not supported",
                    ));
                }
                decor.inline = comment.map(str::to_string);
                decor.leading = self.take_leading(0);
                explicit_start = true;
                self.pos += 1;
                self.collect_decor();
            }
        }

        let indent = match self.current() {
            Some(line) => line.indent,
            None => return Err(DocumentError::Empty),
        };
        let root = self.block(indent)?;

        self.collect_decor();
        if let Some(line) = self.current() {
            let reason = if is_document_start(&line.text) || line.text == "..." {
                "multiple documents are not supported"
            } else {
                "line is indented less than the document root"
            };
            return Err(DocumentError::syntax(line.number, reason));
        }

        let trailing = self.pending.drain(..).map(|l| l.verbatim()).collect();
        Ok(self.tree.finish(root, explicit_start, decor, trailing, crlf))
    }

    fn current(&self) -> Option<Line> {
        self.lines.get(self.pos).cloned()
    }

    fn collect_decor(&mut self) {
        while let Some(line) = self.lines.get(self.pos) {
            if !line.is_decor() {
                break;
            }
            self.pending.push(line.clone());
            self.pos += 1;
        }
    }

    /// Drain pending lines into decor for a node indented at `indent`.
    fn take_leading(&mut self, indent: usize) -> Vec<DecorLine> {
        self.pending
            .drain(..)
            .map(|line| {
                if line.is_blank() {
                    DecorLine::Blank
                } else {
                    DecorLine::Comment {
                        offset: line.indent as isize - indent as isize,
                        text: line.text,
                    }
                }
            })
            .collect()
    }

    fn scalar_node(&mut self, scalar: Scalar, decor: Decor) -> NodeId {
        let id = self.tree.push(Node::new(NodeData::Scalar(scalar)));
        self.tree.node_mut(id).decor = decor;
        id
    }

    /// Parse the collection or scalar whose first line is the current line.
    fn block(&mut self, indent: usize) -> Result<NodeId> {
        let Some(line) = self.current() else {
            return Ok(self.scalar_node(Scalar::empty(), Decor::default()));
        };
        if is_seq_item(&line.text) {
            return self.sequence(indent);
        }
        let (body, _) = split_inline_comment(&line.text);
        if find_mapping_colon(body).is_some() {
            return self.mapping(indent);
        }
        self.scalar_line(indent)
    }

    fn mapping(&mut self, indent: usize) -> Result<NodeId> {
        let map = self.tree.push(Node::new(NodeData::Mapping(Vec::new())));
        loop {
            self.collect_decor();
            let Some(line) = self.current() else { break };
            if line.indent < indent || is_document_start(&line.text) || line.text == "..." {
                break;
            }
            if line.indent > indent {
                return Err(DocumentError::syntax(line.number, "unexpected indentation"));
            }
            if is_seq_item(&line.text) {
                return Err(DocumentError::syntax(
                    line.number,
                    "sequence item where a mapping key was expected",
                ));
            }

            let (body, comment) = split_inline_comment(&line.text);
            let colon = find_mapping_colon(body).ok_or_else(|| {
                DocumentError::syntax(line.number, "expected a `key: value` entry")
            })?;
            let key_raw = body[..colon].trim_end();
            if key_raw.is_empty() {
                return Err(DocumentError::syntax(line.number, "mapping key is empty"));
            }
            if key_raw.starts_with('?') {
                return Err(DocumentError::syntax(
                    line.number,
                    "complex mapping keys are not supported",
                ));
            }
            let (style, value) =
                scalar::decode_inline(key_raw).map_err(|r| DocumentError::syntax(line.number, r))?;
            let leading = self.take_leading(indent);
            let key = self.scalar_node(
                Scalar::inline(style, key_raw.to_string(), value),
                Decor {
                    leading,
                    inline: None,
                },
            );
            self.pos += 1;

            let rest = body[colon + 1..].trim();
            let comment = comment.map(str::to_string);
            let value = if rest.is_empty() {
                self.tree.node_mut(key).decor.inline = comment;
                self.nested_value(indent)?
            } else {
                let scalar = self.value_scalar(rest, comment.is_some(), indent, line.number)?;
                self.scalar_node(
                    scalar,
                    Decor {
                        leading: Vec::new(),
                        inline: comment,
                    },
                )
            };
            self.tree.push_entry(map, MapEntry { key, value });
        }
        Ok(map)
    }

    /// Value of a `key:` line with nothing after the separator.
    fn nested_value(&mut self, parent_indent: usize) -> Result<NodeId> {
        self.collect_decor();
        match self.current() {
            Some(line) if line.indent > parent_indent => self.block(line.indent),
            Some(line) if line.indent == parent_indent && is_seq_item(&line.text) => {
                self.sequence(parent_indent)
            }
            _ => Ok(self.scalar_node(Scalar::empty(), Decor::default())),
        }
    }

    fn sequence(&mut self, indent: usize) -> Result<NodeId> {
        let seq = self.tree.push(Node::new(NodeData::Sequence(Vec::new())));
        loop {
            self.collect_decor();
            let Some(line) = self.current() else { break };
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(DocumentError::syntax(line.number, "unexpected indentation"));
            }
            if !is_seq_item(&line.text) {
                break;
            }

            let rest = line.text[1..].trim_start();
            let item = if rest.is_empty() || rest.starts_with('#') {
                if !rest.is_empty() {
                    self.pending.push(Line {
                        number: line.number,
                        indent: indent + 2,
                        text: rest.to_string(),
                    });
                }
                self.pos += 1;
                self.collect_decor();
                match self.current() {
                    Some(next) if next.indent > indent => self.block(next.indent)?,
                    _ => self.scalar_node(Scalar::empty(), Decor::default()),
                }
            } else {
                // Re-read the item body as if it started on its own line.
                let child_indent = indent + (line.text.len() - rest.len());
                self.lines[self.pos] = Line {
                    number: line.number,
                    indent: child_indent,
                    text: rest.to_string(),
                };
                let (body, _) = split_inline_comment(rest);
                if is_seq_item(rest) || find_mapping_colon(body).is_some() {
                    self.block(child_indent)?
                } else {
                    self.scalar_line(indent)?
                }
            };
            self.tree.push_item(seq, item);
        }
        Ok(seq)
    }

    /// A scalar occupying the current line on its own (document root or
    /// sequence item). Block scalar bodies must be indented past `block_parent`.
    fn scalar_line(&mut self, block_parent: usize) -> Result<NodeId> {
        let Some(line) = self.current() else {
            return Ok(self.scalar_node(Scalar::empty(), Decor::default()));
        };
        let (body, comment) = split_inline_comment(&line.text);
        let leading = self.take_leading(line.indent);
        self.pos += 1;
        let scalar = self.value_scalar(body, comment.is_some(), block_parent, line.number)?;
        Ok(self.scalar_node(
            scalar,
            Decor {
                leading,
                inline: comment.map(str::to_string),
            },
        ))
    }

    /// Scalar whose text starts with `text` on line `number`, which has been
    /// consumed. Block bodies and wrapped lines must be indented past
    /// `parent_indent`.
    fn value_scalar(
        &mut self,
        text: &str,
        commented: bool,
        parent_indent: usize,
        number: usize,
    ) -> Result<Scalar> {
        let syntax = move |reason: String| DocumentError::syntax(number, reason);
        if let Some(name) = scalar::alias_name(text) {
            let name = name.map_err(syntax)?;
            let value = self
                .anchors
                .get(name)
                .cloned()
                .ok_or_else(|| syntax(format!("alias `*{}` has no matching scalar anchor", name)))?;
            return Ok(Scalar::inline(ScalarStyle::Alias, text.to_string(), value));
        }

        let props = scalar::split_properties(text).map_err(syntax)?;
        if !props.prefix.is_empty() {
            if props.body.is_empty() {
                return Err(syntax("tags and anchors on collections are not supported".to_string()));
            }
            if props.body.starts_with('*') {
                return Err(syntax(format!("alias in `{}` cannot carry a tag or anchor", text)));
            }
        }
        let mut scalar = if is_block_header(props.body) {
            self.block_scalar(props.body, parent_indent, number)?
        } else {
            self.flow_scalar(props.body, commented, parent_indent, number)?
        };
        if let Some(anchor) = props.anchor {
            self.anchors.insert(anchor.to_string(), scalar.value.clone());
        }
        scalar.raw = text.to_string();
        Ok(scalar.with_properties(props.prefix))
    }

    /// Plain or quoted scalar, folded over continuation lines when it wraps.
    fn flow_scalar(
        &mut self,
        body: &str,
        commented: bool,
        parent_indent: usize,
        number: usize,
    ) -> Result<Scalar> {
        let quoted = body.starts_with('"') || body.starts_with('\'');
        let wraps = if quoted {
            scalar::closing_quote(body).is_none()
        } else {
            !commented
                && !body.starts_with('[')
                && !body.starts_with('{')
                && self.plain_continues(parent_indent)
        };
        if !wraps {
            let (style, value) =
                scalar::decode_body(body).map_err(|r| DocumentError::syntax(number, r))?;
            return Ok(Scalar::inline(style, body.to_string(), value));
        }

        let start = self.pos;
        let mut end = start;
        let mut taken = start;
        let mut quoted_text = body.to_string();
        let mut pieces = vec![body.to_string()];
        let mut closed = false;
        while let Some(line) = self.lines.get(end) {
            if line.is_blank() {
                end += 1;
                continue;
            }
            if line.indent <= parent_indent {
                break;
            }
            let blanks = end - taken;
            if quoted {
                for _ in 0..blanks {
                    quoted_text.push('\n');
                }
                quoted_text.push_str("\n ");
                quoted_text.push_str(&line.text);
                end += 1;
                taken = end;
                if let Some(close) = scalar::closing_quote(&quoted_text) {
                    let tail = quoted_text[close + 1..].trim();
                    if !tail.is_empty() && !tail.starts_with('#') {
                        return Err(DocumentError::syntax(
                            line.number,
                            "unexpected text after a quoted scalar",
                        ));
                    }
                    quoted_text.truncate(close + 1);
                    closed = true;
                    break;
                }
            } else {
                if line.text.starts_with('#') {
                    break;
                }
                let (content, comment) = split_inline_comment(&line.text);
                if find_mapping_colon(content).is_some() {
                    return Err(DocumentError::syntax(line.number, "unexpected indentation"));
                }
                pieces.extend(std::iter::repeat(String::new()).take(blanks));
                pieces.push(content.to_string());
                end += 1;
                taken = end;
                if comment.is_some() {
                    break;
                }
            }
        }
        if quoted && !closed {
            return Err(DocumentError::syntax(
                number,
                format!("unterminated quoted scalar `{}`", body),
            ));
        }

        let continuation = self.lines[start..taken]
            .iter()
            .map(|line| {
                if line.is_blank() {
                    String::new()
                } else {
                    format!("{}{}", " ".repeat(line.indent - parent_indent), line.text)
                }
            })
            .collect();
        self.pos = taken;

        let (style, value) = if quoted {
            scalar::decode_body(&quoted_text).map_err(|r| DocumentError::syntax(number, r))?
        } else {
            (
                ScalarStyle::Plain,
                scalar::fold_lines(pieces.iter().map(String::as_str)),
            )
        };
        let mut scalar = Scalar::inline(style, body.to_string(), value);
        scalar.block = continuation;
        Ok(scalar)
    }

    /// The next content line continues a plain scalar.
    fn plain_continues(&self, parent_indent: usize) -> bool {
        self.lines[self.pos..]
            .iter()
            .find(|line| !line.is_blank())
            .map_or(false, |line| line.indent > parent_indent && !line.text.starts_with('#'))
    }

    /// Consume the body of a `|` or `>` scalar whose header line was just read.
    fn block_scalar(&mut self, header: &str, parent_indent: usize, number: usize) -> Result<Scalar> {
        let explicit = block_indent_indicator(header)
            .map_err(|reason| DocumentError::syntax(number, reason))?;
        let mut block_indent = explicit.map(|width| parent_indent + width);

        let start = self.pos;
        let mut end = start;
        while let Some(line) = self.lines.get(end) {
            if line.is_blank() {
                end += 1;
                continue;
            }
            if line.indent <= parent_indent {
                break;
            }
            let expected = *block_indent.get_or_insert(line.indent);
            if line.indent < expected {
                return Err(DocumentError::syntax(
                    line.number,
                    "block scalar line is indented less than the block",
                ));
            }
            end += 1;
        }
        while end > start && self.lines[end - 1].is_blank() {
            end -= 1;
        }

        let width = block_indent.unwrap_or(parent_indent + 2);
        let body: Vec<String> = self.lines[start..end]
            .iter()
            .map(|line| {
                if line.is_blank() {
                    String::new()
                } else {
                    format!("{}{}", " ".repeat(line.indent - width), line.text)
                }
            })
            .collect();
        self.pos = end;

        let folded = header.starts_with('>');
        let mut value = if folded { fold(&body) } else { body.join("\n") };
        if !header.contains('-') && !body.is_empty() {
            value.push('\n');
        }
        let style = if folded {
            ScalarStyle::Folded
        } else {
            ScalarStyle::Literal
        };
        let mut scalar = Scalar::inline(style, header.to_string(), value);
        scalar.block = body;
        Ok(scalar)
    }
}

fn fold(body: &[String]) -> String {
    let mut out = String::new();
    for (i, line) in body.iter().enumerate() {
        if line.is_empty() {
            out.push('\n');
            continue;
        }
        if i > 0 && !body[i - 1].is_empty() {
            out.push(' ');
        }
        out.push_str(line);
    }
    out
}

fn is_document_start(text: &str) -> bool {
    text == "---" || text.starts_with("--- ")
}

fn is_seq_item(text: &str) -> bool {
    text == "-" || text.starts_with("- ")
}

fn is_block_header(text: &str) -> bool {
    text.starts_with('|') || text.starts_with('>')
}

/// Explicit indentation width from a block scalar header such as `|2-`.
pub(crate) fn block_indent_indicator(header: &str) -> std::result::Result<Option<usize>, String> {
    let indicators = &header[1..];
    if indicators.len() > 2 {
        return Err(format!("invalid block scalar header `{}`", header));
    }
    let mut width = None;
    for c in indicators.chars() {
        match c {
            '+' | '-' => {}
            '1'..='9' if width.is_none() => width = c.to_digit(10).map(|d| d as usize),
            _ => return Err(format!("invalid block scalar header `{}`", header)),
        }
    }
    Ok(width)
}

/// Split `text` into content and an end-of-line comment. A `#` starts a
/// comment at the beginning of the text or after whitespace, outside quotes.
pub(crate) fn split_inline_comment(text: &str) -> (&str, Option<&str>) {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match quote {
            Some(b'\'') => {
                if c == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 1;
                    } else {
                        quote = None;
                    }
                }
            }
            Some(_) => {
                if c == b'\\' {
                    i += 1;
                } else if c == b'"' {
                    quote = None;
                }
            }
            None => {
                let token_start = i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'\t';
                if c == b'#' && token_start {
                    return (text[..i].trim_end(), Some(text[i..].trim_end()));
                }
                if token_start && (c == b'"' || c == b'\'') {
                    quote = Some(c);
                }
            }
        }
        i += 1;
    }
    (text, None)
}

/// Byte offset of the `:` separating a mapping key from its value.
pub(crate) fn find_mapping_colon(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;
    match bytes.first() {
        Some(b'[') | Some(b'{') | None => return None,
        Some(&q) if q == b'"' || q == b'\'' => {
            i = 1;
            loop {
                let c = *bytes.get(i)?;
                if q == b'"' && c == b'\\' {
                    i += 2;
                    continue;
                }
                if c == q {
                    if q == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                        continue;
                    }
                    break;
                }
                i += 1;
            }
        }
        _ => {}
    }
    while i < bytes.len() {
        if bytes[i] == b':' {
            match bytes.get(i + 1) {
                None | Some(b' ') | Some(b'\t') => return Some(i),
                _ => {}
            }
        }
        i += 1;
    }
    None
}
