//! Scalar decoding and canonical encoding.

use serde::{Deserialize, Serialize};

/// How a scalar was (or will be) written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// `|` block scalar.
    Literal,
    /// `>` block scalar.
    Folded,
    /// Flow collection kept as opaque text.
    Flow,
    /// `*name` reference to an anchored scalar.
    Alias,
    /// Nothing after the `:` separator.
    Empty,
}

const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

const NULL_WORDS: &[&str] = &["~", "null", "Null", "NULL"];

/// Node properties (`!tag`, `&anchor`) written in front of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Properties<'a> {
    /// The property tokens as written, without trailing space. Empty when none.
    pub prefix: &'a str,
    pub anchor: Option<&'a str>,
    /// Text after the properties.
    pub body: &'a str,
}

/// Split leading node properties off `raw`. At most one tag and one anchor.
pub(crate) fn split_properties(raw: &str) -> Result<Properties<'_>, String> {
    let mut rest = raw;
    let mut tagged = false;
    let mut anchor = None;
    loop {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = &rest[..end];
        if let Some(name) = token.strip_prefix('&') {
            if name.is_empty() || anchor.is_some() {
                return Err(format!("invalid anchor in `{}`", raw));
            }
            anchor = Some(name);
        } else if token.starts_with('!') {
            if tagged {
                return Err(format!("more than one tag in `{}`", raw));
            }
            tagged = true;
        } else {
            break;
        }
        rest = rest[end..].trim_start();
    }
    Ok(Properties {
        prefix: raw[..raw.len() - rest.len()].trim_end(),
        anchor,
        body: rest,
    })
}

/// Name referenced by an alias such as `*base`.
pub(crate) fn alias_name(raw: &str) -> Option<Result<&str, String>> {
    let name = raw.strip_prefix('*')?;
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Some(Err(format!("invalid alias `{}`", raw)));
    }
    Some(Ok(name))
}

/// Decode the text of an inline scalar into its style and value. Tags and
/// anchors are skipped; aliases cannot be decoded without their anchor.
pub fn decode_inline(raw: &str) -> Result<(ScalarStyle, String), String> {
    if raw.starts_with('*') {
        return Err(format!("alias `{}` is not allowed here", raw));
    }
    decode_body(split_properties(raw)?.body)
}

/// Decode scalar text that carries no node properties.
pub(crate) fn decode_body(raw: &str) -> Result<(ScalarStyle, String), String> {
    if raw.is_empty() {
        return Ok((ScalarStyle::Empty, String::new()));
    }
    if raw.starts_with('"') {
        if raw.len() < 2 || !raw.ends_with('"') {
            return Err(format!("unterminated double-quoted scalar `{}`", raw));
        }
        return serde_yaml::from_str::<String>(raw)
            .map(|value| (ScalarStyle::DoubleQuoted, value))
            .map_err(|e| format!("invalid double-quoted scalar `{}`: {}", raw, e));
    }
    if raw.starts_with('\'') {
        if raw.len() < 2 || !raw.ends_with('\'') {
            return Err(format!("unterminated single-quoted scalar `{}`", raw));
        }
        let inner = &raw[1..raw.len() - 1];
        let inner = if inner.contains('\n') {
            fold_lines(inner.split('\n').map(str::trim))
        } else {
            inner.to_string()
        };
        return Ok((ScalarStyle::SingleQuoted, inner.replace("''", "'")));
    }
    if raw.starts_with('[') || raw.starts_with('{') {
        return Ok((ScalarStyle::Flow, raw.to_string()));
    }
    if NULL_WORDS.contains(&raw) {
        return Ok((ScalarStyle::Plain, String::new()));
    }
    Ok((ScalarStyle::Plain, raw.to_string()))
}

/// Byte offset of the quote closing the quoted scalar that starts `text`.
pub(crate) fn closing_quote(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let quote = *bytes.first()?;
    let mut i = 1;
    while i < bytes.len() {
        let c = bytes[i];
        if quote == b'"' && c == b'\\' {
            i += 2;
            continue;
        }
        if c == quote {
            if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Flow folding: adjacent lines join with a space, each empty line becomes
/// a line break.
pub(crate) fn fold_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    let mut previous_empty = true;
    for line in lines {
        if line.is_empty() {
            out.push('\n');
            previous_empty = true;
            continue;
        }
        if !previous_empty {
            out.push(' ');
        }
        out.push_str(line);
        previous_empty = false;
    }
    out
}

/// Encode `value` for output: plain when it reads back as the same string,
/// double-quoted otherwise.
pub fn encode(value: &str) -> (ScalarStyle, String) {
    if is_plain_safe(value) {
        return (ScalarStyle::Plain, value.to_string());
    }
    let quoted = serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value));
    (ScalarStyle::DoubleQuoted, quoted)
}

/// True when `value` can be written unquoted and still decode to a string
/// equal to `value`.
pub fn is_plain_safe(value: &str) -> bool {
    let Some(first) = value.chars().next() else {
        return false;
    };
    if INDICATORS.contains(&first) || value.trim() != value {
        return false;
    }
    if value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || value.chars().any(char::is_control)
    {
        return false;
    }
    matches!(
        serde_yaml::from_str::<serde_yaml::Value>(value),
        Ok(serde_yaml::Value::String(ref s)) if s == value
    )
}
