//! Structure-preserving document tree.
//!
//! 保留注释与顺序的 YAML 文档树。
//!
//! A [`Tree`] is an arena of nodes addressed by [`NodeId`] handles. Each node
//! carries its own [`Decor`] (leading comment/blank lines and an end-of-line
//! comment), so a document can be read, edited in place and written back
//! without losing the hand-written parts.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`parse`] | Bytes to [`Tree`] |
//! | [`serialize`] | [`Tree`] to bytes, two-space indentation |
//! | [`scalar`] | Scalar decoding and canonical quoting |

mod emit;
mod error;
mod node;
mod parse;
pub mod scalar;

pub use emit::{serialize, to_string};
pub use error::DocumentError;
pub use node::{Decor, DecorLine, MapEntry, Node, NodeData, NodeId, NodeKind, Scalar, Tree};
pub use parse::parse;
pub use scalar::ScalarStyle;
