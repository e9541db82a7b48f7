//! Mutable document tree.
//!
//! An arena of nodes with parent back-links, plus the XML reader and
//! writer and the wrapper-preserving [`split`] used by structural fixers.

mod arena;
mod reader;
mod split;
mod writer;

pub use arena::{Ancestors, Attribute, ChildrenIter, Descendants, Dom, Element, Node, NodeData, NodeId, QName, DESCRIBE_DEPTH};
pub use reader::{parse_bytes, parse_str};
pub use split::split;
pub use writer::{subtree_to_string, to_string, write_to};
