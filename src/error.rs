//! Error types for bbx operations.

use thiserror::Error;

/// Errors that can occur while loading, converting, fixing or validating a document.
///
/// Node locations are carried as XPath-like strings (see
/// [`Dom::describe`](crate::dom::Dom::describe)) so an error stays meaningful
/// after the tree it came from has been dropped.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("Malformed XML: {0}")]
    InvalidXml(String),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("type mismatch at {node}: expected {expected}, found {actual}")]
    TypeMismatch {
        node: String,
        expected: String,
        actual: String,
    },

    #[error("illegal transform at {node}: {from} cannot become {to}")]
    IllegalTransform {
        node: String,
        from: String,
        to: String,
    },

    #[error("structural violation at {node}: {message}")]
    StructuralViolation { node: String, message: String },

    #[error("rule '{rule}' does not terminate at {node}: {message}")]
    NonTerminatingRewrite {
        rule: String,
        node: String,
        message: String,
    },

    #[error("invalid split at {node}: {message}")]
    InvalidSplit { node: String, message: String },

    #[error("cannot split: {node} is not a descendant of {root}")]
    NotDescendant { root: String, node: String },

    #[error("no mapping for source element <{element}> at {node}")]
    UnresolvedMapping { element: String, node: String },

    #[error("rule '{rule}' failed at {node}: {source}")]
    Fixer {
        rule: String,
        node: String,
        #[source]
        source: Box<Error>,
    },

    #[error("parse failed at {node}: {source}")]
    Parse {
        node: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Shorthand for a [`Error::StructuralViolation`].
    pub fn structural(node: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StructuralViolation {
            node: node.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
