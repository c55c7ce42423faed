//! Error type shared by the tokenizer, the builder and the entry points.

use thiserror::Error;

/// Why an import failed. The `Display` text is the diagnostic shown to
/// the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    /// An element appeared where its required enclosing element is missing
    /// or of the wrong kind
    #[error("{0}")]
    Structure(String),

    /// The underlying markup is not well-formed
    #[error("fatal error on line {line}, column {column}: {message}")]
    Syntax {
        line: u32,
        column: u32,
        message: String,
    },

    /// The version string could not be parsed
    #[error("unparseable version string '{0}'")]
    Version(String),

    /// A close event did not match the innermost open element
    #[error("unexpected closing tag '{found}' (expected '{expected}')")]
    UnbalancedClose { expected: String, found: String },

    /// The stream ended without producing a document
    #[error("no document element found")]
    MissingDocument,

    /// The resource controller refused a resource
    #[error("resource '{name}' could not be imported: {message}")]
    Resource { name: String, message: String },

    /// The source could not be read
    #[error("failed to read '{path}': {message}")]
    Io { path: String, message: String },
}

impl ImportError {
    pub(crate) fn structure(message: impl Into<String>) -> Self {
        ImportError::Structure(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
