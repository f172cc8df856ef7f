use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Showdex operations
#[derive(Error, Debug)]
pub enum ShowdexError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Facet error: {0}")]
    Facet(String),

    #[error("Another writer is already open on this index")]
    WriterConflict,

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Schema incompatible: {0}")]
    SchemaIncompatible(String),

    #[error("Query syntax error at position {position}: {message}")]
    QuerySyntax { position: usize, message: String },

    #[error("Invalid document address: segment {segment_ord}, doc {doc_id}")]
    InvalidAddress { segment_ord: u32, doc_id: u32 },

    #[error("Index not found: {0}")]
    NotFound(PathBuf),

    #[error("Index corrupt: {0}")]
    Corrupt(String),

    #[error("An index already exists at {0}")]
    IndexExists(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Showdex operations
pub type Result<T> = std::result::Result<T, ShowdexError>;

impl ShowdexError {
    /// Create a query syntax error at the given char offset
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        ShowdexError::QuerySyntax {
            position,
            message: message.into(),
        }
    }

    /// Check if this error rejects a single caller input without touching
    /// engine state
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ShowdexError::Schema(_)
                | ShowdexError::Document(_)
                | ShowdexError::Facet(_)
                | ShowdexError::SchemaMismatch(_)
                | ShowdexError::QuerySyntax { .. }
                | ShowdexError::InvalidArgument(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShowdexError::syntax(4, "unexpected ')'");
        assert_eq!(
            err.to_string(),
            "Query syntax error at position 4: unexpected ')'"
        );

        let err = ShowdexError::InvalidAddress {
            segment_ord: 2,
            doc_id: 7,
        };
        assert_eq!(err.to_string(), "Invalid document address: segment 2, doc 7");
    }

    #[test]
    fn test_validation_errors() {
        assert!(ShowdexError::Schema("dup".to_string()).is_validation());
        assert!(ShowdexError::syntax(0, "x").is_validation());
        assert!(!ShowdexError::WriterConflict.is_validation());
        assert!(!ShowdexError::Corrupt("meta".to_string()).is_validation());
    }
}
