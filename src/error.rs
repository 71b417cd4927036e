//! Error types for index building and querying
//!
//! Defines all errors that can occur while building or reading an index.

use thiserror::Error;

/// Errors that can occur while building or querying an index
#[derive(Error, Debug)]
pub enum IndexError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The DEFLATE stream is damaged or ended prematurely
    #[error("corrupt compressed stream: {0}")]
    CorruptStream(String),

    /// The underlying SQLite store returned an error
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Index names become table names and must stay alphanumeric
    #[error("invalid index name: '{0}'")]
    InvalidIndexName(String),

    /// A numeric index received a key that is not a signed decimal integer
    #[error("non-numeric key: '{0}'")]
    InvalidKey(String),

    /// A unique index received the same key twice
    #[error("duplicate key '{key}' in unique index '{name}'")]
    DuplicateKey { name: String, key: String },

    /// A key extractor failed; carries the line it choked on
    #[error("failed to index line {line}: '{content}': {source}")]
    IndexingFailure {
        line: u64,
        content: String,
        #[source]
        source: Box<IndexError>,
    },

    /// The compressed file no longer matches the index metadata
    #[error("stale index: {0}")]
    StaleIndex(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexError::InvalidKey("abc".to_string());
        assert_eq!(err.to_string(), "non-numeric key: 'abc'");

        let err = IndexError::StaleIndex("size changed".to_string());
        assert_eq!(err.to_string(), "stale index: size changed");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: IndexError = io_err.into();
        assert!(matches!(err, IndexError::Io(_)));
    }

    #[test]
    fn test_indexing_failure_names_line() {
        let err = IndexError::IndexingFailure {
            line: 42,
            content: "bad line".to_string(),
            source: Box::new(IndexError::InvalidKey("bad".to_string())),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 42"));
        assert!(msg.contains("bad line"));
    }
}
