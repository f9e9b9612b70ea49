//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid file, missing fields, unsupported kind, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vector store adapter error with transient/permanent classification.
    #[error("{store} store error: {message}")]
    Store {
        store: String,
        message: String,
        transient: bool,
    },

    /// Outbound HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Record transformation failed for a specific record.
    #[error("Transform failed for record {record_id}: {message}")]
    Transform { record_id: String, message: String },

    /// State store (SQLite) error.
    #[error("State store error: {0}")]
    State(#[from] sqlx::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error (file operations, sockets).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Lifecycle violation (start while running, stop while idle, id mismatch).
    #[error("{0}")]
    Lifecycle(String),

    /// Input validation error (tool parameters, mapping constraints).
    #[error("{0}")]
    Validation(String),

    /// Operation was cancelled (SIGINT, stop request).
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a transient store error (eligible for retry).
    pub fn store_transient(store: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Store {
            store: store.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// Create a permanent store error (fatal immediately).
    pub fn store_permanent(store: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Store {
            store: store.into(),
            message: message.into(),
            transient: false,
        }
    }

    /// Create a Transform error carrying the offending record id.
    pub fn transform(record_id: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transform {
            record_id: record_id.into(),
            message: message.into(),
        }
    }

    /// Create a Lifecycle error.
    pub fn lifecycle(message: impl Into<String>) -> Self {
        MigrateError::Lifecycle(message.into())
    }

    /// Create a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        MigrateError::Validation(message.into())
    }

    /// Whether this error is worth retrying.
    ///
    /// Transient transport failures (timeouts, connection resets, 5xx from a
    /// remote store) qualify; everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            MigrateError::Store { transient, .. } => *transient,
            MigrateError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Validation(_) => 2,
            MigrateError::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(MigrateError::store_transient("pinecone", "timeout").is_transient());
        assert!(!MigrateError::store_permanent("pinecone", "401 unauthorized").is_transient());
        assert!(!MigrateError::Config("bad".into()).is_transient());
        assert!(!MigrateError::transform("rec-1", "bad field").is_transient());
    }

    #[test]
    fn test_transform_error_surfaces_record_id() {
        let err = MigrateError::transform("rec-42", "converter failed");
        assert!(err.to_string().contains("rec-42"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), 2);
        assert_eq!(MigrateError::Cancelled.exit_code(), 130);
        assert_eq!(
            MigrateError::store_permanent("qdrant", "down").exit_code(),
            1
        );
    }
}
