//! Error types for the portal onboarding service.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from the onboarding progress store (fetch / update step).
///
/// `NotFound` and `Rejected` display the server's own message, which is
/// what the tracker shows in its `error` field.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("{message}")]
    NotFound { proposal_id: String, message: String },

    #[error("Malformed onboarding step for proposal {proposal_id}: {reason}")]
    Malformed { proposal_id: String, reason: String },

    #[error("{0}")]
    Rejected(String),

    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("No Tokio runtime to run the tracker on: {0}")]
    NoRuntime(String),
}
