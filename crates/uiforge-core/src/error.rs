//! Error types for uiforge-core

use thiserror::Error;

use crate::schema::SchemaIssue;

/// Result type alias for uiforge-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in uiforge-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// The design-system definition could not be turned into a contract
    #[error("invalid design system '{name}': {message}")]
    DesignSystemInvalid {
        /// Design system name (or file path when the name is unknown)
        name: String,
        /// Description of the problem
        message: String,
    },

    /// A batch of component specs failed IR validation
    #[error("component IR failed validation: {}", summarize(.issues))]
    SchemaViolation {
        /// Every issue found, in discovery order
        issues: Vec<SchemaIssue>,
    },

    /// The remote provider failed every attempt
    #[error("provider unavailable after {attempts} attempt(s): {last_error}")]
    ProviderUnavailable {
        /// Attempts made before giving up
        attempts: u32,
        /// Final error reported by the provider
        last_error: String,
    },

    /// The provider answered but the answer could not be interpreted
    #[error("malformed provider response: {message}")]
    MalformedResponse {
        /// Description of what was expected
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn summarize(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
