//! Custom error types for txhistory
//!
//! This module defines the error hierarchy for the capture engine using
//! thiserror. Errors fall in two groups: recoverable ones, which degrade the
//! audit record (an empty label, a dropped relationship) but never stop the
//! business transaction, and fatal ones, which signal a broken contract with a
//! collaborator and abort the current capture.

use thiserror::Error;

/// The main error type for txhistory operations
#[derive(Error, Debug)]
pub enum AuditError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Entity-type schema descriptor errors
    #[error("Schema error: {0}")]
    Schema(String),

    /// Validation errors for incoming entities and change requests
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity or audit row not found
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    /// Backing store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Wire format errors while decoding a stored transaction detail
    #[error("Codec error: {0}")]
    Codec(String),

    /// A related entity could not be located by key
    #[error("Lookup failed for {entity_set} {key}")]
    LookupFailure { entity_set: String, key: String },

    /// Any other failure while resolving one entity's relationships
    #[error("Could not resolve relationship '{relationship}' on {entity_set}: {reason}")]
    RelationshipResolution {
        entity_set: String,
        relationship: String,
        reason: String,
    },

    /// An entity reported a mutation kind the capture cannot handle
    #[error("Unsupported entity state '{state}' on {entity_set}")]
    UnsupportedState { entity_set: String, state: String },

    /// Emission guard used after disposal or disposed twice
    #[error("Emission guard misuse: {0}")]
    GuardMisuse(String),
}

impl AuditError {
    /// Create a "not found" error for an entity set row
    pub fn entity_not_found(entity_set: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_set.into(),
            identifier: key.into(),
        }
    }

    /// Create a "not found" error for an audit history row
    pub fn history_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "History entry".to_string(),
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether the capture may continue after this error
    ///
    /// Unsupported states and guard misuse are contract violations; everything
    /// else only costs the audit record some context.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::UnsupportedState { .. } | Self::GuardMisuse(_)
        )
    }
}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for txhistory operations
pub type AuditResult<T> = Result<T, AuditError>;
