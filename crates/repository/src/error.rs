//! Repository error types and result alias.
//!
//! This module defines the canonical failure taxonomy for repository
//! operations. All backend adapters must map their native error conditions
//! (constraint violations, missing rows, connection failures) onto these
//! variants so callers never see backend-specific error shapes.
//!
//! # Error Types
//!
//! - [`RepositoryError::Validation`] - Payload rejected by backend constraints
//! - [`RepositoryError::NotFound`] - Operation targets a nonexistent identifier
//! - [`RepositoryError::Connection`] - Backend unreachable
//! - [`RepositoryError::Serialization`] - Document encoding/decoding failure
//! - [`RepositoryError::Internal`] - Adapter-specific internal errors
//!
//! # Example
//!
//! ```
//! use entity_repository::{RepositoryError, RepoResult};
//!
//! fn lookup(id: &str) -> RepoResult<Vec<u8>> {
//!     Err(RepositoryError::not_found(id))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for repository operations.
///
/// All repository operations return this type, providing consistent error
/// handling across different backend adapters.
pub type RepoResult<T> = Result<T, RepositoryError>;

/// Errors that can occur during repository operations.
///
/// This enum represents the canonical set of failures any backend adapter
/// can produce. Adapters map their native error types to these variants;
/// the core never retries and never suppresses an error.
///
/// Errors preserve their source chain via the `#[source]` attribute,
/// enabling debugging tools to display the full error context.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]` — new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RepositoryError {
    /// The payload was rejected by backend constraints.
    ///
    /// Raised on schema or constraint violations, most commonly a
    /// unique-field conflict. The backend's own constraint enforcement is
    /// the sole concurrency-safety mechanism for write conflicts, and it
    /// surfaces here.
    #[error("Validation failed: {message}")]
    Validation {
        /// Description of the violated constraint.
        message: String,
        /// The underlying error that caused the rejection.
        #[source]
        source: Option<BoxError>,
    },

    /// The operation targeted a nonexistent identifier.
    ///
    /// This is a recoverable error indicating the entity does not exist
    /// (or, for default read paths, is excluded by the soft-delete filter).
    #[error("Entity not found: {id}")]
    NotFound {
        /// The identifier that was not found.
        id: String,
    },

    /// Connection or network error.
    ///
    /// This error indicates a failure to communicate with the storage
    /// backend, such as an unreachable server or an unopenable database
    /// file.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Serialization or deserialization error.
    ///
    /// This error occurs when a document cannot be encoded for storage or
    /// decoded when retrieved. This typically indicates data corruption or
    /// schema incompatibility.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// Internal backend adapter error.
    ///
    /// This is a catch-all for adapter-specific errors that don't fit
    /// other categories.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },
}

impl RepositoryError {
    /// Creates a new `Validation` error with the given message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), source: None }
    }

    /// Creates a new `Validation` error with a message and source error.
    #[must_use]
    pub fn validation_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Validation { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `NotFound` error for the given identifier.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_identifier() {
        let err = RepositoryError::not_found("role-42");
        assert_eq!(err.to_string(), "Entity not found: role-42");
    }

    #[test]
    fn source_chain_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = RepositoryError::connection_with_source("backend unreachable", io);
        let source = std::error::Error::source(&err);
        assert!(source.is_some(), "connection error should carry its source");
    }

    #[test]
    fn validation_without_source() {
        let err = RepositoryError::validation("duplicate value for unique field `name`");
        assert!(std::error::Error::source(&err).is_none());
        assert!(err.to_string().contains("unique field"));
    }
}
