//! Shared test utilities for repository adapter testing.
//!
//! This module provides common helpers for building test payloads,
//! populating backends, and asserting on [`RepoResult`] values. It is
//! feature-gated behind `testutil` to prevent leaking into production
//! builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! entity-repository = { path = "../repository", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use entity_repository::testutil::{named_payload, populated_backend};
//! ```

use serde_json::{json, Value};

use crate::{
    conformance,
    document::{DocumentBackend, DocumentStore},
    error::{RepoResult, RepositoryError},
    repository::Repository,
    types::{Payload, ReturnOptions},
};

/// Build a payload with a single `name` field.
#[must_use]
pub fn named_payload(name: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("name".into(), json!(name));
    payload
}

/// Build a payload from field/value pairs.
#[must_use]
pub fn payload_of(pairs: &[(&str, Value)]) -> Payload {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
}

/// Create a [`DocumentBackend`] on [`conformance::standard_config`]
/// pre-populated with `count` entities named `"{prefix}-{idx:03}"`.
///
/// Zero-padding keeps lexicographic ordering aligned with numeric
/// ordering, which matters for pagination-window tests.
///
/// # Panics
///
/// Panics if any `create` fails (should not happen with fresh names).
pub async fn populated_backend(prefix: &str, count: usize) -> DocumentBackend {
    let backend = DocumentBackend::new(DocumentStore::new(), conformance::standard_config());
    for i in 0..count {
        backend
            .create(named_payload(&format!("{prefix}-{i:03}")), &ReturnOptions::new())
            .await
            .expect("populate create failed");
    }
    backend
}

/// Assert that a [`RepoResult`] is a [`RepositoryError::Validation`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use entity_repository::assert_validation;
/// use entity_repository::{RepoResult, RepositoryError};
///
/// let result: RepoResult<()> = Err(RepositoryError::validation("bad payload"));
/// assert_validation!(result);
/// ```
#[macro_export]
macro_rules! assert_validation {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::RepositoryError::Validation { .. })),
            "expected RepositoryError::Validation, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::RepositoryError::Validation { .. })),
            "{}: expected RepositoryError::Validation, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`RepoResult`] is a [`RepositoryError::NotFound`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use entity_repository::assert_not_found;
/// use entity_repository::{RepoResult, RepositoryError};
///
/// let result: RepoResult<()> = Err(RepositoryError::not_found("missing"));
/// assert_not_found!(result);
/// ```
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::RepositoryError::NotFound { .. })),
            "expected RepositoryError::NotFound, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::RepositoryError::NotFound { .. })),
            "{}: expected RepositoryError::NotFound, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`RepoResult`] is `Ok`, returning the inner value.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use entity_repository::assert_repo_ok;
/// use entity_repository::RepoResult;
///
/// let result: RepoResult<i32> = Ok(42);
/// let value = assert_repo_ok!(result);
/// assert_eq!(value, 42);
/// ```
#[macro_export]
macro_rules! assert_repo_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got RepositoryError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got RepositoryError: {e:?}", $msg),
        }
    };
}

/// Helper to verify that a result is a `Validation` error.
///
/// This is a convenience for tests that need to match on error variants
/// without importing the error type directly.
pub fn is_validation<T>(result: &RepoResult<T>) -> bool {
    matches!(result, Err(RepositoryError::Validation { .. }))
}

/// Helper to verify that a result is a `NotFound` error.
pub fn is_not_found<T>(result: &RepoResult<T>) -> bool {
    matches!(result, Err(RepositoryError::NotFound { .. }))
}

/// Helper to verify that a result is a `Connection` error.
pub fn is_connection<T>(result: &RepoResult<T>) -> bool {
    matches!(result, Err(RepositoryError::Connection { .. }))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::Filter;

    #[test]
    fn named_payload_shape() {
        let payload = named_payload("admin");
        assert_eq!(payload.get("name"), Some(&json!("admin")));
        assert_eq!(payload.len(), 1);
    }

    #[test]
    fn payload_of_preserves_pairs() {
        let payload = payload_of(&[("a", json!(1)), ("b", json!("x"))]);
        assert_eq!(payload.get("a"), Some(&json!(1)));
        assert_eq!(payload.get("b"), Some(&json!("x")));
    }

    #[tokio::test]
    async fn populated_backend_creates_count() {
        let backend = populated_backend("item", 5).await;
        let all = backend
            .get_all(&Filter::new(), &ReturnOptions::new())
            .await
            .expect("get_all");
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn assert_validation_macro() {
        let result: RepoResult<()> = Err(RepositoryError::validation("bad"));
        assert_validation!(result);
    }

    #[test]
    fn assert_not_found_macro() {
        let result: RepoResult<()> = Err(RepositoryError::not_found("missing"));
        assert_not_found!(result);
    }

    #[test]
    fn assert_repo_ok_macro() {
        let result: RepoResult<i32> = Ok(42);
        let val = assert_repo_ok!(result);
        assert_eq!(val, 42);
    }

    #[test]
    fn predicate_helpers() {
        assert!(is_validation::<()>(&Err(RepositoryError::validation("x"))));
        assert!(!is_validation::<()>(&Ok(())));
        assert!(is_not_found::<()>(&Err(RepositoryError::not_found("x"))));
        assert!(is_connection::<()>(&Err(RepositoryError::connection("down"))));
    }
}
