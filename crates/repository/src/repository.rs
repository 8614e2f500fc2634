//! Repository contract definition.
//!
//! This module defines the [`Repository`] trait, the uniform set of
//! operations over one entity kind. All backend adapters (DocumentBackend,
//! SqliteBackend, etc.) implement this trait and must behave identically:
//! same soft-delete semantics, same pagination, same projection, same
//! bulk-insert atomicity.
//!
//! # Design Philosophy
//!
//! - **Payloads are opaque**: the contract does not interpret entity fields beyond the reserved
//!   bookkeeping keys
//! - **Async by default**: suspension occurs only at the backend call boundary
//! - **Fail fast**: every failure surfaces as a typed [`RepositoryError`](crate::RepositoryError); nothing is retried or
//!   logged-and-ignored
//! - **Stateless per call**: an adapter holds no per-call mutable state beyond its shared backend
//!   handle
//!
//! # Implementing an Adapter
//!
//! To implement a new backend adapter:
//!
//! 1. Implement the [`Repository`] trait
//! 2. Normalize the backend's native soft-delete idiom to the nullable `deleted_at` timestamp
//! 3. Map backend-native errors to [`RepositoryError`](crate::RepositoryError)
//!
//! See [`DocumentBackend`](crate::DocumentBackend) for a reference
//! implementation, and run the [`conformance`](crate::conformance) suite
//! against your adapter.

use async_trait::async_trait;

use crate::{
    error::RepoResult,
    types::{BulkOptions, Entity, EntityId, Filter, Page, PaginationRequest, Payload, ReturnOptions},
};

/// The uniform set of operations over one entity kind, independent of
/// backend.
///
/// An entity service holds one `Repository` instance bound to its backend
/// adapter at construction; callers invoke contract operations and receive
/// normalized results or typed failures.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get_all`](Repository::get_all) | All non-deleted matches |
/// | [`get_one`](Repository::get_one) | First non-deleted match |
/// | [`get_by_ids`](Repository::get_by_ids) | Exact-match membership lookup |
/// | [`create`](Repository::create) | Persist one entity |
/// | [`bulk_create`](Repository::bulk_create) | Persist a batch, optionally all-or-nothing |
/// | [`update`](Repository::update) | Field-level partial merge |
/// | [`delete`](Repository::delete) | Soft-delete (tombstone) |
/// | [`get_paginated`](Repository::get_paginated) | Windowed read with total count |
/// | [`health_check`](Repository::health_check) | Verify backend availability |
///
/// # Soft-delete semantics
///
/// `delete` never physically removes a record. A tombstoned entity is
/// excluded from `get_all`, `get_one` and `get_paginated`, but remains
/// reachable through `get_by_ids`. Caller-supplied filters can never
/// disable the exclusion.
///
/// # Example
///
/// ```
/// use entity_repository::{
///     CollectionConfig, DocumentBackend, DocumentStore, Filter, Payload, Repository,
///     ReturnOptions,
/// };
/// use serde_json::json;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = DocumentStore::new();
/// let roles = DocumentBackend::new(store, CollectionConfig::new("roles"));
///
/// let mut payload = Payload::new();
/// payload.insert("name".into(), json!("admin"));
///
/// let created = roles.create(payload, &ReturnOptions::new()).await.unwrap();
/// let found = roles
///     .get_one(&Filter::by_id(created.id), &ReturnOptions::new())
///     .await
///     .unwrap();
/// assert_eq!(found.unwrap().id, created.id);
/// # });
/// ```
#[async_trait]
pub trait Repository: Send + Sync {
    /// Returns all non-deleted entities matching the filter.
    ///
    /// No pagination is applied. Projection follows `options.select`.
    #[must_use = "repository operations may fail and errors must be handled"]
    async fn get_all(&self, filter: &Filter, options: &ReturnOptions) -> RepoResult<Vec<Entity>>;

    /// Returns the first non-deleted entity matching the filter.
    ///
    /// No ordering guarantee is promised; "first" is backend-defined.
    #[must_use = "repository operations may fail and errors must be handled"]
    async fn get_one(
        &self,
        filter: &Filter,
        options: &ReturnOptions,
    ) -> RepoResult<Option<Entity>>;

    /// Returns the entities whose identifiers are members of `ids`.
    ///
    /// Membership testing is exact-match. Result order is backend-defined
    /// and not guaranteed to follow `ids` order. Soft-deleted entities are
    /// included: a direct identifier lookup bypasses the default exclusion.
    #[must_use = "repository operations may fail and errors must be handled"]
    async fn get_by_ids(
        &self,
        ids: &[EntityId],
        options: &ReturnOptions,
    ) -> RepoResult<Vec<Entity>>;

    /// Persists one entity and returns it with its assigned identifier and
    /// timestamps.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Validation`](crate::RepositoryError::Validation) if the backend rejects the payload
    /// (schema or constraint violation, e.g. uniqueness).
    #[must_use = "repository operations may fail and errors must be handled"]
    async fn create(&self, payload: Payload, options: &ReturnOptions) -> RepoResult<Entity>;

    /// Persists a batch of entities.
    ///
    /// When `bulk.atomic` is `true` (the default), any single payload
    /// failure aborts the entire batch and no entities are persisted —
    /// callers must treat bulk insert as all-or-nothing. When `false`, the
    /// backend is permitted to persist a valid prefix and report the first
    /// failure.
    #[must_use = "repository operations may fail and errors must be handled"]
    async fn bulk_create(
        &self,
        payloads: Vec<Payload>,
        options: &ReturnOptions,
        bulk: BulkOptions,
    ) -> RepoResult<Vec<Entity>>;

    /// Applies a field-level merge to the entity with the given identifier.
    ///
    /// This is a partial merge, not a whole-record overwrite: fields absent
    /// from `changes` are untouched. A soft-deleted entity is never
    /// resurrected implicitly — only an explicit `deletedAt: null` (or
    /// `isDeleted: false`) in `changes` clears the tombstone.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`](crate::RepositoryError::NotFound) if no entity with `id` exists.
    #[must_use = "repository operations may fail and errors must be handled"]
    async fn update(
        &self,
        id: EntityId,
        changes: Payload,
        options: &ReturnOptions,
    ) -> RepoResult<Entity>;

    /// Soft-deletes the entity with the given identifier.
    ///
    /// Sets `deleted_at` to the current time; the record remains queryable
    /// by direct identifier lookup but is excluded from `get_all`,
    /// `get_one` and `get_paginated`. No hard-delete operation exists in
    /// this contract.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`](crate::RepositoryError::NotFound) if no entity with `id` exists.
    #[must_use = "repository operations may fail and errors must be handled"]
    async fn delete(&self, id: EntityId, options: &ReturnOptions) -> RepoResult<Entity>;

    /// Returns a window of matching entities plus the total match count.
    ///
    /// The soft-delete exclusion is applied automatically and merged with
    /// caller-supplied filters; caller filters never override it. `total`
    /// counts all matches before `skip`/`limit`.
    ///
    /// # Weak consistency
    ///
    /// The count and the data-fetch are two logically independent reads;
    /// the contract does **not** guarantee snapshot isolation between them.
    /// Under concurrent writes, `total` and `data` may reflect slightly
    /// different points in time. This is an accepted trade-off, not a bug.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Validation`](crate::RepositoryError::Validation) if `request.limit` is zero.
    #[must_use = "repository operations may fail and errors must be handled"]
    async fn get_paginated(
        &self,
        request: &PaginationRequest,
        options: &ReturnOptions,
    ) -> RepoResult<Page>;

    /// Verifies the backend is reachable and usable.
    #[must_use = "health check results indicate backend availability and must be inspected"]
    async fn health_check(&self) -> RepoResult<()>;
}

/// Compile-time check that the trait stays object-safe: entity services
/// hold `Arc<dyn Repository>`.
#[allow(dead_code)]
fn _assert_object_safe(_: &dyn Repository) {}
