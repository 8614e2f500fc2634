//! Backend-agnostic entity service.
//!
//! [`EntityService`] is the seam between application code and the storage
//! layer: it holds one boxed [`Repository`] chosen at construction and
//! forwards the contract operations to it, so callers never name a concrete
//! backend type. Domain services wrap it (or embed it) and add their
//! entity-specific lookups on top, like `find_by("email", ...)` for users.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    error::RepoResult,
    repository::Repository,
    types::{
        BulkOptions, Entity, EntityId, Filter, Page, PaginationRequest, Payload, ReturnOptions,
    },
};

/// A thin delegation layer over a backend-chosen [`Repository`].
///
/// Cloning is cheap; all clones share the same adapter.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use entity_repository::{
///     CollectionConfig, DocumentBackend, DocumentStore, EntityService, Payload, ReturnOptions,
/// };
/// use serde_json::json;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = DocumentStore::new();
/// let backend = DocumentBackend::new(store, CollectionConfig::new("roles").unique_field("name"));
/// let roles = EntityService::new(Arc::new(backend));
///
/// let mut payload = Payload::new();
/// payload.insert("name".into(), json!("admin"));
/// roles.create(payload, &ReturnOptions::new()).await.unwrap();
///
/// let admin = roles
///     .find_by("name", json!("admin"), &ReturnOptions::new())
///     .await
///     .unwrap();
/// assert!(admin.is_some());
/// # });
/// ```
#[derive(Clone)]
pub struct EntityService {
    repository: Arc<dyn Repository>,
}

impl EntityService {
    /// Creates a service bound to the given backend adapter.
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// The adapter this service delegates to.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    /// Returns the first non-deleted entity whose `field` equals `value`.
    ///
    /// Convenience over [`get_one`](Self::get_one) for the single-field
    /// lookups domain services need (find a role by name, a user by email).
    pub async fn find_by(
        &self,
        field: impl Into<String>,
        value: impl Into<Value>,
        options: &ReturnOptions,
    ) -> RepoResult<Option<Entity>> {
        self.get_one(&Filter::new().eq(field, value), options).await
    }

    /// See [`Repository::get_all`].
    pub async fn get_all(
        &self,
        filter: &Filter,
        options: &ReturnOptions,
    ) -> RepoResult<Vec<Entity>> {
        self.repository.get_all(filter, options).await
    }

    /// See [`Repository::get_one`].
    pub async fn get_one(
        &self,
        filter: &Filter,
        options: &ReturnOptions,
    ) -> RepoResult<Option<Entity>> {
        self.repository.get_one(filter, options).await
    }

    /// See [`Repository::get_by_ids`].
    pub async fn get_by_ids(
        &self,
        ids: &[EntityId],
        options: &ReturnOptions,
    ) -> RepoResult<Vec<Entity>> {
        self.repository.get_by_ids(ids, options).await
    }

    /// See [`Repository::create`].
    pub async fn create(&self, payload: Payload, options: &ReturnOptions) -> RepoResult<Entity> {
        self.repository.create(payload, options).await
    }

    /// See [`Repository::bulk_create`].
    pub async fn bulk_create(
        &self,
        payloads: Vec<Payload>,
        options: &ReturnOptions,
        bulk: BulkOptions,
    ) -> RepoResult<Vec<Entity>> {
        self.repository.bulk_create(payloads, options, bulk).await
    }

    /// See [`Repository::update`].
    pub async fn update(
        &self,
        id: EntityId,
        changes: Payload,
        options: &ReturnOptions,
    ) -> RepoResult<Entity> {
        self.repository.update(id, changes, options).await
    }

    /// See [`Repository::delete`].
    pub async fn delete(&self, id: EntityId, options: &ReturnOptions) -> RepoResult<Entity> {
        self.repository.delete(id, options).await
    }

    /// See [`Repository::get_paginated`].
    pub async fn get_paginated(
        &self,
        request: &PaginationRequest,
        options: &ReturnOptions,
    ) -> RepoResult<Page> {
        self.repository.get_paginated(request, options).await
    }

    /// See [`Repository::health_check`].
    pub async fn health_check(&self) -> RepoResult<()> {
        self.repository.health_check().await
    }
}

impl std::fmt::Debug for EntityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityService").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        document::{DocumentBackend, DocumentStore},
        types::CollectionConfig,
    };

    fn service() -> EntityService {
        let backend = DocumentBackend::new(
            DocumentStore::new(),
            CollectionConfig::new("roles").unique_field("name"),
        );
        EntityService::new(Arc::new(backend))
    }

    #[tokio::test]
    async fn find_by_matches_field_equality() {
        let roles = service();
        let mut payload = Payload::new();
        payload.insert("name".into(), json!("editor"));
        roles.create(payload, &ReturnOptions::new()).await.unwrap();

        let hit = roles
            .find_by("name", json!("editor"), &ReturnOptions::new())
            .await
            .unwrap();
        assert!(hit.is_some());

        let miss = roles
            .find_by("name", json!("absent"), &ReturnOptions::new())
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn find_by_skips_soft_deleted() {
        let roles = service();
        let mut payload = Payload::new();
        payload.insert("name".into(), json!("editor"));
        let created = roles.create(payload, &ReturnOptions::new()).await.unwrap();
        roles.delete(created.id, &ReturnOptions::new()).await.unwrap();

        let hit = roles
            .find_by("name", json!("editor"), &ReturnOptions::new())
            .await
            .unwrap();
        assert!(hit.is_none());
    }
}
