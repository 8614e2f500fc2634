//! In-memory document store backend.
//!
//! This module provides [`DocumentBackend`], the document-store adapter for
//! the [`Repository`](crate::Repository) contract. It is schema-less in the
//! document idiom: each record carries an explicit `is_deleted` flag next
//! to its payload, which the adapter keeps in lockstep with the normalized
//! nullable `deleted_at` timestamp the contract exposes.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Shared handle**: All [`DocumentBackend`]s cloned from one [`DocumentStore`] see the same
//!   collections, so `include` can expand relations across entity kinds
//! - **Constraint enforcement**: Unique fields from the [`CollectionConfig`] are checked on every
//!   write, including intra-batch duplicates in `bulk_create`
//!
//! # Example
//!
//! ```
//! use entity_repository::{
//!     CollectionConfig, DocumentBackend, DocumentStore, Payload, Repository, ReturnOptions,
//! };
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = DocumentStore::new();
//! let roles = DocumentBackend::new(store, CollectionConfig::new("roles"));
//!
//! let mut payload = Payload::new();
//! payload.insert("name".into(), json!("admin"));
//! let role = roles.create(payload, &ReturnOptions::new()).await.unwrap();
//! assert!(!role.is_deleted());
//! # });
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - Intended for testing, development and as the reference adapter for the conformance suite

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;

use crate::{
    error::{RepoResult, RepositoryError},
    options::{self, NormalizedFilter, TombstonePatch},
    repository::Repository,
    types::{
        BulkOptions, CollectionConfig, Entity, EntityId, Filter, Page, PaginationRequest,
        Payload, Predicate, ReturnOptions,
    },
};

use async_trait::async_trait;

/// One stored record in the document idiom.
///
/// The explicit `is_deleted` flag is the document store's native
/// soft-delete marker; the adapter keeps it in sync with `deleted_at`,
/// which is the contract's single source of truth.
#[derive(Debug, Clone)]
struct StoredDocument {
    fields: Payload,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by: Option<String>,
    updated_by: Option<String>,
}

#[derive(Debug, Default)]
struct Collection {
    docs: BTreeMap<EntityId, StoredDocument>,
}

/// Shared handle to the in-memory document collections.
///
/// `DocumentStore` is cheaply cloneable via [`Arc`]; all clones share the
/// same underlying data. Pass one store to every [`DocumentBackend`] whose
/// collections should be able to reference each other through `include`.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl DocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Document-store adapter for one entity kind.
///
/// Bound to a [`DocumentStore`] handle and a [`CollectionConfig`] at
/// construction; holds no other state, so it is safe to share across
/// concurrent request handlers.
#[derive(Debug, Clone)]
pub struct DocumentBackend {
    store: DocumentStore,
    config: CollectionConfig,
}

impl DocumentBackend {
    /// Creates an adapter for the configured collection, registering the
    /// collection in the shared store.
    pub fn new(store: DocumentStore, config: CollectionConfig) -> Self {
        store.collections.write().entry(config.name.clone()).or_default();
        Self { store, config }
    }

    /// The collection binding this adapter was constructed with.
    #[must_use]
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    fn materialize(
        &self,
        collections: &HashMap<String, Collection>,
        id: EntityId,
        doc: &StoredDocument,
        options: &ReturnOptions,
    ) -> RepoResult<Entity> {
        let mut entity = raw_entity(id, doc);
        options::apply_select(&mut entity, options.select.as_deref());

        if let Some(relation) = &options.include {
            let binding = self.config.relation_named(relation).ok_or_else(|| {
                RepositoryError::validation(format!(
                    "unknown relation `{relation}` for collection `{}`",
                    self.config.name
                ))
            })?;

            let embedded = match doc.fields.get(&binding.field).and_then(Value::as_str) {
                Some(raw) => {
                    let target_id: EntityId = raw.parse().map_err(|e| {
                        RepositoryError::validation_with_source(
                            format!("relation field `{}` is not an identifier", binding.field),
                            e,
                        )
                    })?;
                    collections
                        .get(&binding.target)
                        .and_then(|c| c.docs.get(&target_id))
                        .map(|related| {
                            serde_json::to_value(raw_entity(target_id, related)).map_err(|e| {
                                RepositoryError::serialization_with_source(
                                    "failed to embed related entity",
                                    e,
                                )
                            })
                        })
                        .transpose()?
                },
                None => None,
            };
            entity.fields.insert(binding.embed_as.clone(), embedded.unwrap_or(Value::Null));
        }

        Ok(entity)
    }

    fn matches(&self, id: EntityId, doc: &StoredDocument, filter: &NormalizedFilter) -> bool {
        for (field, predicate) in filter.clauses.iter() {
            let value = if field == "id" {
                Value::String(id.to_string())
            } else {
                doc.fields.get(field).cloned().unwrap_or(Value::Null)
            };
            if !predicate_matches(&value, predicate) {
                return false;
            }
        }

        if let Some(needle) = &filter.search {
            let haystack = doc
                .fields
                .get(&self.config.searchable_field)
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !haystack.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }

        true
    }
}

fn raw_entity(id: EntityId, doc: &StoredDocument) -> Entity {
    Entity {
        id,
        fields: doc.fields.clone(),
        created_at: doc.created_at,
        updated_at: doc.updated_at,
        deleted_at: doc.deleted_at,
        created_by: doc.created_by.clone(),
        updated_by: doc.updated_by.clone(),
    }
}

fn predicate_matches(value: &Value, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Eq(expected) => value == expected,
        Predicate::Ne(expected) => value != expected,
        Predicate::In(set) => set.contains(value),
        Predicate::Contains(needle) => value
            .as_str()
            .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
    }
}

/// Returns the name of a violated unique field, if any.
///
/// Uniqueness considers every stored document, including soft-deleted
/// ones, plus any `pending` payloads accepted earlier in the same batch.
/// Null or absent values are exempt.
fn unique_conflict(
    collection: &Collection,
    unique_fields: &[String],
    candidate: &Payload,
    exclude: Option<EntityId>,
    pending: &[Payload],
) -> Option<String> {
    for field in unique_fields {
        let Some(value) = candidate.get(field) else { continue };
        if value.is_null() {
            continue;
        }
        let clashes_stored = collection.docs.iter().any(|(id, doc)| {
            exclude != Some(*id) && doc.fields.get(field) == Some(value)
        });
        let clashes_pending = pending.iter().any(|p| p.get(field) == Some(value));
        if clashes_stored || clashes_pending {
            return Some(field.clone());
        }
    }
    None
}

#[async_trait]
impl Repository for DocumentBackend {
    async fn get_all(&self, filter: &Filter, options: &ReturnOptions) -> RepoResult<Vec<Entity>> {
        let normalized = options::sanitize_filter(filter)?;
        let collections = self.store.collections.read();
        let collection = self.collection(&collections)?;

        let mut entities = Vec::new();
        for (id, doc) in &collection.docs {
            if doc.deleted_at.is_some() || !self.matches(*id, doc, &normalized) {
                continue;
            }
            entities.push(self.materialize(&collections, *id, doc, options)?);
        }
        Ok(entities)
    }

    async fn get_one(
        &self,
        filter: &Filter,
        options: &ReturnOptions,
    ) -> RepoResult<Option<Entity>> {
        let normalized = options::sanitize_filter(filter)?;
        let collections = self.store.collections.read();
        let collection = self.collection(&collections)?;

        for (id, doc) in &collection.docs {
            if doc.deleted_at.is_some() || !self.matches(*id, doc, &normalized) {
                continue;
            }
            return self.materialize(&collections, *id, doc, options).map(Some);
        }
        Ok(None)
    }

    async fn get_by_ids(
        &self,
        ids: &[EntityId],
        options: &ReturnOptions,
    ) -> RepoResult<Vec<Entity>> {
        let wanted: HashSet<EntityId> = ids.iter().copied().collect();
        let collections = self.store.collections.read();
        let collection = self.collection(&collections)?;

        let mut entities = Vec::new();
        for (id, doc) in &collection.docs {
            if !wanted.contains(id) {
                continue;
            }
            // Direct identifier lookup: soft-deleted documents included.
            entities.push(self.materialize(&collections, *id, doc, options)?);
        }
        Ok(entities)
    }

    #[tracing::instrument(skip(self, payload, options), fields(collection = %self.config.name))]
    async fn create(&self, payload: Payload, options: &ReturnOptions) -> RepoResult<Entity> {
        let parts = options::split_create_payload(payload);
        let mut collections = self.store.collections.write();
        let collection = self.collection_mut(&mut collections)?;

        if let Some(field) =
            unique_conflict(collection, &self.config.unique_fields, &parts.fields, None, &[])
        {
            return Err(RepositoryError::validation(format!(
                "duplicate value for unique field `{field}`"
            )));
        }

        let id = EntityId::generate();
        let now = Utc::now();
        let doc = StoredDocument {
            fields: parts.fields,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
            created_by: parts.created_by,
            updated_by: parts.updated_by,
        };
        collection.docs.insert(id, doc.clone());

        self.materialize(&collections, id, &doc, options)
    }

    #[tracing::instrument(
        skip(self, payloads, options, bulk),
        fields(collection = %self.config.name, batch = payloads.len(), atomic = bulk.atomic)
    )]
    async fn bulk_create(
        &self,
        payloads: Vec<Payload>,
        options: &ReturnOptions,
        bulk: BulkOptions,
    ) -> RepoResult<Vec<Entity>> {
        let parts: Vec<_> = payloads.into_iter().map(options::split_create_payload).collect();
        let mut collections = self.store.collections.write();
        let collection = self.collection_mut(&mut collections)?;

        let mut inserted = Vec::with_capacity(parts.len());
        if bulk.atomic {
            // Validate the whole batch (including intra-batch duplicates)
            // before touching the collection: all-or-nothing.
            let mut accepted: Vec<Payload> = Vec::with_capacity(parts.len());
            for part in &parts {
                if let Some(field) = unique_conflict(
                    collection,
                    &self.config.unique_fields,
                    &part.fields,
                    None,
                    &accepted,
                ) {
                    return Err(RepositoryError::validation(format!(
                        "duplicate value for unique field `{field}`"
                    )));
                }
                accepted.push(part.fields.clone());
            }
            for part in parts {
                inserted.push(insert_document(collection, part));
            }
        } else {
            // Valid prefix persists; the first failure aborts the rest.
            for part in parts {
                if let Some(field) = unique_conflict(
                    collection,
                    &self.config.unique_fields,
                    &part.fields,
                    None,
                    &[],
                ) {
                    return Err(RepositoryError::validation(format!(
                        "duplicate value for unique field `{field}`"
                    )));
                }
                inserted.push(insert_document(collection, part));
            }
        }

        let mut entities = Vec::with_capacity(inserted.len());
        for (id, doc) in &inserted {
            entities.push(self.materialize(&collections, *id, doc, options)?);
        }
        Ok(entities)
    }

    #[tracing::instrument(skip(self, changes, options), fields(collection = %self.config.name, id = %id))]
    async fn update(
        &self,
        id: EntityId,
        changes: Payload,
        options: &ReturnOptions,
    ) -> RepoResult<Entity> {
        let parts = options::split_update_payload(changes)?;
        let mut collections = self.store.collections.write();
        let collection = self.collection_mut(&mut collections)?;

        let current = collection
            .docs
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(id.to_string()))?;

        let mut fields = current.fields;
        options::merge_fields(&mut fields, parts.fields);

        if let Some(field) =
            unique_conflict(collection, &self.config.unique_fields, &fields, Some(id), &[])
        {
            return Err(RepositoryError::validation(format!(
                "duplicate value for unique field `{field}`"
            )));
        }

        let (deleted_at, is_deleted) = match parts.tombstone {
            TombstonePatch::Keep => (current.deleted_at, current.is_deleted),
            TombstonePatch::Clear => (None, false),
            TombstonePatch::Set(at) => (Some(at), true),
        };

        let doc = StoredDocument {
            fields,
            is_deleted,
            deleted_at,
            created_at: current.created_at,
            updated_at: Utc::now(),
            created_by: current.created_by,
            updated_by: parts.updated_by.or(current.updated_by),
        };
        collection.docs.insert(id, doc.clone());

        self.materialize(&collections, id, &doc, options)
    }

    #[tracing::instrument(skip(self, options), fields(collection = %self.config.name, id = %id))]
    async fn delete(&self, id: EntityId, options: &ReturnOptions) -> RepoResult<Entity> {
        let mut collections = self.store.collections.write();
        let collection = self.collection_mut(&mut collections)?;

        let current = collection
            .docs
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(id.to_string()))?;

        let now = Utc::now();
        let doc = StoredDocument {
            is_deleted: true,
            deleted_at: Some(now),
            updated_at: now,
            ..current
        };
        collection.docs.insert(id, doc.clone());

        self.materialize(&collections, id, &doc, options)
    }

    async fn get_paginated(
        &self,
        request: &PaginationRequest,
        options: &ReturnOptions,
    ) -> RepoResult<Page> {
        options::validate_page_request(request)?;
        let normalized = options::sanitize_filter(&request.filters)?;

        // Count and data-fetch are two independent reads of the shared
        // store; the contract does not promise snapshot isolation between
        // them.
        let total = {
            let collections = self.store.collections.read();
            let collection = self.collection(&collections)?;
            collection
                .docs
                .iter()
                .filter(|(id, doc)| {
                    doc.deleted_at.is_none() && self.matches(**id, doc, &normalized)
                })
                .count() as u64
        };

        let collections = self.store.collections.read();
        let collection = self.collection(&collections)?;
        let mut data = Vec::new();
        let window = collection
            .docs
            .iter()
            .filter(|(id, doc)| doc.deleted_at.is_none() && self.matches(**id, doc, &normalized))
            .skip(request.skip as usize)
            .take(request.limit as usize);
        for (id, doc) in window {
            data.push(self.materialize(&collections, *id, doc, options)?);
        }

        Ok(Page { data, total })
    }

    async fn health_check(&self) -> RepoResult<()> {
        // Taking the read lock proves the shared store is reachable.
        let _guard = self.store.collections.read();
        Ok(())
    }
}

impl DocumentBackend {
    fn collection<'a>(
        &self,
        collections: &'a HashMap<String, Collection>,
    ) -> RepoResult<&'a Collection> {
        collections.get(&self.config.name).ok_or_else(|| {
            RepositoryError::internal(format!("collection `{}` not registered", self.config.name))
        })
    }

    fn collection_mut<'a>(
        &self,
        collections: &'a mut HashMap<String, Collection>,
    ) -> RepoResult<&'a mut Collection> {
        collections.get_mut(&self.config.name).ok_or_else(|| {
            RepositoryError::internal(format!("collection `{}` not registered", self.config.name))
        })
    }
}

fn insert_document(
    collection: &mut Collection,
    parts: options::NewEntityParts,
) -> (EntityId, StoredDocument) {
    let id = EntityId::generate();
    let now = Utc::now();
    let doc = StoredDocument {
        fields: parts.fields,
        is_deleted: false,
        deleted_at: None,
        created_at: now,
        updated_at: now,
        created_by: parts.created_by,
        updated_by: parts.updated_by,
    };
    collection.docs.insert(id, doc.clone());
    (id, doc)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::types::RelationBinding;

    fn payload(pairs: &[(&str, Value)]) -> Payload {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    fn roles_backend() -> DocumentBackend {
        DocumentBackend::new(
            DocumentStore::new(),
            CollectionConfig::new("roles").unique_field("name"),
        )
    }

    #[tokio::test]
    async fn clone_shares_collections() {
        let backend = roles_backend();
        let clone = backend.clone();

        backend
            .create(payload(&[("name", json!("admin"))]), &ReturnOptions::new())
            .await
            .unwrap();

        let all = clone.get_all(&Filter::new(), &ReturnOptions::new()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn tombstone_flag_and_timestamp_stay_in_sync() {
        let backend = roles_backend();
        let created = backend
            .create(payload(&[("name", json!("admin"))]), &ReturnOptions::new())
            .await
            .unwrap();

        backend.delete(created.id, &ReturnOptions::new()).await.unwrap();

        let collections = backend.store.collections.read();
        let doc = collections.get("roles").unwrap().docs.get(&created.id).unwrap();
        assert!(doc.is_deleted);
        assert!(doc.deleted_at.is_some(), "flag and timestamp must agree");
    }

    #[tokio::test]
    async fn include_embeds_related_entity() {
        let store = DocumentStore::new();
        let roles = DocumentBackend::new(store.clone(), CollectionConfig::new("roles"));
        let users = DocumentBackend::new(
            store,
            CollectionConfig::new("users")
                .searchable_field("username")
                .relation(RelationBinding::new("roleId", "roles", "role")),
        );

        let role = roles
            .create(payload(&[("name", json!("admin"))]), &ReturnOptions::new())
            .await
            .unwrap();
        let user = users
            .create(
                payload(&[
                    ("username", json!("alice")),
                    ("roleId", json!(role.id.to_string())),
                ]),
                &ReturnOptions::new(),
            )
            .await
            .unwrap();

        let expanded = users
            .get_one(&Filter::by_id(user.id), &ReturnOptions::new().include("role"))
            .await
            .unwrap()
            .unwrap();
        let embedded = expanded.field("role").unwrap();
        assert_eq!(embedded["name"], json!("admin"));
        assert_eq!(embedded["id"], json!(role.id.to_string()));
    }

    #[tokio::test]
    async fn include_of_missing_target_embeds_null() {
        let store = DocumentStore::new();
        let users = DocumentBackend::new(
            store,
            CollectionConfig::new("users")
                .relation(RelationBinding::new("roleId", "roles", "role")),
        );

        let user = users
            .create(payload(&[("username", json!("bob"))]), &ReturnOptions::new())
            .await
            .unwrap();
        let expanded = users
            .get_one(&Filter::by_id(user.id), &ReturnOptions::new().include("role"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expanded.field("role"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn include_of_unknown_relation_is_validation_error() {
        let backend = roles_backend();
        let created = backend
            .create(payload(&[("name", json!("admin"))]), &ReturnOptions::new())
            .await
            .unwrap();
        let result = backend
            .get_by_ids(&[created.id], &ReturnOptions::new().include("group"))
            .await;
        assert!(matches!(result, Err(RepositoryError::Validation { .. })));
    }

    #[tokio::test]
    async fn select_projection_survives_include() {
        let store = DocumentStore::new();
        let roles = DocumentBackend::new(store.clone(), CollectionConfig::new("roles"));
        let users = DocumentBackend::new(
            store,
            CollectionConfig::new("users")
                .relation(RelationBinding::new("roleId", "roles", "role")),
        );

        let role = roles
            .create(payload(&[("name", json!("admin"))]), &ReturnOptions::new())
            .await
            .unwrap();
        let user = users
            .create(
                payload(&[
                    ("username", json!("alice")),
                    ("status", json!(true)),
                    ("roleId", json!(role.id.to_string())),
                ]),
                &ReturnOptions::new(),
            )
            .await
            .unwrap();

        let entity = users
            .get_one(
                &Filter::by_id(user.id),
                &ReturnOptions::new().select("username").include("role"),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(entity.field("username").is_some());
        assert!(entity.field("status").is_none(), "projected out");
        assert!(entity.field("role").is_some(), "include survives projection");
    }

    #[tokio::test]
    async fn update_cannot_steal_unique_value() {
        let backend = roles_backend();
        backend
            .create(payload(&[("name", json!("admin"))]), &ReturnOptions::new())
            .await
            .unwrap();
        let other = backend
            .create(payload(&[("name", json!("viewer"))]), &ReturnOptions::new())
            .await
            .unwrap();

        let result = backend
            .update(other.id, payload(&[("name", json!("admin"))]), &ReturnOptions::new())
            .await;
        assert!(matches!(result, Err(RepositoryError::Validation { .. })));
    }

    #[tokio::test]
    async fn update_keeping_own_unique_value_is_fine() {
        let backend = roles_backend();
        let created = backend
            .create(payload(&[("name", json!("admin"))]), &ReturnOptions::new())
            .await
            .unwrap();
        let updated = backend
            .update(
                created.id,
                payload(&[("name", json!("admin")), ("description", json!("root"))]),
                &ReturnOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(updated.field("description"), Some(&json!("root")));
    }

    #[tokio::test]
    async fn search_matches_configured_field() {
        let store = DocumentStore::new();
        let users = DocumentBackend::new(
            store,
            CollectionConfig::new("users").searchable_field("username"),
        );
        users
            .create(payload(&[("username", json!("Alice"))]), &ReturnOptions::new())
            .await
            .unwrap();
        users
            .create(payload(&[("username", json!("bob"))]), &ReturnOptions::new())
            .await
            .unwrap();

        let hits = users
            .get_all(&Filter::new().search("LIC"), &ReturnOptions::new())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field("username"), Some(&json!("Alice")));
    }

    /// Pagination counts and fetches the window as two separate reads, so a
    /// concurrent writer may change the collection in between. Every page
    /// must still be individually valid: the call succeeds, the window never
    /// exceeds the limit, stable rows stay counted and no tombstone leaks.
    #[tokio::test]
    async fn paginated_stays_valid_under_concurrent_writes() {
        let backend = std::sync::Arc::new(roles_backend());
        for i in 0..5 {
            backend
                .create(payload(&[("name", json!(format!("stable-{i}")))]), &ReturnOptions::new())
                .await
                .unwrap();
        }

        let churn = backend.clone();
        let writer = tokio::spawn(async move {
            for i in 0..25 {
                let created = churn
                    .create(
                        payload(&[("name", json!(format!("churn-{i:02}")))]),
                        &ReturnOptions::new(),
                    )
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
                churn.delete(created.id, &ReturnOptions::new()).await.unwrap();
            }
        });

        for _ in 0..25 {
            let page = backend
                .get_paginated(&PaginationRequest::new(0, 4), &ReturnOptions::new())
                .await
                .unwrap();
            assert!(page.data.len() <= 4, "window must never exceed the limit");
            assert!(page.total >= 5, "stable rows are always counted");
            for entity in &page.data {
                assert!(!entity.is_deleted());
            }
            tokio::task::yield_now().await;
        }

        writer.await.unwrap();
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// For any population, deletion pattern and window, the page
            /// obeys `total == live count` and
            /// `data.len() == min(limit, live - skip)`.
            #[test]
            fn pagination_window_arithmetic(
                population in 0usize..25,
                delete_every in 1usize..5,
                skip in 0u64..30,
                limit in 1u64..10,
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("runtime");

                rt.block_on(async {
                    let backend = DocumentBackend::new(
                        DocumentStore::new(),
                        CollectionConfig::new("items"),
                    );

                    let mut live = 0u64;
                    for i in 0..population {
                        let created = backend
                            .create(
                                payload(&[("name", json!(format!("item-{i:03}")))]),
                                &ReturnOptions::new(),
                            )
                            .await
                            .unwrap();
                        if i % delete_every == 0 {
                            backend.delete(created.id, &ReturnOptions::new()).await.unwrap();
                        } else {
                            live += 1;
                        }
                    }

                    let page = backend
                        .get_paginated(&PaginationRequest::new(skip, limit), &ReturnOptions::new())
                        .await
                        .unwrap();

                    prop_assert_eq!(page.total, live);
                    let expected_len = live.saturating_sub(skip).min(limit) as usize;
                    prop_assert_eq!(page.data.len(), expected_len);
                    for entity in &page.data {
                        prop_assert!(!entity.is_deleted());
                    }
                    Ok(())
                })?;
            }

            /// `get_by_ids` returns exactly the requested identifiers,
            /// deleted or not.
            #[test]
            fn get_by_ids_is_exact(population in 1usize..20, stride in 1usize..4) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("runtime");

                rt.block_on(async {
                    let backend = DocumentBackend::new(
                        DocumentStore::new(),
                        CollectionConfig::new("items"),
                    );

                    let mut all_ids = Vec::new();
                    for i in 0..population {
                        let created = backend
                            .create(
                                payload(&[("name", json!(format!("n{i}")))]),
                                &ReturnOptions::new(),
                            )
                            .await
                            .unwrap();
                        all_ids.push(created.id);
                    }

                    let wanted: Vec<EntityId> =
                        all_ids.iter().step_by(stride).copied().collect();
                    let found = backend.get_by_ids(&wanted, &ReturnOptions::new()).await.unwrap();

                    let found_ids: std::collections::HashSet<EntityId> =
                        found.iter().map(|e| e.id).collect();
                    let wanted_ids: std::collections::HashSet<EntityId> =
                        wanted.iter().copied().collect();
                    prop_assert_eq!(found_ids, wanted_ids);
                    Ok(())
                })?;
            }
        }
    }
}
