//! Conformance test suite for [`Repository`] implementations.
//!
//! This module provides a set of async test functions that validate whether
//! a [`Repository`] adapter correctly satisfies the contract. Every backend
//! — the in-memory document store, the SQLite adapter, or a third-party one
//! — can run the same suite to ensure interchangeable behavior.
//!
//! # Usage
//!
//! Every function expects a **fresh** adapter bound to a collection built
//! from [`standard_config`] (searchable and unique `name` field). Call each
//! conformance function with a new instance:
//!
//! ```no_run
//! use entity_repository::{conformance, CollectionConfig, DocumentBackend, DocumentStore};
//!
//! #[tokio::test]
//! async fn create_rejects_duplicate_unique_field() {
//!     let backend = DocumentBackend::new(DocumentStore::new(), conformance::standard_config());
//!     conformance::create_rejects_duplicate_unique_field(&backend).await;
//! }
//! ```
//!
//! # Test Categories
//!
//! | Category | Functions | Contract aspect |
//! |----------|-----------|-----------------|
//! | Create | 3 tests | Payload persistence, identifiers, unique constraints |
//! | Read | 7 tests | Filtering, soft-delete exclusion, projection, membership, snapshots |
//! | Update | 4 tests | Partial merge, tombstone handling, missing identifiers |
//! | Delete | 3 tests | Tombstoning, repeatability, missing identifiers |
//! | Bulk | 4 tests | Atomic and non-atomic batch semantics |
//! | Pagination | 3 tests | Windowing, total count, exclusion override attempts |
//! | Search | 1 test | Case-insensitive substring match |
//! | Health | 1 test | Backend availability |

use serde_json::{json, Value};

use crate::{
    error::RepositoryError,
    repository::Repository,
    types::{
        BulkOptions, CollectionConfig, Filter, PaginationRequest, Payload, ReturnOptions,
    },
};

/// The collection shape every conformance function assumes: entities live
/// in a collection named `items` whose `name` field is both searchable and
/// unique.
#[must_use]
pub fn standard_config() -> CollectionConfig {
    CollectionConfig::new("items").searchable_field("name").unique_field("name")
}

fn named(name: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("name".into(), json!(name));
    payload
}

fn named_with(name: &str, extra: &[(&str, Value)]) -> Payload {
    let mut payload = named(name);
    for (key, value) in extra {
        payload.insert((*key).to_owned(), value.clone());
    }
    payload
}

// ============================================================================
// Create — payload persistence, identifiers, unique constraints (3 tests)
// ============================================================================

/// `create` echoes the caller's payload fields back on the returned entity.
pub async fn create_returns_payload_fields<R: Repository>(backend: &R) {
    let payload = named_with("admin", &[("description", json!("root role"))]);
    let entity = backend.create(payload, &ReturnOptions::new()).await.expect("create");
    assert_eq!(entity.field("name"), Some(&json!("admin")));
    assert_eq!(entity.field("description"), Some(&json!("root role")));
}

/// `create` assigns an identifier and timestamps; the entity starts live.
pub async fn create_assigns_identity_and_timestamps<R: Repository>(backend: &R) {
    let entity = backend.create(named("a"), &ReturnOptions::new()).await.expect("create");
    assert!(entity.deleted_at.is_none(), "fresh entity must not be tombstoned");
    assert!(!entity.is_deleted());
    assert_eq!(entity.created_at, entity.updated_at, "timestamps start equal");
}

/// A second entity with the same unique-field value is rejected with
/// `Validation`, and nothing new is persisted.
pub async fn create_rejects_duplicate_unique_field<R: Repository>(backend: &R) {
    backend.create(named("admin"), &ReturnOptions::new()).await.expect("first create");
    let result = backend.create(named("admin"), &ReturnOptions::new()).await;
    assert!(
        matches!(result, Err(RepositoryError::Validation { .. })),
        "duplicate unique value must be a Validation error: {result:?}"
    );
    let all = backend.get_all(&Filter::new(), &ReturnOptions::new()).await.expect("get_all");
    assert_eq!(all.len(), 1, "rejected create must not persist");
}

// ============================================================================
// Read — filtering, soft-delete exclusion, projection, membership (7 tests)
// ============================================================================

/// `get_one` with an identifier filter finds the created entity.
pub async fn get_one_by_id_returns_created_entity<R: Repository>(backend: &R) {
    let created = backend.create(named("a"), &ReturnOptions::new()).await.expect("create");
    let found = backend
        .get_one(&Filter::by_id(created.id), &ReturnOptions::new())
        .await
        .expect("get_one")
        .expect("entity should exist");
    assert_eq!(found.id, created.id);
    assert_eq!(found.field("name"), Some(&json!("a")));
}

/// `get_one` with no match returns `Ok(None)`, not an error.
pub async fn get_one_returns_none_for_no_match<R: Repository>(backend: &R) {
    let found = backend
        .get_one(&Filter::new().eq("name", json!("ghost")), &ReturnOptions::new())
        .await
        .expect("get_one should not error on no match");
    assert!(found.is_none());
}

/// Soft-deleted entities are excluded from `get_all`.
pub async fn get_all_excludes_soft_deleted<R: Repository>(backend: &R) {
    let kept = backend.create(named("kept"), &ReturnOptions::new()).await.expect("create");
    let gone = backend.create(named("gone"), &ReturnOptions::new()).await.expect("create");
    backend.delete(gone.id, &ReturnOptions::new()).await.expect("delete");

    let all = backend.get_all(&Filter::new(), &ReturnOptions::new()).await.expect("get_all");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, kept.id);
}

/// `select` projects the payload down to the named fields; bookkeeping
/// fields survive regardless.
pub async fn get_all_applies_select_projection<R: Repository>(backend: &R) {
    backend
        .create(
            named_with("a", &[("color", json!("red")), ("size", json!(3))]),
            &ReturnOptions::new(),
        )
        .await
        .expect("create");

    let all = backend
        .get_all(&Filter::new(), &ReturnOptions::new().select("name color"))
        .await
        .expect("get_all");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].field("name"), Some(&json!("a")));
    assert_eq!(all[0].field("color"), Some(&json!("red")));
    assert!(all[0].field("size").is_none(), "unselected field must be projected out");
}

/// `get_by_ids` returns exactly the requested identifiers; unknown
/// identifiers are silently absent.
pub async fn get_by_ids_returns_exact_membership<R: Repository>(backend: &R) {
    let a = backend.create(named("a"), &ReturnOptions::new()).await.expect("create");
    let _b = backend.create(named("b"), &ReturnOptions::new()).await.expect("create");
    let c = backend.create(named("c"), &ReturnOptions::new()).await.expect("create");

    let found = backend.get_by_ids(&[a.id, c.id], &ReturnOptions::new()).await.expect("get_by_ids");
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|e| e.id == a.id || e.id == c.id));
}

/// Direct identifier lookup bypasses the soft-delete exclusion.
pub async fn get_by_ids_includes_soft_deleted<R: Repository>(backend: &R) {
    let created = backend.create(named("a"), &ReturnOptions::new()).await.expect("create");
    backend.delete(created.id, &ReturnOptions::new()).await.expect("delete");

    let found =
        backend.get_by_ids(&[created.id], &ReturnOptions::new()).await.expect("get_by_ids");
    assert_eq!(found.len(), 1, "tombstoned entity must stay reachable by id");
    assert!(found[0].is_deleted());
}

/// `lean` requests a detached snapshot; on adapters that only produce
/// plain data, the documented fallback is that both shapes are identical.
pub async fn lean_and_tracked_snapshots_are_identical<R: Repository>(backend: &R) {
    let created = backend
        .create(named_with("a", &[("color", json!("red"))]), &ReturnOptions::new())
        .await
        .expect("create");

    let tracked = backend
        .get_one(&Filter::by_id(created.id), &ReturnOptions::new())
        .await
        .expect("get_one")
        .expect("entity should exist");
    let detached = backend
        .get_one(&Filter::by_id(created.id), &ReturnOptions::new().lean())
        .await
        .expect("get_one lean")
        .expect("entity should exist");
    assert_eq!(tracked, detached, "lean changes tracking, never the data");
}

// ============================================================================
// Update — partial merge, tombstone handling, missing identifiers (4 tests)
// ============================================================================

/// `update` merges at the field level; untouched fields survive.
pub async fn update_merges_partial_payload<R: Repository>(backend: &R) {
    let created = backend
        .create(named_with("a", &[("color", json!("red"))]), &ReturnOptions::new())
        .await
        .expect("create");

    let mut changes = Payload::new();
    changes.insert("size".into(), json!(5));
    let updated =
        backend.update(created.id, changes, &ReturnOptions::new()).await.expect("update");

    assert_eq!(updated.field("name"), Some(&json!("a")), "absent field must be untouched");
    assert_eq!(updated.field("color"), Some(&json!("red")));
    assert_eq!(updated.field("size"), Some(&json!(5)));
}

/// `update` of a nonexistent identifier is `NotFound`.
pub async fn update_missing_id_is_not_found<R: Repository>(backend: &R) {
    let result = backend
        .update(crate::EntityId::generate(), named("x"), &ReturnOptions::new())
        .await;
    assert!(
        matches!(result, Err(RepositoryError::NotFound { .. })),
        "expected NotFound, got {result:?}"
    );
}

/// An ordinary update of a tombstoned entity does not resurrect it.
pub async fn update_does_not_resurrect_implicitly<R: Repository>(backend: &R) {
    let created = backend.create(named("a"), &ReturnOptions::new()).await.expect("create");
    backend.delete(created.id, &ReturnOptions::new()).await.expect("delete");

    let mut changes = Payload::new();
    changes.insert("color".into(), json!("blue"));
    let updated =
        backend.update(created.id, changes, &ReturnOptions::new()).await.expect("update");
    assert!(updated.is_deleted(), "update without a tombstone directive must keep the tombstone");
}

/// An explicit `deletedAt: null` in the changes clears the tombstone.
pub async fn update_with_explicit_clear_resurrects<R: Repository>(backend: &R) {
    let created = backend.create(named("a"), &ReturnOptions::new()).await.expect("create");
    backend.delete(created.id, &ReturnOptions::new()).await.expect("delete");

    let mut changes = Payload::new();
    changes.insert("deletedAt".into(), Value::Null);
    changes.insert("isDeleted".into(), json!(false));
    let updated =
        backend.update(created.id, changes, &ReturnOptions::new()).await.expect("update");
    assert!(!updated.is_deleted(), "explicit clear must resurrect");

    let all = backend.get_all(&Filter::new(), &ReturnOptions::new()).await.expect("get_all");
    assert_eq!(all.len(), 1, "resurrected entity must reappear in default reads");
}

// ============================================================================
// Delete — tombstoning, repeatability, missing identifiers (3 tests)
// ============================================================================

/// `delete` tombstones: the entity survives with `deleted_at` set.
pub async fn delete_tombstones_entity<R: Repository>(backend: &R) {
    let created = backend.create(named("a"), &ReturnOptions::new()).await.expect("create");
    let deleted = backend.delete(created.id, &ReturnOptions::new()).await.expect("delete");
    assert!(deleted.is_deleted());
    assert!(deleted.deleted_at.is_some());

    let by_id =
        backend.get_by_ids(&[created.id], &ReturnOptions::new()).await.expect("get_by_ids");
    assert_eq!(by_id.len(), 1, "tombstoned record must not be physically removed");
}

/// `delete` of a nonexistent identifier is `NotFound`.
pub async fn delete_missing_id_is_not_found<R: Repository>(backend: &R) {
    let result = backend.delete(crate::EntityId::generate(), &ReturnOptions::new()).await;
    assert!(
        matches!(result, Err(RepositoryError::NotFound { .. })),
        "expected NotFound, got {result:?}"
    );
}

/// Deleting an already-deleted entity succeeds and keeps it tombstoned.
pub async fn delete_is_repeatable<R: Repository>(backend: &R) {
    let created = backend.create(named("a"), &ReturnOptions::new()).await.expect("create");
    backend.delete(created.id, &ReturnOptions::new()).await.expect("first delete");
    let second = backend.delete(created.id, &ReturnOptions::new()).await.expect("second delete");
    assert!(second.is_deleted());
}

// ============================================================================
// Bulk — atomic and non-atomic batch semantics (4 tests)
// ============================================================================

/// A valid batch persists every entity and returns them all.
pub async fn bulk_create_persists_batch<R: Repository>(backend: &R) {
    let batch = vec![named("a"), named("b"), named("c")];
    let created = backend
        .bulk_create(batch, &ReturnOptions::new(), BulkOptions::default())
        .await
        .expect("bulk_create");
    assert_eq!(created.len(), 3);

    let all = backend.get_all(&Filter::new(), &ReturnOptions::new()).await.expect("get_all");
    assert_eq!(all.len(), 3);
}

/// Under atomic bulk, one bad payload aborts the whole batch.
pub async fn bulk_create_atomic_violation_persists_nothing<R: Repository>(backend: &R) {
    backend.create(named("taken"), &ReturnOptions::new()).await.expect("create");

    let batch = vec![named("fresh"), named("taken"), named("also-fresh")];
    let result = backend.bulk_create(batch, &ReturnOptions::new(), BulkOptions::default()).await;
    assert!(
        matches!(result, Err(RepositoryError::Validation { .. })),
        "expected Validation, got {result:?}"
    );

    let all = backend.get_all(&Filter::new(), &ReturnOptions::new()).await.expect("get_all");
    assert_eq!(all.len(), 1, "atomic batch must be all-or-nothing");
}

/// Atomic bulk also rejects duplicates within the batch itself.
pub async fn bulk_create_atomic_rejects_intra_batch_duplicate<R: Repository>(backend: &R) {
    let batch = vec![named("dup"), named("dup")];
    let result = backend.bulk_create(batch, &ReturnOptions::new(), BulkOptions::default()).await;
    assert!(
        matches!(result, Err(RepositoryError::Validation { .. })),
        "expected Validation, got {result:?}"
    );

    let all = backend.get_all(&Filter::new(), &ReturnOptions::new()).await.expect("get_all");
    assert!(all.is_empty(), "intra-batch duplicate must persist nothing");
}

/// Non-atomic bulk persists the valid prefix and reports the first failure.
pub async fn bulk_create_non_atomic_persists_valid_prefix<R: Repository>(backend: &R) {
    backend.create(named("taken"), &ReturnOptions::new()).await.expect("create");

    let batch = vec![named("one"), named("two"), named("taken"), named("never")];
    let result = backend
        .bulk_create(batch, &ReturnOptions::new(), BulkOptions { atomic: false })
        .await;
    assert!(
        matches!(result, Err(RepositoryError::Validation { .. })),
        "expected Validation, got {result:?}"
    );

    let all = backend.get_all(&Filter::new(), &ReturnOptions::new()).await.expect("get_all");
    assert_eq!(all.len(), 3, "valid prefix (plus the pre-existing entity) must persist");
}

// ============================================================================
// Pagination — windowing, total count, exclusion overrides (3 tests)
// ============================================================================

/// `get_paginated` returns the requested window and the pre-window total.
pub async fn paginated_window_and_total<R: Repository>(backend: &R) {
    for i in 0..7 {
        backend
            .create(named(&format!("item-{i}")), &ReturnOptions::new())
            .await
            .expect("create");
    }

    let page = backend
        .get_paginated(&PaginationRequest::new(2, 3), &ReturnOptions::new())
        .await
        .expect("get_paginated");
    assert_eq!(page.total, 7, "total counts all matches, not the window");
    assert_eq!(page.data.len(), 3);

    let past_end = backend
        .get_paginated(&PaginationRequest::new(100, 3), &ReturnOptions::new())
        .await
        .expect("get_paginated past end");
    assert_eq!(past_end.total, 7);
    assert!(past_end.data.is_empty(), "window past the end is empty, not an error");
}

/// Caller filters naming the soft-delete markers are stripped; tombstoned
/// entities stay invisible no matter what the filter says.
pub async fn paginated_filter_cannot_override_exclusion<R: Repository>(backend: &R) {
    let live = backend.create(named("live"), &ReturnOptions::new()).await.expect("create");
    let dead = backend.create(named("dead"), &ReturnOptions::new()).await.expect("create");
    backend.delete(dead.id, &ReturnOptions::new()).await.expect("delete");

    let filters = Filter::new().eq("isDeleted", json!(true)).ne("deletedAt", Value::Null);
    let page = backend
        .get_paginated(&PaginationRequest::new(0, 10).filters(filters), &ReturnOptions::new())
        .await
        .expect("get_paginated");
    assert_eq!(page.total, 1);
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, live.id);
}

/// A zero limit is rejected with `Validation`.
pub async fn paginated_zero_limit_is_rejected<R: Repository>(backend: &R) {
    let result =
        backend.get_paginated(&PaginationRequest::new(0, 0), &ReturnOptions::new()).await;
    assert!(
        matches!(result, Err(RepositoryError::Validation { .. })),
        "expected Validation, got {result:?}"
    );
}

// ============================================================================
// Search — case-insensitive substring match (1 test)
// ============================================================================

/// The `search` filter matches the configured searchable field
/// case-insensitively on substrings, with Unicode case folding — not
/// ASCII-only folding, which some engines default to.
pub async fn search_is_case_insensitive_substring<R: Repository>(backend: &R) {
    backend.create(named("Administrator"), &ReturnOptions::new()).await.expect("create");
    backend.create(named("viewer"), &ReturnOptions::new()).await.expect("create");
    backend.create(named("École des Mines"), &ReturnOptions::new()).await.expect("create");

    let hits = backend
        .get_all(&Filter::new().search("MINI"), &ReturnOptions::new())
        .await
        .expect("get_all");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].field("name"), Some(&json!("Administrator")));

    let accented = backend
        .get_all(&Filter::new().search("ÉCOLE"), &ReturnOptions::new())
        .await
        .expect("get_all accented");
    assert_eq!(accented.len(), 1, "case folding must cover non-ASCII letters");
    assert_eq!(accented[0].field("name"), Some(&json!("École des Mines")));
}

// ============================================================================
// Health — backend availability (1 test)
// ============================================================================

/// `health_check` reports an available backend as healthy.
pub async fn health_check_reports_available<R: Repository>(backend: &R) {
    backend.health_check().await.expect("healthy backend must report Ok");
}

// ============================================================================
// Convenience runner — run the whole suite against fresh adapters
// ============================================================================

/// Run the full conformance suite.
///
/// Because most tests assume an empty collection, the runner takes a
/// factory producing a **fresh** adapter (bound to [`standard_config`])
/// per test:
///
/// ```no_run
/// use entity_repository::{conformance, DocumentBackend, DocumentStore};
///
/// #[tokio::test]
/// async fn document_backend_conformance() {
///     conformance::run_all(|| {
///         DocumentBackend::new(DocumentStore::new(), conformance::standard_config())
///     })
///     .await;
/// }
/// ```
///
/// For finer-grained control or parallel execution, call individual test
/// functions directly.
pub async fn run_all<R, F>(make: F)
where
    R: Repository,
    F: Fn() -> R,
{
    // Create
    create_returns_payload_fields(&make()).await;
    create_assigns_identity_and_timestamps(&make()).await;
    create_rejects_duplicate_unique_field(&make()).await;

    // Read
    get_one_by_id_returns_created_entity(&make()).await;
    get_one_returns_none_for_no_match(&make()).await;
    get_all_excludes_soft_deleted(&make()).await;
    get_all_applies_select_projection(&make()).await;
    get_by_ids_returns_exact_membership(&make()).await;
    get_by_ids_includes_soft_deleted(&make()).await;
    lean_and_tracked_snapshots_are_identical(&make()).await;

    // Update
    update_merges_partial_payload(&make()).await;
    update_missing_id_is_not_found(&make()).await;
    update_does_not_resurrect_implicitly(&make()).await;
    update_with_explicit_clear_resurrects(&make()).await;

    // Delete
    delete_tombstones_entity(&make()).await;
    delete_missing_id_is_not_found(&make()).await;
    delete_is_repeatable(&make()).await;

    // Bulk
    bulk_create_persists_batch(&make()).await;
    bulk_create_atomic_violation_persists_nothing(&make()).await;
    bulk_create_atomic_rejects_intra_batch_duplicate(&make()).await;
    bulk_create_non_atomic_persists_valid_prefix(&make()).await;

    // Pagination
    paginated_window_and_total(&make()).await;
    paginated_filter_cannot_override_exclusion(&make()).await;
    paginated_zero_limit_is_rejected(&make()).await;

    // Search
    search_is_case_insensitive_substring(&make()).await;

    // Health
    health_check_reports_available(&make()).await;
}
