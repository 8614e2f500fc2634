//! Conformance test suite for `SqliteBackend`.
//!
//! Runs the shared contract suite against a fresh in-memory database per
//! test; the adapter must be indistinguishable from the document backend
//! through the trait.

#![allow(clippy::expect_used, clippy::panic)]

use entity_repository::conformance;
use entity_repository_sqlite::SqliteBackend;

fn fresh() -> SqliteBackend {
    SqliteBackend::open_in_memory(conformance::standard_config())
        .expect("in-memory database should open")
}

// ============================================================================
// Create (3 tests)
// ============================================================================

#[tokio::test]
async fn create_returns_payload_fields() {
    conformance::create_returns_payload_fields(&fresh()).await;
}

#[tokio::test]
async fn create_assigns_identity_and_timestamps() {
    conformance::create_assigns_identity_and_timestamps(&fresh()).await;
}

#[tokio::test]
async fn create_rejects_duplicate_unique_field() {
    conformance::create_rejects_duplicate_unique_field(&fresh()).await;
}

// ============================================================================
// Read (7 tests)
// ============================================================================

#[tokio::test]
async fn get_one_by_id_returns_created_entity() {
    conformance::get_one_by_id_returns_created_entity(&fresh()).await;
}

#[tokio::test]
async fn get_one_returns_none_for_no_match() {
    conformance::get_one_returns_none_for_no_match(&fresh()).await;
}

#[tokio::test]
async fn get_all_excludes_soft_deleted() {
    conformance::get_all_excludes_soft_deleted(&fresh()).await;
}

#[tokio::test]
async fn get_all_applies_select_projection() {
    conformance::get_all_applies_select_projection(&fresh()).await;
}

#[tokio::test]
async fn get_by_ids_returns_exact_membership() {
    conformance::get_by_ids_returns_exact_membership(&fresh()).await;
}

#[tokio::test]
async fn get_by_ids_includes_soft_deleted() {
    conformance::get_by_ids_includes_soft_deleted(&fresh()).await;
}

#[tokio::test]
async fn lean_and_tracked_snapshots_are_identical() {
    conformance::lean_and_tracked_snapshots_are_identical(&fresh()).await;
}

// ============================================================================
// Update (4 tests)
// ============================================================================

#[tokio::test]
async fn update_merges_partial_payload() {
    conformance::update_merges_partial_payload(&fresh()).await;
}

#[tokio::test]
async fn update_missing_id_is_not_found() {
    conformance::update_missing_id_is_not_found(&fresh()).await;
}

#[tokio::test]
async fn update_does_not_resurrect_implicitly() {
    conformance::update_does_not_resurrect_implicitly(&fresh()).await;
}

#[tokio::test]
async fn update_with_explicit_clear_resurrects() {
    conformance::update_with_explicit_clear_resurrects(&fresh()).await;
}

// ============================================================================
// Delete (3 tests)
// ============================================================================

#[tokio::test]
async fn delete_tombstones_entity() {
    conformance::delete_tombstones_entity(&fresh()).await;
}

#[tokio::test]
async fn delete_missing_id_is_not_found() {
    conformance::delete_missing_id_is_not_found(&fresh()).await;
}

#[tokio::test]
async fn delete_is_repeatable() {
    conformance::delete_is_repeatable(&fresh()).await;
}

// ============================================================================
// Bulk (4 tests)
// ============================================================================

#[tokio::test]
async fn bulk_create_persists_batch() {
    conformance::bulk_create_persists_batch(&fresh()).await;
}

#[tokio::test]
async fn bulk_create_atomic_violation_persists_nothing() {
    conformance::bulk_create_atomic_violation_persists_nothing(&fresh()).await;
}

#[tokio::test]
async fn bulk_create_atomic_rejects_intra_batch_duplicate() {
    conformance::bulk_create_atomic_rejects_intra_batch_duplicate(&fresh()).await;
}

#[tokio::test]
async fn bulk_create_non_atomic_persists_valid_prefix() {
    conformance::bulk_create_non_atomic_persists_valid_prefix(&fresh()).await;
}

// ============================================================================
// Pagination (3 tests)
// ============================================================================

#[tokio::test]
async fn paginated_window_and_total() {
    conformance::paginated_window_and_total(&fresh()).await;
}

#[tokio::test]
async fn paginated_filter_cannot_override_exclusion() {
    conformance::paginated_filter_cannot_override_exclusion(&fresh()).await;
}

#[tokio::test]
async fn paginated_zero_limit_is_rejected() {
    conformance::paginated_zero_limit_is_rejected(&fresh()).await;
}

// ============================================================================
// Search (1 test)
// ============================================================================

#[tokio::test]
async fn search_is_case_insensitive_substring() {
    conformance::search_is_case_insensitive_substring(&fresh()).await;
}

// ============================================================================
// Health (1 test)
// ============================================================================

#[tokio::test]
async fn health_check_reports_available() {
    conformance::health_check_reports_available(&fresh()).await;
}

// ============================================================================
// Full suite
// ============================================================================

#[tokio::test]
async fn run_all() {
    conformance::run_all(fresh).await;
}
