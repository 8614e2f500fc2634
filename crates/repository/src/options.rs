//! Option and payload normalization shared by backend adapters.
//!
//! Adapters diverge in how they execute queries, but the translation rules
//! of the contract must hold regardless of backend: `select` parsing, the
//! `search` filter convention, the soft-delete exclusion, the field-level
//! merge and the tombstone normalization all live here so the two adapter
//! implementations cannot drift apart.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    error::{RepoResult, RepositoryError},
    types::{Entity, Filter, PaginationRequest, Payload, Predicate},
};

/// Payload keys the contract reserves for bookkeeping. They are split out
/// of payloads before the opaque fields are stored.
const RESERVED_KEYS: [&str; 7] =
    ["id", "createdAt", "updatedAt", "deletedAt", "isDeleted", "createdBy", "updatedBy"];

/// The conventional search filter key.
const SEARCH_KEY: &str = "search";

/// A caller filter after sanitization: the generic clauses with the
/// `search` convention and any soft-delete clauses removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFilter {
    /// Generic per-field clauses.
    pub clauses: Filter,
    /// Extracted `search` needle, to be matched case-insensitively against
    /// the collection's searchable field.
    pub search: Option<String>,
}

/// Sanitizes a caller-supplied filter.
///
/// - Extracts the conventional `search` clause into a dedicated needle.
/// - Strips `isDeleted`/`deletedAt` clauses: the soft-delete exclusion is
///   applied by the adapter and caller filters can never override it.
///
/// # Errors
///
/// [`RepositoryError::Validation`] if the `search` clause is not a string.
pub fn sanitize_filter(filter: &Filter) -> RepoResult<NormalizedFilter> {
    let mut clauses = Filter::new();
    let mut search = None;

    for (field, predicate) in filter.iter() {
        match field.as_str() {
            // The exclusion always wins; drop any attempt to filter on the
            // soft-delete markers directly.
            "isDeleted" | "deletedAt" => {
                tracing::debug!(field = %field, "dropping caller soft-delete clause");
            },
            SEARCH_KEY => {
                search = Some(search_needle(predicate)?);
            },
            _ => clauses.insert(field.clone(), predicate.clone()),
        }
    }

    Ok(NormalizedFilter { clauses, search })
}

fn search_needle(predicate: &Predicate) -> RepoResult<String> {
    match predicate {
        Predicate::Eq(Value::String(s)) | Predicate::Contains(s) => Ok(s.clone()),
        other => Err(RepositoryError::validation(format!(
            "search filter must be a string, got {other:?}"
        ))),
    }
}

/// Parses a space-delimited `select` list into field names.
///
/// Returns `None` when no projection was requested (or the list is empty),
/// meaning the full payload is exposed.
#[must_use]
pub fn parse_select(select: Option<&str>) -> Option<Vec<String>> {
    let fields: Vec<String> = select?
        .split_whitespace()
        .map(str::to_owned)
        .collect();
    if fields.is_empty() { None } else { Some(fields) }
}

/// Applies the `select` projection to an entity in place.
///
/// Retains only the allow-listed payload fields; the identifier and
/// bookkeeping fields are untouched.
pub fn apply_select(entity: &mut Entity, select: Option<&str>) {
    if let Some(allowed) = parse_select(select) {
        entity.fields.retain(|key, _| allowed.iter().any(|f| f == key));
    }
}

/// Outcome of splitting the soft-delete directives out of an update
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TombstonePatch {
    /// The payload said nothing about deletion; the marker is untouched.
    Keep,
    /// Explicitly clear the tombstone (resurrect the entity).
    Clear,
    /// Explicitly set the tombstone to the given instant.
    Set(DateTime<Utc>),
}

/// Reserved parts split out of a create payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewEntityParts {
    /// The opaque payload fields to store.
    pub fields: Payload,
    /// Caller-supplied audit field, if any.
    pub created_by: Option<String>,
    /// Caller-supplied audit field, if any.
    pub updated_by: Option<String>,
}

/// Splits the reserved bookkeeping keys out of a create payload.
///
/// `id`, timestamps and soft-delete markers are backend-managed and are
/// dropped silently; a freshly created entity is always live. The audit
/// fields are captured when present as strings.
#[must_use]
pub fn split_create_payload(mut payload: Payload) -> NewEntityParts {
    let created_by = take_string(&mut payload, "createdBy");
    let updated_by = take_string(&mut payload, "updatedBy");
    for key in RESERVED_KEYS {
        payload.remove(key);
    }
    NewEntityParts { fields: payload, created_by, updated_by }
}

/// Reserved parts split out of an update payload.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateParts {
    /// The opaque fields to merge.
    pub fields: Payload,
    /// The soft-delete directive, normalized to the single `deleted_at`
    /// representation.
    pub tombstone: TombstonePatch,
    /// Caller-supplied audit field, if any.
    pub updated_by: Option<String>,
}

/// Splits the reserved bookkeeping keys out of an update payload.
///
/// `deletedAt` takes precedence over `isDeleted` when both are present;
/// the boolean is only consulted when the timestamp is absent. `id`,
/// `createdAt`, `updatedAt` and `createdBy` are immutable and dropped.
///
/// # Errors
///
/// [`RepositoryError::Validation`] if `deletedAt` is neither null nor an
/// RFC 3339 timestamp, or `isDeleted` is not a boolean.
pub fn split_update_payload(mut changes: Payload) -> RepoResult<UpdateParts> {
    let updated_by = take_string(&mut changes, "updatedBy");

    let tombstone = match changes.remove("deletedAt") {
        Some(Value::Null) => TombstonePatch::Clear,
        Some(Value::String(s)) => {
            let parsed = DateTime::parse_from_rfc3339(&s).map_err(|e| {
                RepositoryError::validation_with_source(
                    format!("deletedAt must be an RFC 3339 timestamp, got `{s}`"),
                    e,
                )
            })?;
            TombstonePatch::Set(parsed.with_timezone(&Utc))
        },
        Some(other) => {
            return Err(RepositoryError::validation(format!(
                "deletedAt must be null or an RFC 3339 timestamp, got {other}"
            )));
        },
        None => match changes.remove("isDeleted") {
            Some(Value::Bool(false)) => TombstonePatch::Clear,
            Some(Value::Bool(true)) => TombstonePatch::Set(Utc::now()),
            Some(other) => {
                return Err(RepositoryError::validation(format!(
                    "isDeleted must be a boolean, got {other}"
                )));
            },
            None => TombstonePatch::Keep,
        },
    };
    // Consume a now-redundant isDeleted when deletedAt already decided.
    changes.remove("isDeleted");

    for key in ["id", "createdAt", "updatedAt", "createdBy"] {
        changes.remove(key);
    }

    Ok(UpdateParts { fields: changes, tombstone, updated_by })
}

/// Merges `changes` into `target` at field level.
///
/// This is a top-level key merge (the contract's partial-merge rule), not
/// a deep merge: a key present in `changes` replaces the whole value.
pub fn merge_fields(target: &mut Payload, changes: Payload) {
    for (key, value) in changes {
        target.insert(key, value);
    }
}

/// Validates a pagination request.
///
/// # Errors
///
/// [`RepositoryError::Validation`] if `limit` is zero.
pub fn validate_page_request(request: &PaginationRequest) -> RepoResult<()> {
    if request.limit == 0 {
        return Err(RepositoryError::validation("pagination limit must be positive"));
    }
    Ok(())
}

fn take_string(payload: &mut Payload, key: &str) -> Option<String> {
    match payload.remove(key) {
        Some(Value::String(s)) => Some(s),
        // A non-string audit value is dropped with the other reserved keys.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::types::EntityId;

    fn payload_of(pairs: &[(&str, Value)]) -> Payload {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn parse_select_splits_on_whitespace() {
        assert_eq!(
            parse_select(Some("name  status\tdescription")),
            Some(vec!["name".to_owned(), "status".to_owned(), "description".to_owned()])
        );
        assert_eq!(parse_select(Some("")), None);
        assert_eq!(parse_select(None), None);
    }

    #[test]
    fn apply_select_retains_only_allowed_fields() {
        let mut entity = Entity {
            id: EntityId::generate(),
            fields: payload_of(&[("name", json!("a")), ("description", json!("b"))]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
            created_by: None,
            updated_by: None,
        };
        apply_select(&mut entity, Some("name"));
        assert_eq!(entity.field("name"), Some(&json!("a")));
        assert_eq!(entity.field("description"), None);
    }

    #[test]
    fn sanitize_extracts_search_and_strips_soft_delete_clauses() {
        let filter = Filter::new()
            .eq("status", true)
            .eq("isDeleted", true)
            .eq("deletedAt", Value::Null)
            .search("adm");
        let normalized = sanitize_filter(&filter).expect("sanitize");
        assert_eq!(normalized.search.as_deref(), Some("adm"));
        assert_eq!(normalized.clauses.len(), 1);
        assert!(normalized.clauses.get("isDeleted").is_none());
        assert!(normalized.clauses.get("deletedAt").is_none());
    }

    #[test]
    fn sanitize_rejects_non_string_search() {
        let filter = Filter::new().eq("search", 7);
        let result = sanitize_filter(&filter);
        assert!(matches!(result, Err(RepositoryError::Validation { .. })));
    }

    #[test]
    fn split_create_drops_reserved_keys_and_captures_audit() {
        let payload = payload_of(&[
            ("name", json!("admin")),
            ("id", json!("forged")),
            ("isDeleted", json!(true)),
            ("createdBy", json!("ops")),
        ]);
        let parts = split_create_payload(payload);
        assert_eq!(parts.fields, payload_of(&[("name", json!("admin"))]));
        assert_eq!(parts.created_by.as_deref(), Some("ops"));
        assert_eq!(parts.updated_by, None);
    }

    #[test]
    fn split_update_keeps_tombstone_by_default() {
        let parts = split_update_payload(payload_of(&[("name", json!("x"))])).expect("split");
        assert_eq!(parts.tombstone, TombstonePatch::Keep);
        assert_eq!(parts.fields.len(), 1);
    }

    #[test]
    fn split_update_null_deleted_at_clears() {
        let parts = split_update_payload(payload_of(&[
            ("deletedAt", Value::Null),
            ("isDeleted", json!(false)),
        ]))
        .expect("split");
        assert_eq!(parts.tombstone, TombstonePatch::Clear);
        assert!(parts.fields.is_empty());
    }

    #[test]
    fn split_update_timestamp_sets_tombstone() {
        let instant = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        let parts =
            split_update_payload(payload_of(&[("deletedAt", json!(instant.to_rfc3339()))]))
                .expect("split");
        assert_eq!(parts.tombstone, TombstonePatch::Set(instant));
    }

    #[test]
    fn split_update_is_deleted_true_sets_tombstone() {
        let parts =
            split_update_payload(payload_of(&[("isDeleted", json!(true))])).expect("split");
        assert!(matches!(parts.tombstone, TombstonePatch::Set(_)));
    }

    #[test]
    fn split_update_rejects_malformed_deleted_at() {
        let result = split_update_payload(payload_of(&[("deletedAt", json!("yesterday"))]));
        assert!(matches!(result, Err(RepositoryError::Validation { .. })));
    }

    #[test]
    fn merge_is_field_level_not_overwrite() {
        let mut target = payload_of(&[("name", json!("A")), ("description", json!("B"))]);
        merge_fields(&mut target, payload_of(&[("name", json!("X"))]));
        assert_eq!(target, payload_of(&[("name", json!("X")), ("description", json!("B"))]));
    }

    #[test]
    fn zero_limit_is_rejected() {
        let request = PaginationRequest::new(0, 0);
        assert!(matches!(
            validate_page_request(&request),
            Err(RepositoryError::Validation { .. })
        ));
    }
}
