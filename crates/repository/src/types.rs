//! Common types used across repository operations.
//!
//! This module defines the shared data structures consumed by the
//! [`Repository`](crate::Repository) contract and its backend adapters:
//! entity identifiers, the normalized [`Entity`] shape, filters, return
//! options, pagination requests and the per-collection binding
//! configuration.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An opaque field-name → value mapping.
///
/// Payloads are schema-less from the contract's point of view; constraint
/// enforcement (uniqueness, schema validation) is the backend's job.
pub type Payload = serde_json::Map<String, Value>;

/// Unique, backend-assigned entity identifier.
///
/// Wraps a UUIDv7 so identifiers are time-ordered, immutable once assigned
/// and never reused after deletion. The newtype prevents accidentally
/// passing a raw string where an identifier is expected.
///
/// # Examples
///
/// ```
/// use entity_repository::EntityId;
///
/// let id = EntityId::generate();
/// let parsed: EntityId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generates a fresh, time-ordered identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for EntityId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<EntityId> for Uuid {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One persisted record of a given kind.
///
/// Every entity carries its opaque payload plus the backend-managed
/// bookkeeping fields: timestamps, the soft-delete marker and the optional
/// audit fields.
///
/// # Soft-delete representation
///
/// The nullable [`deleted_at`](Entity::deleted_at) timestamp is the single
/// source of truth for deletion; [`is_deleted`](Entity::is_deleted) is a
/// computed predicate over it. Backends that natively store a boolean flag
/// (the document idiom) normalize to this representation when materializing
/// an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// The backend-assigned identifier.
    pub id: EntityId,

    /// The entity payload. Projection (`select`) applies to this map only;
    /// the identifier and bookkeeping fields are always present.
    #[serde(flatten)]
    pub fields: Payload,

    /// When the entity was created (backend-managed).
    pub created_at: DateTime<Utc>,

    /// When the entity was last written (backend-managed).
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker. `Some(_)` means the entity is logically removed
    /// and excluded from default read paths.
    pub deleted_at: Option<DateTime<Utc>>,

    /// Audit field: who created the entity, when supplied by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    /// Audit field: who last updated the entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl Entity {
    /// Whether the entity is soft-deleted.
    ///
    /// Derived from [`deleted_at`](Entity::deleted_at); there is no second
    /// source of truth that can disagree.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns a payload field by name, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A per-field selection predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals the value. A missing field compares equal to JSON null.
    Eq(Value),
    /// Field differs from the value.
    Ne(Value),
    /// Field value is a member of the set. Exact-match membership, not
    /// partial or fuzzy.
    In(Vec<Value>),
    /// Case-insensitive partial match against the field's text value.
    Contains(String),
}

/// A mapping of field name → predicate used to select entities.
///
/// Filters are unique per query and never persisted. The conventional
/// `search` key is not matched literally: adapters remove it and translate
/// it into a case-insensitive partial match against the collection's
/// configured searchable field.
///
/// # Examples
///
/// ```
/// use entity_repository::Filter;
///
/// let filter = Filter::new()
///     .eq("status", true)
///     .contains("description", "admin");
/// assert_eq!(filter.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: BTreeMap<String, Predicate>,
}

impl Filter {
    /// Creates an empty filter (matches everything not soft-deleted).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter selecting one entity by identifier.
    #[must_use]
    pub fn by_id(id: EntityId) -> Self {
        Self::new().eq("id", id.to_string())
    }

    /// Adds an equality clause.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.insert(field.into(), Predicate::Eq(value.into()));
        self
    }

    /// Adds an inequality clause.
    #[must_use]
    pub fn ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.insert(field.into(), Predicate::Ne(value.into()));
        self
    }

    /// Adds a set-membership clause.
    #[must_use]
    pub fn is_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.insert(field.into(), Predicate::In(values));
        self
    }

    /// Adds a case-insensitive partial-match clause.
    #[must_use]
    pub fn contains(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.clauses.insert(field.into(), Predicate::Contains(needle.into()));
        self
    }

    /// Adds the conventional `search` clause.
    #[must_use]
    pub fn search(self, needle: impl Into<String>) -> Self {
        self.eq("search", needle.into())
    }

    /// Inserts a predicate for a field, replacing any existing clause.
    pub fn insert(&mut self, field: impl Into<String>, predicate: Predicate) {
        self.clauses.insert(field.into(), predicate);
    }

    /// Removes and returns the clause for a field.
    pub fn remove(&mut self, field: &str) -> Option<Predicate> {
        self.clauses.remove(field)
    }

    /// Returns the predicate for a field, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Predicate> {
        self.clauses.get(field)
    }

    /// Iterates over clauses in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Predicate)> {
        self.clauses.iter()
    }

    /// Number of clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Whether the filter has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Configuration controlling result shape.
///
/// - `lean` requests a plain, detached data snapshot instead of a
///   live-tracked instance. Both bundled adapters always return detached
///   snapshots, which is the contract's documented fallback when live
///   tracking is unsupported.
/// - `select` is a space-delimited allow-list of payload fields to project.
///   The identifier and bookkeeping fields are always retained.
/// - `include` names a configured relation to expand into the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnOptions {
    /// Return a plain snapshot rather than a tracked instance.
    pub lean: bool,
    /// Space-delimited allow-list of payload fields, e.g. `"name status"`.
    pub select: Option<String>,
    /// Relation name to expand, per the collection's relation bindings.
    pub include: Option<String>,
}

impl ReturnOptions {
    /// Creates default options: full payload, no expansion.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a detached snapshot.
    #[must_use]
    pub fn lean(mut self) -> Self {
        self.lean = true;
        self
    }

    /// Restricts the payload to the given space-delimited field list.
    #[must_use]
    pub fn select(mut self, fields: impl Into<String>) -> Self {
        self.select = Some(fields.into());
        self
    }

    /// Expands the named relation into the result.
    #[must_use]
    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.include = Some(relation.into());
        self
    }
}

/// Options controlling bulk-insert behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOptions {
    /// When `true` (the default), any single payload failure aborts the
    /// entire batch and nothing is persisted. When `false`, the backend is
    /// permitted to persist a valid prefix and report the first failure.
    pub atomic: bool,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self { atomic: true }
    }
}

/// A pagination request: window plus caller filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginationRequest {
    /// Number of matching entities to skip.
    pub skip: u64,
    /// Maximum number of entities to return. Must be positive.
    pub limit: u64,
    /// Caller-supplied filters, merged with (never overriding) the
    /// soft-delete exclusion.
    pub filters: Filter,
}

impl PaginationRequest {
    /// Creates a request for the given window with no filters.
    #[must_use]
    pub fn new(skip: u64, limit: u64) -> Self {
        Self { skip, limit, filters: Filter::new() }
    }

    /// Attaches caller filters to the request.
    #[must_use]
    pub fn filters(mut self, filters: Filter) -> Self {
        self.filters = filters;
        self
    }
}

/// One page of results.
///
/// `total` is the count of entities matching the filters *before* skip and
/// limit are applied, computed from the same soft-delete-filtered view as
/// `data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// The entities in this window, in backend order.
    pub data: Vec<Entity>,
    /// Count of all matches before windowing.
    pub total: u64,
}

/// Binding that lets `include` expand a related entity.
///
/// The relation reads the identifier stored in `field`, looks it up in the
/// `target` collection, and embeds the result under `embed_as` in the
/// payload. Expansion is a direct identifier lookup, so a soft-deleted
/// target is still embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationBinding {
    /// Payload field holding the foreign identifier.
    pub field: String,
    /// Name of the related collection/table.
    pub target: String,
    /// Payload key the expanded entity is embedded under.
    pub embed_as: String,
}

impl RelationBinding {
    /// Creates a relation binding.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        target: impl Into<String>,
        embed_as: impl Into<String>,
    ) -> Self {
        Self { field: field.into(), target: target.into(), embed_as: embed_as.into() }
    }
}

/// Per-entity-kind binding consumed by an adapter at construction.
///
/// This is the one configuration the core requires: the collection name,
/// which field the `search` convention targets, which fields are unique,
/// and which relations `include` may expand.
///
/// # Examples
///
/// ```
/// use entity_repository::{CollectionConfig, RelationBinding};
///
/// let users = CollectionConfig::new("users")
///     .searchable_field("username")
///     .unique_field("email")
///     .relation(RelationBinding::new("roleId", "roles", "role"));
/// assert_eq!(users.name, "users");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionConfig {
    /// Collection (document backend) or table (relational backend) name.
    pub name: String,
    /// Field the `search` filter convention matches against.
    pub searchable_field: String,
    /// Payload fields with a uniqueness constraint.
    pub unique_fields: Vec<String>,
    /// Relations available to `include`.
    pub relations: Vec<RelationBinding>,
}

impl CollectionConfig {
    /// Creates a config with the conventional searchable field (`name`)
    /// and no constraints or relations.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            searchable_field: "name".to_owned(),
            unique_fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Sets the field targeted by the `search` convention.
    #[must_use]
    pub fn searchable_field(mut self, field: impl Into<String>) -> Self {
        self.searchable_field = field.into();
        self
    }

    /// Adds a unique-field constraint.
    #[must_use]
    pub fn unique_field(mut self, field: impl Into<String>) -> Self {
        self.unique_fields.push(field.into());
        self
    }

    /// Adds a relation binding for `include` expansion.
    #[must_use]
    pub fn relation(mut self, binding: RelationBinding) -> Self {
        self.relations.push(binding);
        self
    }

    /// Looks up a relation by its embed name.
    #[must_use]
    pub fn relation_named(&self, embed_as: &str) -> Option<&RelationBinding> {
        self.relations.iter().find(|r| r.embed_as == embed_as)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn entity_id_roundtrips_through_display() {
        let id = EntityId::generate();
        let parsed: EntityId = id.to_string().parse().expect("parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn entity_ids_are_time_ordered() {
        let a = EntityId::generate();
        let b = EntityId::generate();
        assert!(a <= b, "v7 identifiers should be monotonic");
    }

    #[test]
    fn filter_builder_collects_clauses() {
        let filter = Filter::new().eq("name", "admin").ne("status", false);
        assert_eq!(filter.get("name"), Some(&Predicate::Eq(json!("admin"))));
        assert_eq!(filter.get("status"), Some(&Predicate::Ne(json!(false))));
    }

    #[test]
    fn filter_by_id_uses_string_form() {
        let id = EntityId::generate();
        let filter = Filter::by_id(id);
        assert_eq!(filter.get("id"), Some(&Predicate::Eq(json!(id.to_string()))));
    }

    #[test]
    fn entity_serializes_with_flattened_payload() {
        let mut fields = Payload::new();
        fields.insert("name".to_owned(), json!("admin"));
        let entity = Entity {
            id: EntityId::generate(),
            fields,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
            created_by: None,
            updated_by: None,
        };
        let value = serde_json::to_value(&entity).expect("serialize");
        assert_eq!(value["name"], json!("admin"));
        assert!(value.get("createdAt").is_some(), "camelCase timestamp key");
        assert!(value.get("createdBy").is_none(), "absent audit field is omitted");
    }

    #[test]
    fn is_deleted_derives_from_timestamp() {
        let mut entity = Entity {
            id: EntityId::generate(),
            fields: Payload::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
            created_by: None,
            updated_by: None,
        };
        assert!(!entity.is_deleted());
        entity.deleted_at = Some(Utc::now());
        assert!(entity.is_deleted());
    }

    #[test]
    fn bulk_options_default_to_atomic() {
        assert!(BulkOptions::default().atomic);
    }

    #[test]
    fn collection_config_relation_lookup() {
        let config = CollectionConfig::new("users")
            .relation(RelationBinding::new("roleId", "roles", "role"));
        assert!(config.relation_named("role").is_some());
        assert!(config.relation_named("group").is_none());
    }
}
