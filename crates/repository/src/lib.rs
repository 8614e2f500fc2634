//! Backend-agnostic persistence layer for entity collections.
//!
//! This crate provides the [`Repository`] trait and related types that let
//! application services perform CRUD, soft-delete, pagination and bulk
//! operations over one entity kind without knowing which storage engine is
//! underneath. Swapping the document store for the relational adapter is a
//! construction-time decision; no service code changes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! │       (RoleService, UserService, request handlers)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   EntityService                             │
//! │      (delegation, find_by convenience lookups)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 entity-repository                           │
//! │                 Repository trait                            │
//! │   (get_all, get_one, get_by_ids, create, bulk_create,       │
//! │    update, delete, get_paginated, health_check)             │
//! ├──────────────────┬───────────────────────────────────────────┤
//! │ DocumentBackend  │          SqliteBackend                    │
//! │ (testing, dev)   │  (in `entity-repository-sqlite`)          │
//! └──────────────────┴───────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use entity_repository::{
//!     CollectionConfig, DocumentBackend, DocumentStore, Filter, Payload, Repository,
//!     ReturnOptions,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create an in-memory backend for testing
//!     let store = DocumentStore::new();
//!     let roles = DocumentBackend::new(
//!         store,
//!         CollectionConfig::new("roles").unique_field("name"),
//!     );
//!
//!     // Persist an entity
//!     let mut payload = Payload::new();
//!     payload.insert("name".into(), json!("admin"));
//!     let created = roles.create(payload, &ReturnOptions::new()).await?;
//!
//!     // Soft-delete it: the record survives, default reads exclude it
//!     roles.delete(created.id, &ReturnOptions::new()).await?;
//!     let visible = roles.get_all(&Filter::new(), &ReturnOptions::new()).await?;
//!     assert!(visible.is_empty());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Available Backends
//!
//! | Backend | Use Case | Persistence |
//! |---------|----------|-------------|
//! | [`DocumentBackend`] | Testing, development | No |
//! | `SqliteBackend` (in `entity-repository-sqlite`) | Production | Yes |
//!
//! # Soft-delete Normalization
//!
//! Backends represent deletion differently: the document idiom stores an
//! explicit boolean flag, the relational idiom a nullable timestamp column.
//! This crate normalizes both to one representation — the nullable
//! [`Entity::deleted_at`] timestamp is the single source of truth, and
//! [`Entity::is_deleted`] is computed from it. No second source of truth
//! can disagree.
//!
//! # Error Handling
//!
//! All operations return [`RepoResult<T>`], which wraps the canonical
//! [`RepositoryError`] taxonomy. Backends map their internal errors to
//! these standardized variants.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with shared test helpers (payload builders,
//!   backend factories, assertion macros). Enable this in `[dev-dependencies]` for integration
//!   tests.

#![deny(unsafe_code)]

pub mod conformance;
pub mod document;
pub mod error;
pub mod options;
pub mod repository;
pub mod service;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use document::{DocumentBackend, DocumentStore};
pub use error::{BoxError, RepoResult, RepositoryError};
pub use repository::Repository;
pub use service::EntityService;
pub use types::{
    BulkOptions, CollectionConfig, Entity, EntityId, Filter, Page, PaginationRequest, Payload,
    Predicate, RelationBinding, ReturnOptions,
};
