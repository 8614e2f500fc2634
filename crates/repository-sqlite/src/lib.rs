//! SQLite adapter for the `entity-repository` contract.
//!
//! This crate provides [`SqliteBackend`], a persistent implementation of
//! the [`Repository`](entity_repository::Repository) trait over `rusqlite`.
//! Each collection maps to one table: the opaque payload lives in a JSON
//! `fields` column, bookkeeping fields are real columns, and unique
//! constraints become `json_extract` expression indexes so the database
//! enforces them.
//!
//! # Soft delete
//!
//! The table carries the relational idiom directly: a nullable
//! `deleted_at` TEXT column and no boolean flag, which is exactly the
//! contract's normalized representation. All default read paths append
//! `deleted_at IS NULL`.
//!
//! # Relations
//!
//! Build adapters for related collections over one shared connection via
//! [`SqliteBackend::from_connection`]; `include` then expands a stored
//! identifier reference into the embedded related entity.
//!
//! # Quick Start
//!
//! ```no_run
//! use entity_repository::{CollectionConfig, Payload, RelationBinding, Repository, ReturnOptions};
//! use entity_repository_sqlite::SqliteBackend;
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let roles = SqliteBackend::open("app.db", CollectionConfig::new("roles").unique_field("name"))?;
//! let users = SqliteBackend::from_connection(
//!     roles.connection(),
//!     CollectionConfig::new("users")
//!         .searchable_field("username")
//!         .unique_field("email")
//!         .relation(RelationBinding::new("roleId", "roles", "role")),
//! )?;
//!
//! let mut payload = Payload::new();
//! payload.insert("name".into(), json!("admin"));
//! let admin = roles.create(payload, &ReturnOptions::new()).await?;
//!
//! let mut user = Payload::new();
//! user.insert("username".into(), json!("alice"));
//! user.insert("roleId".into(), json!(admin.id.to_string()));
//! let alice = users.create(user, &ReturnOptions::new()).await?;
//!
//! let with_role = users
//!     .get_by_ids(&[alice.id], &ReturnOptions::new().include("role"))
//!     .await?;
//! assert_eq!(with_role[0].field("role").unwrap()["name"], json!("admin"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

#![deny(unsafe_code)]

pub mod backend;
mod error;
pub mod schema;

pub use backend::SqliteBackend;
pub use schema::ensure_table;
