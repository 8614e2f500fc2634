//! Table bootstrap for collection-backed entity tables.
//!
//! Each collection maps to one table with a fixed column layout: the
//! payload lives in a single `fields` TEXT column as JSON, the bookkeeping
//! fields are real columns. Soft delete is the relational idiom: a nullable
//! `deleted_at` timestamp column, no boolean flag.
//!
//! Unique constraints from the [`CollectionConfig`] become expression
//! indexes over `json_extract`, so the database itself rejects duplicate
//! values. SQLite unique indexes ignore NULL, which matches the contract's
//! exemption for absent unique fields.

use entity_repository::{CollectionConfig, RepoResult, RepositoryError};
use rusqlite::Connection;

use crate::error::map_sqlite_error;

/// Creates the collection table and its unique indexes if absent.
pub fn ensure_table(conn: &Connection, config: &CollectionConfig) -> RepoResult<()> {
    validate_identifier(&config.name)?;

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            fields TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            created_by TEXT,
            updated_by TEXT
        );",
        table = config.name,
    ))
    .map_err(|e| map_sqlite_error("create collection table", e))?;

    for field in &config.unique_fields {
        validate_identifier(field)?;
        conn.execute_batch(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS ux_{table}_{field}
             ON {table} (json_extract(fields, '$.{field}'));",
            table = config.name,
        ))
        .map_err(|e| map_sqlite_error("create unique index", e))?;
    }

    Ok(())
}

/// Rejects names that cannot be spliced into SQL safely.
///
/// Table and field names come from [`CollectionConfig`], not from request
/// payloads, but they still end up inside SQL text and JSON paths.
pub(crate) fn validate_identifier(name: &str) -> RepoResult<()> {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(RepositoryError::validation(format!("invalid identifier `{name}`")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(validate_identifier("roles").is_ok());
        assert!(validate_identifier("roleId").is_ok());
        assert!(validate_identifier("_hidden2").is_ok());
    }

    #[test]
    fn rejects_injectable_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("na me").is_err());
        assert!(validate_identifier("x'); DROP TABLE roles; --").is_err());
        assert!(validate_identifier("a.b").is_err());
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let config = CollectionConfig::new("items").unique_field("name");
        ensure_table(&conn, &config).unwrap();
        ensure_table(&conn, &config).unwrap();
    }
}
