//! SQLite-backed implementation of the repository contract.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use entity_repository::{
    options::{self, NormalizedFilter, TombstonePatch},
    BulkOptions, CollectionConfig, Entity, EntityId, Filter, Page, PaginationRequest, Payload,
    Predicate, RepoResult, Repository, RepositoryError, ReturnOptions,
};
use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, Row};
use serde_json::Value;

use crate::error::map_sqlite_error;
use crate::schema::{ensure_table, validate_identifier};

const SELECT_COLUMNS: &str =
    "id, fields, created_at, updated_at, deleted_at, created_by, updated_by";

/// SQLite adapter for one entity collection.
///
/// The payload is stored as JSON in a single `fields` column; filters
/// compile to `json_extract` expressions so predicates run inside the
/// database. Soft delete is the relational idiom: the nullable `deleted_at`
/// column is the only deletion marker, which already matches the
/// contract's normalized representation.
///
/// The connection is shared behind a mutex. Adapters for related
/// collections (users and their roles) should be built over the same
/// connection via [`from_connection`](SqliteBackend::from_connection) so
/// `include` can expand relations.
///
/// # Example
///
/// ```no_run
/// use entity_repository::{CollectionConfig, Payload, Repository, ReturnOptions};
/// use entity_repository_sqlite::SqliteBackend;
/// use serde_json::json;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let roles = SqliteBackend::open(
///     "app.db",
///     CollectionConfig::new("roles").unique_field("name"),
/// )?;
///
/// let mut payload = Payload::new();
/// payload.insert("name".into(), json!("admin"));
/// roles.create(payload, &ReturnOptions::new()).await?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    config: CollectionConfig,
}

impl SqliteBackend {
    /// Opens (or creates) a database file and binds one collection table.
    pub fn open(path: impl AsRef<Path>, config: CollectionConfig) -> RepoResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| map_sqlite_error("open database file", e))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| map_sqlite_error("configure connection", e))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| map_sqlite_error("configure connection", e))?;
        Self::from_connection(Arc::new(Mutex::new(conn)), config)
    }

    /// Opens an in-memory database. Data is lost when the backend drops.
    pub fn open_in_memory(config: CollectionConfig) -> RepoResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| map_sqlite_error("open in-memory database", e))?;
        Self::from_connection(Arc::new(Mutex::new(conn)), config)
    }

    /// Binds a collection table over an existing shared connection.
    ///
    /// This is how related collections end up in one database: build each
    /// adapter from the same `Arc<Mutex<Connection>>`.
    pub fn from_connection(
        conn: Arc<Mutex<Connection>>,
        config: CollectionConfig,
    ) -> RepoResult<Self> {
        {
            let guard = conn.lock();
            register_unicode_lower(&guard)?;
            ensure_table(&guard, &config)?;
        }
        Ok(Self { conn, config })
    }

    /// The collection binding this adapter was constructed with.
    #[must_use]
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// The shared connection handle, for binding further collections.
    #[must_use]
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn column_expr(&self, field: &str) -> RepoResult<String> {
        validate_identifier(field)?;
        if field == "id" {
            Ok("id".to_owned())
        } else {
            Ok(format!("json_extract(fields, '$.{field}')"))
        }
    }

    /// Compiles the normalized filter to a WHERE clause plus bind values.
    ///
    /// `exclude_deleted` adds the tombstone exclusion; identifier lookups
    /// pass `false`.
    fn where_clause(
        &self,
        filter: &NormalizedFilter,
        exclude_deleted: bool,
    ) -> RepoResult<(String, Vec<SqlValue>)> {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        if exclude_deleted {
            clauses.push("deleted_at IS NULL".to_owned());
        }

        for (field, predicate) in filter.clauses.iter() {
            let column = self.column_expr(field)?;
            match predicate {
                // IS / IS NOT instead of = / <> so Null compares like a value.
                Predicate::Eq(value) => {
                    clauses.push(format!("{column} IS ?"));
                    binds.push(json_to_sql(value)?);
                },
                Predicate::Ne(value) => {
                    clauses.push(format!("{column} IS NOT ?"));
                    binds.push(json_to_sql(value)?);
                },
                Predicate::In(values) => {
                    if values.is_empty() {
                        clauses.push("1 = 0".to_owned());
                    } else {
                        let placeholders = vec!["?"; values.len()].join(", ");
                        clauses.push(format!("{column} IN ({placeholders})"));
                        for value in values {
                            binds.push(json_to_sql(value)?);
                        }
                    }
                },
                Predicate::Contains(needle) => {
                    clauses.push(format!(
                        "instr(lower_unicode(CAST({column} AS TEXT)), ?) > 0"
                    ));
                    binds.push(SqlValue::Text(needle.to_lowercase()));
                },
            }
        }

        if let Some(needle) = &filter.search {
            let column = self.column_expr(&self.config.searchable_field)?;
            clauses.push(format!("instr(lower_unicode(CAST({column} AS TEXT)), ?) > 0"));
            binds.push(SqlValue::Text(needle.to_lowercase()));
        }

        if clauses.is_empty() {
            Ok((String::new(), binds))
        } else {
            Ok((format!(" WHERE {}", clauses.join(" AND ")), binds))
        }
    }

    fn query_rows(
        &self,
        conn: &Connection,
        suffix: &str,
        binds: Vec<SqlValue>,
    ) -> RepoResult<Vec<RawRow>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM {}{suffix}", self.config.name);
        let mut stmt =
            conn.prepare(&sql).map_err(|e| map_sqlite_error("prepare query", e))?;
        let mut rows = stmt
            .query(params_from_iter(binds))
            .map_err(|e| map_sqlite_error("run query", e))?;

        let mut raws = Vec::new();
        while let Some(row) = rows.next().map_err(|e| map_sqlite_error("read row", e))? {
            raws.push(RawRow::from_row(row).map_err(|e| map_sqlite_error("read row", e))?);
        }
        Ok(raws)
    }

    fn fetch_by_id(&self, conn: &Connection, id: EntityId) -> RepoResult<Option<RawRow>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM {} WHERE id = ?1", self.config.name);
        match conn.query_row(&sql, [id.to_string()], RawRow::from_row) {
            Ok(raw) => Ok(Some(raw)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(map_sqlite_error("fetch entity by id", e)),
        }
    }

    fn materialize(
        &self,
        conn: &Connection,
        raw: &RawRow,
        options: &ReturnOptions,
    ) -> RepoResult<Entity> {
        let mut entity = entity_from_row(raw)?;
        let full_fields = entity.fields.clone();
        options::apply_select(&mut entity, options.select.as_deref());

        if let Some(relation) = &options.include {
            let binding = self.config.relation_named(relation).ok_or_else(|| {
                RepositoryError::validation(format!(
                    "unknown relation `{relation}` for collection `{}`",
                    self.config.name
                ))
            })?;
            validate_identifier(&binding.target)?;

            let embedded = match full_fields.get(&binding.field).and_then(Value::as_str) {
                Some(reference) => {
                    let _: EntityId = reference.parse().map_err(|e| {
                        RepositoryError::validation_with_source(
                            format!("relation field `{}` is not an identifier", binding.field),
                            e,
                        )
                    })?;
                    let sql = format!(
                        "SELECT {SELECT_COLUMNS} FROM {} WHERE id = ?1",
                        binding.target
                    );
                    match conn.query_row(&sql, [reference], RawRow::from_row) {
                        Ok(related_raw) => {
                            let related = entity_from_row(&related_raw)?;
                            Some(serde_json::to_value(related).map_err(|e| {
                                RepositoryError::serialization_with_source(
                                    "failed to embed related entity",
                                    e,
                                )
                            })?)
                        },
                        Err(rusqlite::Error::QueryReturnedNoRows) => None,
                        Err(e) => return Err(map_sqlite_error("fetch related entity", e)),
                    }
                },
                None => None,
            };
            entity.fields.insert(binding.embed_as.clone(), embedded.unwrap_or(Value::Null));
        }

        Ok(entity)
    }

    fn insert_row(
        &self,
        conn: &Connection,
        parts: &options::NewEntityParts,
    ) -> RepoResult<EntityId> {
        let id = EntityId::generate();
        let now = timestamp(Utc::now());
        let fields = serde_json::to_string(&parts.fields).map_err(|e| {
            RepositoryError::serialization_with_source("failed to encode payload", e)
        })?;
        let sql = format!(
            "INSERT INTO {} (id, fields, created_at, updated_at, deleted_at, created_by, updated_by)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)",
            self.config.name
        );
        conn.execute(
            &sql,
            params![id.to_string(), fields, now, now, parts.created_by, parts.updated_by],
        )
        .map_err(|e| map_sqlite_error("insert entity", e))?;
        Ok(id)
    }
}

/// One fetched row, before JSON decoding and timestamp parsing.
struct RawRow {
    id: String,
    fields: String,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
    created_by: Option<String>,
    updated_by: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            fields: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
            deleted_at: row.get(4)?,
            created_by: row.get(5)?,
            updated_by: row.get(6)?,
        })
    }
}

fn entity_from_row(raw: &RawRow) -> RepoResult<Entity> {
    let id: EntityId = raw.id.parse().map_err(|e| {
        RepositoryError::serialization_with_source(
            format!("stored id `{}` is not a valid identifier", raw.id),
            e,
        )
    })?;
    let fields: Payload = serde_json::from_str(&raw.fields).map_err(|e| {
        RepositoryError::serialization_with_source("failed to decode stored payload", e)
    })?;
    Ok(Entity {
        id,
        fields,
        created_at: parse_timestamp(&raw.created_at)?,
        updated_at: parse_timestamp(&raw.updated_at)?,
        deleted_at: raw.deleted_at.as_deref().map(parse_timestamp).transpose()?,
        created_by: raw.created_by.clone(),
        updated_by: raw.updated_by.clone(),
    })
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(text: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            RepositoryError::serialization_with_source(
                format!("stored timestamp `{text}` is not RFC 3339"),
                e,
            )
        })
}

/// Registers a Unicode-aware `lower_unicode` SQL function.
///
/// SQLite's built-in `lower()` folds ASCII only. The document backend
/// folds text with Rust's Unicode tables, and case-insensitive matching
/// must behave identically on both backends, so the same fold is exposed
/// to SQL here. Needles are folded in Rust before binding.
fn register_unicode_lower(conn: &Connection) -> RepoResult<()> {
    conn.create_scalar_function(
        "lower_unicode",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|s| s.to_lowercase()))
        },
    )
    .map_err(|e| map_sqlite_error("register lower_unicode function", e))
}

/// Converts a JSON filter value to its SQL bind representation.
///
/// `json_extract` yields SQL integers for JSON booleans and numbers, so
/// those bind as integers/reals. Structured values cannot be compared
/// meaningfully and are rejected.
fn json_to_sql(value: &Value) -> RepoResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(SqlValue::Real(f))
            } else {
                Err(RepositoryError::validation(format!("unsupported numeric filter value {n}")))
            }
        },
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => {
            Err(RepositoryError::validation("structured values cannot be used in filters"))
        },
    }
}

#[async_trait]
impl Repository for SqliteBackend {
    async fn get_all(&self, filter: &Filter, options: &ReturnOptions) -> RepoResult<Vec<Entity>> {
        let normalized = options::sanitize_filter(filter)?;
        let conn = self.conn.lock();
        let (clause, binds) = self.where_clause(&normalized, true)?;
        let raws = self.query_rows(&conn, &format!("{clause} ORDER BY id"), binds)?;

        let mut entities = Vec::with_capacity(raws.len());
        for raw in &raws {
            entities.push(self.materialize(&conn, raw, options)?);
        }
        Ok(entities)
    }

    async fn get_one(
        &self,
        filter: &Filter,
        options: &ReturnOptions,
    ) -> RepoResult<Option<Entity>> {
        let normalized = options::sanitize_filter(filter)?;
        let conn = self.conn.lock();
        let (clause, binds) = self.where_clause(&normalized, true)?;
        let raws = self.query_rows(&conn, &format!("{clause} ORDER BY id LIMIT 1"), binds)?;

        raws.first().map(|raw| self.materialize(&conn, raw, options)).transpose()
    }

    async fn get_by_ids(
        &self,
        ids: &[EntityId],
        options: &ReturnOptions,
    ) -> RepoResult<Vec<Entity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let binds: Vec<SqlValue> =
            ids.iter().map(|id| SqlValue::Text(id.to_string())).collect();
        // No tombstone exclusion: identifier lookups see deleted rows.
        let raws = self.query_rows(
            &conn,
            &format!(" WHERE id IN ({placeholders}) ORDER BY id"),
            binds,
        )?;

        let mut entities = Vec::with_capacity(raws.len());
        for raw in &raws {
            entities.push(self.materialize(&conn, raw, options)?);
        }
        Ok(entities)
    }

    #[tracing::instrument(skip(self, payload, options), fields(collection = %self.config.name))]
    async fn create(&self, payload: Payload, options: &ReturnOptions) -> RepoResult<Entity> {
        let parts = options::split_create_payload(payload);
        let conn = self.conn.lock();
        let id = self.insert_row(&conn, &parts)?;
        let raw = self
            .fetch_by_id(&conn, id)?
            .ok_or_else(|| RepositoryError::internal("inserted row vanished"))?;
        self.materialize(&conn, &raw, options)
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
        let mut conn = self.conn.lock();

        let mut ids = Vec::with_capacity(parts.len());
        if bulk.atomic {
            // One SQL transaction makes the batch all-or-nothing; the
            // unique indexes catch intra-batch duplicates too. An early
            // return drops the transaction, which rolls it back.
            let tx = conn
                .transaction()
                .map_err(|e| map_sqlite_error("begin bulk transaction", e))?;
            for part in &parts {
                ids.push(self.insert_row(&tx, part)?);
            }
            tx.commit().map_err(|e| map_sqlite_error("commit bulk transaction", e))?;
        } else {
            // Valid prefix persists; the first failure aborts the rest.
            for part in &parts {
                ids.push(self.insert_row(&conn, part)?);
            }
        }

        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            let raw = self
                .fetch_by_id(&conn, id)?
                .ok_or_else(|| RepositoryError::internal("inserted row vanished"))?;
            entities.push(self.materialize(&conn, &raw, options)?);
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
        let conn = self.conn.lock();

        let current = self
            .fetch_by_id(&conn, id)?
            .ok_or_else(|| RepositoryError::not_found(id.to_string()))?;
        let current = entity_from_row(&current)?;

        let mut fields = current.fields;
        options::merge_fields(&mut fields, parts.fields);
        let encoded = serde_json::to_string(&fields).map_err(|e| {
            RepositoryError::serialization_with_source("failed to encode payload", e)
        })?;

        let deleted_at = match parts.tombstone {
            TombstonePatch::Keep => current.deleted_at.map(timestamp),
            TombstonePatch::Clear => None,
            TombstonePatch::Set(at) => Some(timestamp(at)),
        };
        let updated_by = parts.updated_by.or(current.updated_by);

        let sql = format!(
            "UPDATE {} SET fields = ?1, updated_at = ?2, deleted_at = ?3, updated_by = ?4
             WHERE id = ?5",
            self.config.name
        );
        conn.execute(
            &sql,
            params![encoded, timestamp(Utc::now()), deleted_at, updated_by, id.to_string()],
        )
        .map_err(|e| map_sqlite_error("update entity", e))?;

        let raw = self
            .fetch_by_id(&conn, id)?
            .ok_or_else(|| RepositoryError::internal("updated row vanished"))?;
        self.materialize(&conn, &raw, options)
    }

    #[tracing::instrument(skip(self, options), fields(collection = %self.config.name, id = %id))]
    async fn delete(&self, id: EntityId, options: &ReturnOptions) -> RepoResult<Entity> {
        let conn = self.conn.lock();

        if self.fetch_by_id(&conn, id)?.is_none() {
            return Err(RepositoryError::not_found(id.to_string()));
        }

        let now = timestamp(Utc::now());
        let sql = format!(
            "UPDATE {} SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
            self.config.name
        );
        conn.execute(&sql, params![now, id.to_string()])
            .map_err(|e| map_sqlite_error("soft-delete entity", e))?;

        let raw = self
            .fetch_by_id(&conn, id)?
            .ok_or_else(|| RepositoryError::internal("deleted row vanished"))?;
        self.materialize(&conn, &raw, options)
    }

    async fn get_paginated(
        &self,
        request: &PaginationRequest,
        options: &ReturnOptions,
    ) -> RepoResult<Page> {
        options::validate_page_request(request)?;
        let normalized = options::sanitize_filter(&request.filters)?;
        let (clause, binds) = self.where_clause(&normalized, true)?;

        // Count and data-fetch take the connection independently; the
        // contract does not promise snapshot isolation between them.
        let total: u64 = {
            let conn = self.conn.lock();
            let sql = format!("SELECT COUNT(*) FROM {}{clause}", self.config.name);
            let count: i64 = conn
                .query_row(&sql, params_from_iter(binds.clone()), |row| row.get(0))
                .map_err(|e| map_sqlite_error("count matches", e))?;
            count.unsigned_abs()
        };

        let conn = self.conn.lock();
        let mut window_binds = binds;
        window_binds.push(SqlValue::Integer(request.limit.min(i64::MAX as u64) as i64));
        window_binds.push(SqlValue::Integer(request.skip.min(i64::MAX as u64) as i64));
        let raws = self.query_rows(
            &conn,
            &format!("{clause} ORDER BY id LIMIT ? OFFSET ?"),
            window_binds,
        )?;

        let mut data = Vec::with_capacity(raws.len());
        for raw in &raws {
            data.push(self.materialize(&conn, raw, options)?);
        }
        Ok(Page { data, total })
    }

    async fn health_check(&self) -> RepoResult<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| map_sqlite_error("health check", e))
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").field("collection", &self.config.name).finish()
    }
}
