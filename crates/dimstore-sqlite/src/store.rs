//! [`SqliteStore`] is the SQLite implementation of [`DocumentStore`].

use std::{collections::BTreeMap, path::Path, sync::Arc};

use chrono::Utc;
use dimstore_core::{
  Config, DimensionConfig, Document, DocumentStore, IdParser, ListOptions, ParentRef,
  UpdateRequest,
};
use rusqlite::{Connection, types::Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawDocument, encode_ts, encode_uuid},
  query::{FilterValue, QueryBuilder},
  resolve::resolve,
  schema::SchemaBuilder,
  sql::{SqlBuilder, Statement},
};

const TABLE: &str = "documents";

type CoreError = dimstore_core::Error;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by a single SQLite database.
///
/// All operations block on the calling thread. The connection is not
/// shared, so a store must not be used from several threads at once.
pub struct SqliteStore {
  conn:    Connection,
  config:  Arc<Config>,
  ids:     IdParser,
  queries: QueryBuilder,
  schema:  SchemaBuilder,
  sql:     SqlBuilder,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring its schema up to date.
  ///
  /// The configuration is validated before the file is touched.
  pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
    config.validate()?;
    let conn = Connection::open(path.as_ref())?;
    info!(path = %path.as_ref().display(), "opened document store");
    Self::init(conn, config)
  }

  /// Open an in-memory store; used by tests.
  pub fn open_in_memory(config: Config) -> Result<Self> {
    config.validate()?;
    Self::init(Connection::open_in_memory()?, config)
  }

  fn init(conn: Connection, config: Config) -> Result<Self> {
    let config = Arc::new(config);
    let store = Self {
      conn,
      ids: IdParser::new(config.clone()),
      queries: QueryBuilder::new(config.clone()),
      schema: SchemaBuilder::new(config.clone()),
      sql: SqlBuilder::new(),
      config,
    };
    store.init_schema()?;
    Ok(store)
  }

  fn init_schema(&self) -> Result<()> {
    self.conn.pragma_update(None, "foreign_keys", true)?;
    self.conn.execute_batch(self.schema.base_schema())?;

    let existing = self.table_columns()?;
    self.schema.validate_compatibility(&existing)?;

    let names: Vec<&str> = existing.keys().map(String::as_str).collect();
    for statement in self.schema.migration_sql(&names) {
      self.apply_ddl(&statement)?;
    }

    let expected = self.schema.expected_columns();
    for column in self.table_columns()?.into_keys() {
      if !expected.contains_key(&column) {
        debug!(column = %column, "column not in configuration, ignored");
      }
    }
    Ok(())
  }

  /// Run one DDL statement. Adding a column that already exists is logged
  /// and skipped; any other failure is returned.
  pub(crate) fn apply_ddl(&self, statement: &str) -> Result<()> {
    debug!(sql = %statement, "applying schema");
    match self.conn.execute_batch(statement) {
      Err(e) if e.to_string().contains("duplicate column name") => {
        warn!(error = %e, "column already present, skipping");
        Ok(())
      }
      other => Ok(other?),
    }
  }

  /// Column name to declared type, as reported by `PRAGMA table_info`.
  fn table_columns(&self) -> Result<BTreeMap<String, String>> {
    let mut stmt = self.conn.prepare("PRAGMA table_info(documents)")?;
    let columns = stmt
      .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
      .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
    Ok(columns)
  }

  pub fn config(&self) -> &Config { &self.config }

  pub fn schema(&self) -> &SchemaBuilder { &self.schema }

  /// Release the connection.
  pub fn close(self) -> Result<()> { self.conn.close().map_err(|(_, e)| e.into()) }

  // ── Helpers ───────────────────────────────────────────────────────────────

  fn enumerated(&self, name: &str) -> Result<&DimensionConfig> {
    self
      .config
      .dimension(name)
      .filter(|d| d.is_enumerated())
      .ok_or_else(|| CoreError::UnknownDimension(name.to_owned()).into())
  }

  fn check_value(&self, dim: &DimensionConfig, value: &str) -> Result<()> {
    if dim.is_valid_value(value) {
      Ok(())
    } else {
      Err(
        CoreError::InvalidDimensionValue {
          dimension: dim.name.clone(),
          value:     value.to_owned(),
        }
        .into(),
      )
    }
  }

  /// Whether `key` names the hierarchical dimension or its ref field.
  fn is_parent_key(&self, key: &str) -> bool {
    self
      .config
      .hierarchical()
      .is_some_and(|h| h.name == key || h.ref_field.as_deref() == Some(key))
  }

  fn ref_field(&self) -> Result<&str> {
    self
      .config
      .ref_field()
      .ok_or_else(|| CoreError::UnknownDimension("parent".into()).into())
  }

  fn exists(&self, conn: &Connection, uuid: Uuid) -> Result<bool> {
    let stmt = self.sql.count(TABLE, &[("uuid", Value::Text(encode_uuid(uuid)))])?;
    Ok(count(conn, &stmt)? > 0)
  }

  /// Resolve `id` to an existing document.
  fn existing(&self, conn: &Connection, id: &str) -> Result<Uuid> {
    let uuid = resolve(conn, &self.ids, id)?;
    if !self.exists(conn, uuid)? {
      return Err(CoreError::NotFound(id.to_owned()).into());
    }
    Ok(uuid)
  }

  /// The ref-field value a parent reference stands for. An empty ID means
  /// root.
  fn parent_value(&self, conn: &Connection, parent: &ParentRef) -> Result<Option<Uuid>> {
    match parent {
      ParentRef::Root => Ok(None),
      ParentRef::Id(id) if id.trim().is_empty() => Ok(None),
      ParentRef::Id(id) => self.existing(conn, id).map(Some),
    }
  }

  /// Reject making `parent` the parent of `child`, if that would close a
  /// loop.
  fn check_reparent(&self, conn: &Connection, child: Uuid, parent: Uuid) -> Result<()> {
    if child == parent {
      return Err(CoreError::SelfParent.into());
    }
    let stmt = self.sql.ancestor_count(
      TABLE,
      self.ref_field()?,
      &encode_uuid(parent),
      &encode_uuid(child),
    )?;
    if count(conn, &stmt)? > 0 {
      return Err(CoreError::CircularReference.into());
    }
    Ok(())
  }

  /// SET pairs for the non-parent fields of `update`.
  fn update_columns(&self, update: &UpdateRequest) -> Result<Vec<(String, Value)>> {
    let mut set = Vec::new();
    if let Some(title) = &update.title {
      set.push(("title".to_owned(), Value::Text(title.clone())));
    }
    if let Some(body) = &update.body {
      set.push(("body".to_owned(), Value::Text(body.clone())));
    }
    for (name, value) in &update.dimensions {
      let dim = self.enumerated(name)?;
      self.check_value(dim, value)?;
      set.push((dim.name.clone(), Value::Text(value.clone())));
    }
    Ok(set)
  }

  /// WHERE pairs for a bulk operation. Parent keys take an ID, or an empty
  /// string for root documents.
  fn filter_columns(
    &self,
    conn: &Connection,
    filters: &BTreeMap<String, String>,
  ) -> Result<Vec<(String, Value)>> {
    if filters.is_empty() {
      return Err(CoreError::NoFilters.into());
    }

    let mut pairs = Vec::with_capacity(filters.len());
    for (key, value) in filters {
      if self.is_parent_key(key) {
        let parent = self.parent_value(conn, &ParentRef::id(value.as_str()))?;
        let value = parent.map_or(Value::Null, |p| Value::Text(encode_uuid(p)));
        pairs.push((self.ref_field()?.to_owned(), value));
        continue;
      }
      let dim = self.enumerated(key)?;
      self.check_value(dim, value)?;
      pairs.push((dim.name.clone(), Value::Text(value.clone())));
    }
    Ok(pairs)
  }

  fn run_list(&self, filters: &BTreeMap<String, FilterValue>) -> Result<Vec<Document>> {
    let (sql, args) = self.queries.list_query(filters);
    debug!(sql = %sql, args = args.len(), "listing documents");

    let mut stmt = self.conn.prepare(&sql)?;
    let raws = stmt
      .query_map(rusqlite::params_from_iter(args.iter()), |row| {
        RawDocument::from_row(row, &self.config)
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    raws.into_iter().map(|raw| raw.into_document(&self.config)).collect()
  }
}

/// Borrow `(String, Value)` pairs in the shape [`SqlBuilder`] takes.
fn pairs(owned: &[(String, Value)]) -> Vec<(&str, Value)> {
  owned.iter().map(|(c, v)| (c.as_str(), v.clone())).collect()
}

fn execute(conn: &Connection, stmt: &Statement) -> Result<usize> {
  debug!(sql = %stmt.sql, args = stmt.args.len(), "executing");
  Ok(conn.execute(&stmt.sql, stmt.params())?)
}

fn count(conn: &Connection, stmt: &Statement) -> Result<i64> {
  Ok(conn.query_row(&stmt.sql, stmt.params(), |row| row.get(0))?)
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  fn add(&self, title: &str, parent: Option<&str>) -> Result<Uuid> {
    let mut values = BTreeMap::new();
    if let Some(parent) = parent.filter(|p| !p.trim().is_empty()) {
      let hierarchical = self
        .config
        .hierarchical()
        .ok_or_else(|| CoreError::UnknownDimension("parent".into()))?;
      values.insert(hierarchical.name.clone(), parent.to_owned());
    }
    self.add_with_dimensions(title, &values)
  }

  fn add_with_dimensions(&self, title: &str, values: &BTreeMap<String, String>) -> Result<Uuid> {
    // Every key must name something.
    for key in values.keys() {
      if !self.is_parent_key(key) {
        self.enumerated(key)?;
      }
    }

    let tx = self.conn.unchecked_transaction()?;

    let uuid = Uuid::new_v4();
    let now = encode_ts(Utc::now());
    let mut row: Vec<(String, Value)> = vec![
      ("uuid".into(), Value::Text(encode_uuid(uuid))),
      ("title".into(), Value::Text(title.to_owned())),
      ("body".into(), Value::Text(String::new())),
      ("created_at".into(), Value::Integer(now)),
      ("updated_at".into(), Value::Integer(now)),
    ];

    for dim in self.config.enumerated() {
      let value = match values.get(&dim.name) {
        Some(v) => {
          self.check_value(dim, v)?;
          v.as_str()
        }
        None => dim.default_value().unwrap_or_default(),
      };
      row.push((dim.name.clone(), Value::Text(value.to_owned())));
    }

    if let Some(parent) = values.iter().find_map(|(k, v)| self.is_parent_key(k).then_some(v)) {
      let parent = self.parent_value(&tx, &ParentRef::id(parent.as_str()))?;
      row.push((
        self.ref_field()?.to_owned(),
        parent.map_or(Value::Null, |p| Value::Text(encode_uuid(p))),
      ));
    }

    execute(&tx, &self.sql.insert(TABLE, &pairs(&row))?)?;
    tx.commit()?;
    Ok(uuid)
  }

  fn update(&self, id: &str, update: UpdateRequest) -> Result<()> {
    if update.is_empty() {
      return Err(CoreError::NoFieldsToUpdate.into());
    }

    let tx = self.conn.unchecked_transaction()?;
    let uuid = resolve(&tx, &self.ids, id)?;

    let mut set = Vec::new();
    if let Some(parent) = &update.parent {
      let field = self.ref_field()?.to_owned();
      let value = match self.parent_value(&tx, parent)? {
        Some(p) => {
          self.check_reparent(&tx, uuid, p)?;
          Value::Text(encode_uuid(p))
        }
        None => Value::Null,
      };
      set.push((field, value));
    }
    set.extend(self.update_columns(&update)?);
    set.push(("updated_at".into(), Value::Integer(encode_ts(Utc::now()))));

    let stmt = self
      .sql
      .update(TABLE, &pairs(&set), &[("uuid", Value::Text(encode_uuid(uuid)))])?;
    if execute(&tx, &stmt)? == 0 {
      return Err(CoreError::NotFound(id.to_owned()).into());
    }
    tx.commit()?;
    Ok(())
  }

  fn set_status(&self, id: &str, status: &str) -> Result<()> {
    self.enumerated("status")?;
    let mut update = UpdateRequest::default();
    update.dimensions.insert("status".into(), status.to_owned());
    self.update(id, update)
  }

  fn delete(&self, id: &str, cascade: bool) -> Result<()> {
    let tx = self.conn.unchecked_transaction()?;
    let uuid = resolve(&tx, &self.ids, id)?;
    let uuid_text = encode_uuid(uuid);

    let stmt = match self.config.ref_field() {
      Some(field) if cascade => self.sql.cascade_delete(TABLE, field, &uuid_text)?,
      Some(field) => {
        let children = self.sql.count(TABLE, &[(field, Value::Text(uuid_text.clone()))])?;
        if count(&tx, &children)? > 0 {
          return Err(CoreError::HasChildren(uuid).into());
        }
        self.sql.delete(TABLE, &[("uuid", Value::Text(uuid_text))])?
      }
      None => self.sql.delete(TABLE, &[("uuid", Value::Text(uuid_text))])?,
    };

    if execute(&tx, &stmt)? == 0 {
      return Err(CoreError::NotFound(id.to_owned()).into());
    }
    tx.commit()?;
    Ok(())
  }

  fn delete_by_dimension(&self, filters: &BTreeMap<String, String>) -> Result<usize> {
    let tx = self.conn.unchecked_transaction()?;
    let conditions = self.filter_columns(&tx, filters)?;
    let deleted = execute(&tx, &self.sql.delete(TABLE, &pairs(&conditions))?)?;
    tx.commit()?;
    info!(deleted, "bulk delete");
    Ok(deleted)
  }

  fn update_by_dimension(
    &self,
    filters: &BTreeMap<String, String>,
    update: UpdateRequest,
  ) -> Result<usize> {
    if update.parent.is_some() {
      return Err(CoreError::BulkReparent.into());
    }
    if update.is_empty() {
      return Err(CoreError::NoFieldsToUpdate.into());
    }

    let tx = self.conn.unchecked_transaction()?;
    let conditions = self.filter_columns(&tx, filters)?;
    let mut set = self.update_columns(&update)?;
    set.push(("updated_at".into(), Value::Integer(encode_ts(Utc::now()))));

    let updated = execute(&tx, &self.sql.update(TABLE, &pairs(&set), &pairs(&conditions))?)?;
    tx.commit()?;
    info!(updated, "bulk update");
    Ok(updated)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  fn list(&self, options: &ListOptions) -> Result<Vec<Document>> {
    let mut filters = BTreeMap::new();

    let mut dimension_filters: BTreeMap<&str, &[String]> = BTreeMap::new();
    if !options.status.is_empty() {
      dimension_filters.insert("status", &options.status);
    }
    for (name, values) in &options.dimensions {
      dimension_filters.insert(name, values);
    }
    for (name, values) in dimension_filters {
      let filter = match values {
        [] => continue,
        [one] => FilterValue::Text(one.clone()),
        many => FilterValue::List(many.to_vec()),
      };
      filters.insert(name.to_owned(), filter);
    }

    if let Some(parent) = &options.parent {
      let parent = self.parent_value(&self.conn, parent)?;
      filters.insert("parent".to_owned(), FilterValue::Parent(parent.map(encode_uuid)));
    }

    if let Some(search) = options.search.as_deref().filter(|s| !s.is_empty()) {
      filters.insert("search".to_owned(), FilterValue::Text(search.to_owned()));
    }

    self.run_list(&filters)
  }

  fn get(&self, id: &str) -> Result<Document> {
    let uuid = resolve(&self.conn, &self.ids, id)?;
    self
      .run_list(&BTreeMap::new())?
      .into_iter()
      .find(|doc| doc.uuid == uuid)
      .ok_or_else(|| CoreError::NotFound(id.to_owned()).into())
  }

  fn resolve_uuid(&self, id: &str) -> Result<Uuid> { resolve(&self.conn, &self.ids, id) }
}
