//! DDL generation for the `documents` table.
//!
//! The base table is fixed; one column per dimension is added with
//! `ALTER TABLE`, so a database created under one configuration can be
//! upgraded in place when dimensions are added later.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use dimstore_core::{Config, DimensionConfig, DimensionType};

use crate::{Error, Result};

/// Core table DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const BASE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
    uuid        TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    body        TEXT DEFAULT '',
    created_at  INTEGER NOT NULL,  -- Unix seconds
    updated_at  INTEGER NOT NULL   -- Unix seconds, bumped on every mutation
)";

/// Columns every `documents` table has, regardless of configuration.
pub const CORE_COLUMNS: [(&str, &str); 5] = [
  ("uuid", "TEXT"),
  ("title", "TEXT"),
  ("body", "TEXT"),
  ("created_at", "INTEGER"),
  ("updated_at", "INTEGER"),
];

/// Name of the title/body index.
pub const SEARCH_INDEX: &str = "idx_search_title_body";

/// Quote `s` as an SQL string literal, doubling embedded single quotes.
pub fn quote_literal(s: &str) -> String { format!("'{}'", s.replace('\'', "''")) }

/// Generates DDL from a dimension configuration.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
  config: Arc<Config>,
}

impl SchemaBuilder {
  pub fn new(config: Arc<Config>) -> Self { Self { config } }

  pub fn base_schema(&self) -> &'static str { BASE_SCHEMA }

  /// One `ALTER TABLE … ADD COLUMN` per configured dimension.
  pub fn dimension_columns(&self) -> Vec<String> {
    self.config.dimensions.iter().map(column_ddl).collect()
  }

  /// Partitioned-ordering indexes plus the title/body search index.
  pub fn indexes(&self) -> Vec<String> {
    let mut statements: Vec<String> = self
      .config
      .dimensions
      .iter()
      .map(|dim| {
        let column = dim.column();
        format!(
          "CREATE INDEX IF NOT EXISTS idx_documents_{column} ON documents({column}, created_at)"
        )
      })
      .collect();

    // Outside the `idx_documents_` namespace so no column can claim it.
    statements.push(format!("CREATE INDEX IF NOT EXISTS {SEARCH_INDEX} ON documents(title, body)"));
    statements
  }

  /// Base table, dimension columns and indexes, in execution order.
  pub fn full_schema(&self) -> Vec<String> {
    let mut statements = vec![BASE_SCHEMA.to_owned()];
    statements.extend(self.dimension_columns());
    statements.extend(self.indexes());
    statements
  }

  /// DDL bringing a table with `existing` columns up to this configuration.
  ///
  /// Columns already present are skipped; index DDL is always included since
  /// it is `IF NOT EXISTS`.
  pub fn migration_sql<S: AsRef<str>>(&self, existing: &[S]) -> Vec<String> {
    let existing: BTreeSet<&str> = existing.iter().map(AsRef::as_ref).collect();

    let mut statements: Vec<String> = self
      .config
      .dimensions
      .iter()
      .filter(|dim| !existing.contains(dim.column()))
      .map(column_ddl)
      .collect();
    statements.extend(self.indexes());
    statements
  }

  /// Fail if a dimension column already exists with a type other than TEXT.
  pub fn validate_compatibility(&self, existing: &BTreeMap<String, String>) -> Result<()> {
    for dim in &self.config.dimensions {
      let column = dim.column();
      let Some(found) = existing.get(column) else { continue };
      if !found.eq_ignore_ascii_case("TEXT") {
        return Err(Error::Schema(match dim.kind {
          DimensionType::Enumerated => format!(
            "dimension '{}' exists with incompatible type '{found}', expected TEXT",
            dim.name
          ),
          DimensionType::Hierarchical => format!(
            "hierarchical dimension '{}' field '{column}' exists with incompatible type \
             '{found}', expected TEXT",
            dim.name
          ),
        }));
      }
    }
    Ok(())
  }

  /// Every column this configuration expects, with its declared type.
  pub fn expected_columns(&self) -> BTreeMap<String, String> {
    let mut columns: BTreeMap<String, String> = CORE_COLUMNS
      .iter()
      .map(|(name, ty)| ((*name).to_owned(), (*ty).to_owned()))
      .collect();
    for dim in &self.config.dimensions {
      columns.insert(dim.column().to_owned(), "TEXT".to_owned());
    }
    columns
  }
}

fn column_ddl(dim: &DimensionConfig) -> String {
  match dim.kind {
    DimensionType::Enumerated => {
      let values = dim
        .values
        .iter()
        .map(|v| quote_literal(v))
        .collect::<Vec<_>>()
        .join(", ");
      let default = quote_literal(dim.default_value().unwrap_or_default());
      format!(
        "ALTER TABLE documents ADD COLUMN {name} TEXT DEFAULT {default} \
         CHECK ({name} IN ({values}))",
        name = dim.name,
      )
    }
    DimensionType::Hierarchical => format!(
      "ALTER TABLE documents ADD COLUMN {} TEXT REFERENCES documents(uuid) ON DELETE CASCADE",
      dim.column()
    ),
  }
}
