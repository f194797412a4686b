//! Parameterised statement construction for single-table writes and counts.
//!
//! Table and column names are interpolated and therefore must be plain
//! identifiers; anything else is refused. Values always travel as
//! positional arguments.

use dimstore_core::config::is_identifier;
use rusqlite::types::Value;

use crate::{Error, Result};

/// An SQL string with its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
  pub sql:  String,
  pub args: Vec<Value>,
}

impl Statement {
  pub fn params(&self) -> rusqlite::ParamsFromIter<std::slice::Iter<'_, Value>> {
    rusqlite::params_from_iter(self.args.iter())
  }
}

/// Builds INSERT / UPDATE / DELETE / COUNT statements. Holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlBuilder;

impl SqlBuilder {
  pub fn new() -> Self { Self }

  /// `INSERT INTO table (a, b) VALUES (?, ?)`.
  pub fn insert(&self, table: &str, values: &[(&str, Value)]) -> Result<Statement> {
    check_identifier(table)?;
    if values.is_empty() {
      return Err(Error::SqlBuild("insert needs at least one column".into()));
    }
    let columns = columns(values)?;
    let placeholders = vec!["?"; values.len()].join(", ");

    Ok(Statement {
      sql:  format!("INSERT INTO {table} ({}) VALUES ({placeholders})", columns.join(", ")),
      args: values.iter().map(|(_, v)| v.clone()).collect(),
    })
  }

  /// `UPDATE table SET a = ?, b = ? WHERE c = ? AND d IS NULL`.
  ///
  /// A `Null` filter value becomes `IS NULL`. At least one filter is
  /// required.
  pub fn update(
    &self,
    table: &str,
    set: &[(&str, Value)],
    filters: &[(&str, Value)],
  ) -> Result<Statement> {
    check_identifier(table)?;
    if set.is_empty() {
      return Err(Error::SqlBuild("update needs at least one column to set".into()));
    }
    if filters.is_empty() {
      return Err(Error::SqlBuild("update without a WHERE clause".into()));
    }

    let assignments: Vec<String> = columns(set)?
      .into_iter()
      .map(|c| format!("{c} = ?"))
      .collect();
    let mut args: Vec<Value> = set.iter().map(|(_, v)| v.clone()).collect();
    let (conditions, filter_args) = conditions(filters)?;
    args.extend(filter_args);

    Ok(Statement {
      sql: format!("UPDATE {table} SET {} WHERE {conditions}", assignments.join(", ")),
      args,
    })
  }

  /// `DELETE FROM table WHERE …`. At least one filter is required.
  pub fn delete(&self, table: &str, filters: &[(&str, Value)]) -> Result<Statement> {
    check_identifier(table)?;
    if filters.is_empty() {
      return Err(Error::SqlBuild("delete without a WHERE clause".into()));
    }
    let (conditions, args) = conditions(filters)?;
    Ok(Statement { sql: format!("DELETE FROM {table} WHERE {conditions}"), args })
  }

  /// `SELECT COUNT(*) FROM table [WHERE …]`.
  pub fn count(&self, table: &str, filters: &[(&str, Value)]) -> Result<Statement> {
    check_identifier(table)?;
    if filters.is_empty() {
      return Ok(Statement { sql: format!("SELECT COUNT(*) FROM {table}"), args: Vec::new() });
    }
    let (conditions, args) = conditions(filters)?;
    Ok(Statement { sql: format!("SELECT COUNT(*) FROM {table} WHERE {conditions}"), args })
  }

  /// Delete the row `root` and every row reachable through `ref_field`.
  pub fn cascade_delete(&self, table: &str, ref_field: &str, root: &str) -> Result<Statement> {
    check_identifier(table)?;
    check_identifier(ref_field)?;
    Ok(Statement {
      sql:  format!(
        "WITH RECURSIVE descendants(uuid) AS (
    SELECT uuid FROM {table} WHERE uuid = ?
    UNION ALL
    SELECT d.uuid FROM {table} d INNER JOIN descendants de ON d.{ref_field} = de.uuid
)
DELETE FROM {table} WHERE uuid IN (SELECT uuid FROM descendants)"
      ),
      args: vec![Value::Text(root.to_owned())],
    })
  }

  /// Count how often `target` appears on the ancestor chain of `start`,
  /// `start` itself included. Non-zero means `target` is `start` or one of
  /// its ancestors.
  pub fn ancestor_count(
    &self,
    table: &str,
    ref_field: &str,
    start: &str,
    target: &str,
  ) -> Result<Statement> {
    check_identifier(table)?;
    check_identifier(ref_field)?;
    Ok(Statement {
      sql:  format!(
        "WITH RECURSIVE ancestors(uuid) AS (
    SELECT ?1
    UNION
    SELECT d.{ref_field} FROM {table} d
    INNER JOIN ancestors a ON d.uuid = a.uuid
    WHERE d.{ref_field} IS NOT NULL
)
SELECT COUNT(*) FROM ancestors WHERE uuid = ?2"
      ),
      args: vec![Value::Text(start.to_owned()), Value::Text(target.to_owned())],
    })
  }
}

fn check_identifier(name: &str) -> Result<()> {
  if is_identifier(name) {
    Ok(())
  } else {
    Err(Error::SqlBuild(format!("{name:?} is not a valid identifier")))
  }
}

fn columns<'a>(pairs: &[(&'a str, Value)]) -> Result<Vec<&'a str>> {
  let mut seen = Vec::with_capacity(pairs.len());
  for (column, _) in pairs {
    check_identifier(column)?;
    if seen.contains(column) {
      return Err(Error::SqlBuild(format!("column {column} given twice")));
    }
    seen.push(*column);
  }
  Ok(seen)
}

fn conditions(filters: &[(&str, Value)]) -> Result<(String, Vec<Value>)> {
  let mut clauses = Vec::with_capacity(filters.len());
  let mut args = Vec::new();
  for (column, value) in filters {
    check_identifier(column)?;
    match value {
      Value::Null => clauses.push(format!("{column} IS NULL")),
      v => {
        clauses.push(format!("{column} = ?"));
        args.push(v.clone());
      }
    }
  }
  Ok((clauses.join(" AND "), args))
}
