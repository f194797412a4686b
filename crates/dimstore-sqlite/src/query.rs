//! Listing SQL with on-the-fly user-facing IDs.
//!
//! The generated statement has up to three CTEs:
//!
//! - `root_docs` numbers documents without a parent within their
//!   enumerated-dimension partition;
//! - `child_docs` does the same for children, additionally partitioned by
//!   parent, producing a `local_id`;
//! - `id_tree` walks parent → child recursively, concatenating
//!   `parent.user_facing_id || '.' || local_id`.
//!
//! Filters are applied after the tree is built, so filtering never changes
//! the IDs documents are shown with.

use std::{collections::BTreeMap, sync::Arc};

use dimstore_core::{Config, DimensionConfig};
use rusqlite::types::Value;

use crate::schema::quote_literal;

/// Row order within every partition. `rowid` breaks ties between documents
/// created in the same second.
pub(crate) const RANK_ORDER: &str = "created_at, rowid";

/// A filter value for [`QueryBuilder::list_query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
  Text(String),
  List(Vec<String>),
  /// `None` matches root documents.
  Parent(Option<String>),
}

/// Generates listing SQL for one configuration.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
  config: Arc<Config>,
}

impl QueryBuilder {
  pub fn new(config: Arc<Config>) -> Self { Self { config } }

  /// Build the listing statement and its positional arguments.
  ///
  /// Recognised filter keys are `"search"`, `"parent"` and the name of any
  /// enumerated dimension. Other keys, and values of the wrong shape, are
  /// ignored.
  pub fn list_query(&self, filters: &BTreeMap<String, FilterValue>) -> (String, Vec<Value>) {
    let enum_dims: Vec<&DimensionConfig> = self.config.enumerated().collect();
    let ref_field = self.config.ref_field();

    let mut sql = String::from("WITH RECURSIVE root_docs AS (\n");
    sql.push_str(&self.root_query(&enum_dims, ref_field));
    sql.push_str("\n),\n");

    match ref_field {
      Some(field) => {
        sql.push_str("child_docs AS (\n");
        sql.push_str(&self.child_query(&enum_dims, field));
        sql.push_str("\n),\nid_tree AS (\n");
        sql.push_str(&tree_query(&enum_dims, field));
        sql.push_str("\n)\n");
      }
      None => sql.push_str("id_tree AS (\n    SELECT * FROM root_docs\n)\n"),
    }

    sql.push_str("SELECT uuid, user_facing_id, title, body, ");
    for dim in &enum_dims {
      sql.push_str(&dim.name);
      sql.push_str(", ");
    }
    if let Some(field) = ref_field {
      sql.push_str(field);
      sql.push_str(", ");
    }
    sql.push_str("created_at, updated_at\nFROM id_tree\n");

    let (clauses, args) = self.where_clauses(filters);
    if !clauses.is_empty() {
      sql.push_str("WHERE ");
      sql.push_str(&clauses.join(" AND "));
      sql.push('\n');
    }

    sql.push_str(if ref_field.is_some() {
      "ORDER BY depth, created_at, seq"
    } else {
      "ORDER BY created_at, seq"
    });

    (sql, args)
  }

  fn root_query(&self, enum_dims: &[&DimensionConfig], ref_field: Option<&str>) -> String {
    let mut q =
      String::from("    SELECT\n        uuid, title, body, created_at, updated_at, rowid AS seq,\n");
    for dim in enum_dims {
      q.push_str(&format!("        {},\n", dim.name));
    }
    q.push_str(&format!(
      "        {} AS user_facing_id\n    FROM documents",
      id_expression(enum_dims, None)
    ));
    if let Some(field) = ref_field {
      q.push_str(&format!("\n    WHERE {field} IS NULL"));
    }
    q
  }

  fn child_query(&self, enum_dims: &[&DimensionConfig], ref_field: &str) -> String {
    let mut q = format!(
      "    SELECT\n        uuid, title, body, created_at, updated_at, rowid AS seq,\n        \
       {ref_field},\n"
    );
    for dim in enum_dims {
      q.push_str(&format!("        {},\n", dim.name));
    }
    q.push_str(&format!(
      "        {} AS local_id\n    FROM documents\n    WHERE {ref_field} IS NOT NULL",
      id_expression(enum_dims, Some(ref_field))
    ));
    q
  }

  fn where_clauses(&self, filters: &BTreeMap<String, FilterValue>) -> (Vec<String>, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();

    for (key, value) in filters {
      match (key.as_str(), value) {
        ("search", FilterValue::Text(term)) if !term.is_empty() => {
          clauses.push("(title LIKE ? OR body LIKE ?)".to_owned());
          let pattern = format!("%{term}%");
          args.push(Value::Text(pattern.clone()));
          args.push(Value::Text(pattern));
        }
        ("parent", FilterValue::Parent(parent)) => {
          let Some(field) = self.config.ref_field() else { continue };
          match parent {
            None => clauses.push(format!("{field} IS NULL")),
            Some(id) => {
              clauses.push(format!("{field} = ?"));
              args.push(Value::Text(id.clone()));
            }
          }
        }
        (name, value) => {
          let Some(dim) = self.config.dimension(name).filter(|d| d.is_enumerated()) else {
            continue;
          };
          match value {
            FilterValue::Text(v) => {
              clauses.push(format!("{} = ?", dim.name));
              args.push(Value::Text(v.clone()));
            }
            FilterValue::List(vs) if !vs.is_empty() => {
              let placeholders = vec!["?"; vs.len()].join(",");
              clauses.push(format!("{} IN ({placeholders})", dim.name));
              args.extend(vs.iter().cloned().map(Value::Text));
            }
            _ => {}
          }
        }
      }
    }

    (clauses, args)
  }
}

/// The recursive half of the listing: roots at depth 0, then children.
fn tree_query(enum_dims: &[&DimensionConfig], ref_field: &str) -> String {
  let mut q = String::from("    SELECT\n        uuid, title, body, created_at, updated_at, seq,\n");
  for dim in enum_dims {
    q.push_str(&format!("        {},\n", dim.name));
  }
  q.push_str(&format!(
    "        NULL AS {ref_field},\n        0 AS depth,\n        user_facing_id\n    FROM root_docs\n"
  ));
  q.push_str("    UNION ALL\n");
  q.push_str("    SELECT\n        c.uuid, c.title, c.body, c.created_at, c.updated_at, c.seq,\n");
  for dim in enum_dims {
    q.push_str(&format!("        c.{},\n", dim.name));
  }
  q.push_str(&format!(
    "        c.{ref_field},\n        p.depth + 1,\n        p.user_facing_id || '.' || c.local_id\n    \
     FROM child_docs c\n    INNER JOIN id_tree p ON c.{ref_field} = p.uuid"
  ));
  q
}

/// The `CASE` expression computing one ID segment.
///
/// One branch per prefixed `(dimension, value)` pair, then one unprefixed
/// branch per dimension default. Only the first matching branch contributes
/// a prefix, so a row carrying several non-default values shows just one
/// letter; combinations across dimensions are not generated.
fn id_expression(enum_dims: &[&DimensionConfig], ref_field: Option<&str>) -> String {
  if enum_dims.is_empty() {
    let partition = ref_field
      .map(|f| format!("PARTITION BY {f} "))
      .unwrap_or_default();
    return format!("CAST(ROW_NUMBER() OVER ({partition}ORDER BY {RANK_ORDER}) AS TEXT)");
  }

  let mut partition: Vec<&str> = enum_dims.iter().map(|d| d.name.as_str()).collect();
  partition.extend(ref_field);
  let row_number = format!(
    "CAST(ROW_NUMBER() OVER (PARTITION BY {} ORDER BY {RANK_ORDER}) AS TEXT)",
    partition.join(", ")
  );

  let mut branches: Vec<(&str, &str, String)> = Vec::new();
  for dim in enum_dims {
    for value in &dim.values {
      if let Some(prefix) = dim.prefix_for(value) {
        branches.push((dim.name.as_str(), value.as_str(), prefix.to_string()));
      }
    }
  }
  for dim in enum_dims {
    if let Some(default) = dim.default_value()
      && dim.prefix_for(default).is_none()
    {
      branches.push((dim.name.as_str(), default, String::new()));
    }
  }

  let mut expr = String::from("CASE\n");
  for (name, value, prefix) in branches {
    expr.push_str(&format!(
      "            WHEN {name} = {} THEN {} || {row_number}\n",
      quote_literal(value),
      quote_literal(&prefix)
    ));
  }
  expr.push_str(&format!(
    "            ELSE CAST(ROW_NUMBER() OVER (ORDER BY {RANK_ORDER}) AS TEXT)\n        END"
  ));
  expr
}
