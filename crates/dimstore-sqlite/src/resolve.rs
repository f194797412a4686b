//! Mapping user-facing IDs back to UUIDs.
//!
//! Resolution issues its own targeted SQL instead of running the listing
//! query: each level selects the row at the requested rank inside exactly
//! one partition. Shallow IDs are resolved in a single round trip by
//! chaining one CTE per level; deeper ones walk the tree a level at a time.

use dimstore_core::{IdParser, ParsedLevel, id::is_uuid_format};
use rusqlite::{Connection, OptionalExtension as _, types::Value};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{decode_uuid, encode_uuid},
  query::RANK_ORDER,
};

/// Deepest ID resolved with a single statement.
const MAX_CHAINED_DEPTH: usize = 3;

/// How a level's candidates are tied to their parent.
enum Parent<'a> {
  Root,
  Uuid(Uuid),
  /// The single row of a previously declared CTE.
  Cte(&'a str),
}

pub(crate) fn resolve(conn: &Connection, ids: &IdParser, id: &str) -> Result<Uuid> {
  let id = id.trim();
  if is_uuid_format(id) {
    return decode_uuid(id);
  }

  let normalized = ids.normalize_id(id)?;
  let parsed = ids.parse_id(&normalized)?;
  let not_found = || dimstore_core::Error::NotFound(id.to_owned());

  if parsed.levels.len() > 1 && ids.config().ref_field().is_none() {
    return Err(not_found().into());
  }

  let found = if parsed.levels.len() <= MAX_CHAINED_DEPTH {
    resolve_chained(conn, ids, &parsed.levels)?
  } else {
    resolve_stepwise(conn, ids, &parsed.levels)?
  };

  found.ok_or_else(|| not_found().into())
}

fn resolve_chained(
  conn: &Connection,
  ids: &IdParser,
  levels: &[ParsedLevel],
) -> Result<Option<Uuid>> {
  let mut args = Vec::new();
  let mut ctes = Vec::with_capacity(levels.len());

  for (i, level) in levels.iter().enumerate() {
    let previous = format!("level{i}");
    let parent = if i == 0 { Parent::Root } else { Parent::Cte(&previous) };
    ctes.push(format!(
      "level{} AS (\n    {}\n)",
      i + 1,
      level_select(ids, level, parent, &mut args)
    ));
  }

  let sql = format!("WITH {}\nSELECT uuid FROM level{}", ctes.join(",\n"), levels.len());
  query_uuid(conn, &sql, &args)
}

fn resolve_stepwise(
  conn: &Connection,
  ids: &IdParser,
  levels: &[ParsedLevel],
) -> Result<Option<Uuid>> {
  let mut current: Option<Uuid> = None;

  for level in levels {
    let parent = match current {
      None => Parent::Root,
      Some(uuid) => Parent::Uuid(uuid),
    };
    let mut args = Vec::new();
    let sql = level_select(ids, level, parent, &mut args);
    match query_uuid(conn, &sql, &args)? {
      Some(uuid) => current = Some(uuid),
      None => return Ok(None),
    }
  }

  Ok(current)
}

/// `SELECT uuid` of the document at `level.offset` within one partition.
fn level_select(
  ids: &IdParser,
  level: &ParsedLevel,
  parent: Parent<'_>,
  args: &mut Vec<Value>,
) -> String {
  let config = ids.config();
  let ref_field = config.ref_field();

  let mut partition: Vec<&str> = config.enumerated().map(|d| d.name.as_str()).collect();
  let mut conditions = Vec::new();

  for (name, value) in &level.dimension_filters {
    conditions.push(format!("{name} = ?"));
    args.push(Value::Text(value.clone()));
  }

  if let Some(field) = ref_field {
    match parent {
      Parent::Root => conditions.push(format!("{field} IS NULL")),
      Parent::Uuid(uuid) => {
        partition.push(field);
        conditions.push(format!("{field} = ?"));
        args.push(Value::Text(encode_uuid(uuid)));
      }
      Parent::Cte(name) => {
        partition.push(field);
        conditions.push(format!("{field} = (SELECT uuid FROM {name})"));
      }
    }
  }

  let partition = if partition.is_empty() {
    String::new()
  } else {
    format!("PARTITION BY {} ", partition.join(", "))
  };
  let filter = if conditions.is_empty() {
    String::new()
  } else {
    format!(" WHERE {}", conditions.join(" AND "))
  };

  // 1-based rank; offsets are bounded by row counts, far below i64::MAX.
  args.push(Value::Integer(level.offset as i64 + 1));

  format!(
    "SELECT uuid FROM (SELECT uuid, ROW_NUMBER() OVER ({partition}ORDER BY {RANK_ORDER}) AS \
     row_num FROM documents{filter}) WHERE row_num = ?"
  )
}

fn query_uuid(conn: &Connection, sql: &str, args: &[Value]) -> Result<Option<Uuid>> {
  debug!(sql, args = args.len(), "resolving user-facing id");
  let found: Option<String> = conn
    .query_row(sql, rusqlite::params_from_iter(args.iter()), |row| row.get(0))
    .optional()?;
  found.as_deref().map(decode_uuid).transpose()
}
