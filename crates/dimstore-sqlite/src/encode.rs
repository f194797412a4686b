//! Conversions between domain types and their SQLite column representations.
//!
//! UUIDs are stored as hyphenated lowercase strings and timestamps as Unix
//! seconds. Rows are decoded by column name so the mapping follows whatever
//! dimension set is configured.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dimstore_core::{Config, DimensionType, DimensionValue, Document};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Timestamps ──────────────────────────────────────────────────────────────

pub fn encode_ts(dt: DateTime<Utc>) -> i64 { dt.timestamp() }

pub fn decode_ts(secs: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp(secs, 0).ok_or(Error::Timestamp(secs))
}

// ─── Documents ───────────────────────────────────────────────────────────────

/// Values read directly from one row of the listing query.
pub struct RawDocument {
  pub uuid:           String,
  pub user_facing_id: String,
  pub title:          String,
  pub body:           Option<String>,
  /// Keyed by column name; `None` for SQL NULL.
  pub columns:        BTreeMap<String, Option<String>>,
  pub created_at:     i64,
  pub updated_at:     i64,
}

impl RawDocument {
  pub fn from_row(row: &rusqlite::Row<'_>, config: &Config) -> rusqlite::Result<Self> {
    let mut columns = BTreeMap::new();
    for dim in &config.dimensions {
      let column = dim.column();
      columns.insert(column.to_owned(), row.get::<_, Option<String>>(column)?);
    }

    Ok(Self {
      uuid: row.get("uuid")?,
      user_facing_id: row.get("user_facing_id")?,
      title: row.get("title")?,
      body: row.get("body")?,
      columns,
      created_at: row.get("created_at")?,
      updated_at: row.get("updated_at")?,
    })
  }

  pub fn into_document(mut self, config: &Config) -> Result<Document> {
    let mut dimensions = BTreeMap::new();
    for dim in &config.dimensions {
      let stored = self.columns.remove(dim.column()).flatten();
      let value = match dim.kind {
        DimensionType::Enumerated => DimensionValue::Enumerated(
          stored.unwrap_or_else(|| dim.default_value().unwrap_or_default().to_owned()),
        ),
        DimensionType::Hierarchical => {
          DimensionValue::HierarchicalRef(stored.as_deref().map(decode_uuid).transpose()?)
        }
      };
      dimensions.insert(dim.name.clone(), value);
    }

    Ok(Document {
      uuid: decode_uuid(&self.uuid)?,
      user_facing_id: self.user_facing_id,
      title: self.title,
      body: self.body.unwrap_or_default(),
      dimensions,
      created_at: decode_ts(self.created_at)?,
      updated_at: decode_ts(self.updated_at)?,
    })
  }
}
