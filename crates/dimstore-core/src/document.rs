//! Documents and the request types used to read and mutate them.
//!
//! A document's short ID is never stored; [`Document::user_facing_id`] is
//! filled in by whichever query produced the document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The value a document holds for one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimensionValue {
  Enumerated(String),
  /// `None` for a root document.
  HierarchicalRef(Option<Uuid>),
}

impl DimensionValue {
  pub fn as_enumerated(&self) -> Option<&str> {
    match self {
      Self::Enumerated(v) => Some(v),
      Self::HierarchicalRef(_) => None,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
  pub uuid:           Uuid,
  /// Computed per query, e.g. `c1.2`.
  pub user_facing_id: String,
  pub title:          String,
  pub body:           String,
  /// Keyed by dimension name.
  pub dimensions:     BTreeMap<String, DimensionValue>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

impl Document {
  /// The value of an enumerated dimension.
  pub fn dimension(&self, name: &str) -> Option<&str> {
    self.dimensions.get(name).and_then(DimensionValue::as_enumerated)
  }

  /// The parent UUID, if this document has one.
  pub fn parent(&self) -> Option<Uuid> {
    self.dimensions.values().find_map(|v| match v {
      DimensionValue::HierarchicalRef(parent) => *parent,
      DimensionValue::Enumerated(_) => None,
    })
  }
}

/// A reference to a position in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
  /// No parent: a root document.
  Root,
  /// A UUID or a user-facing ID.
  Id(String),
}

impl ParentRef {
  pub fn id(id: impl Into<String>) -> Self { Self::Id(id.into()) }
}

/// Filters for [`DocumentStore::list`](crate::store::DocumentStore::list).
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
  /// Restrict to these `status` values, when a `status` dimension exists.
  pub status:     Vec<String>,
  /// `Root` lists only root documents; `Id` lists direct children.
  pub parent:     Option<ParentRef>,
  /// Substring match over title and body.
  pub search:     Option<String>,
  /// Further enumerated-dimension filters, keyed by dimension name.
  pub dimensions: BTreeMap<String, Vec<String>>,
}

/// Fields to change on a document. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
  pub title:      Option<String>,
  pub body:       Option<String>,
  pub parent:     Option<ParentRef>,
  /// Enumerated dimension name to new value.
  pub dimensions: BTreeMap<String, String>,
}

impl UpdateRequest {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.body.is_none()
      && self.parent.is_none()
      && self.dimensions.is_empty()
  }
}
