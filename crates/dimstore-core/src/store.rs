//! The `DocumentStore` trait.
//!
//! Implemented by storage backends (e.g. `dimstore-sqlite`). Callers such as
//! the CLI depend on this abstraction rather than on a concrete backend.
//!
//! Every `id` argument accepts either a hyphenated UUID or a user-facing ID.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::document::{Document, ListOptions, UpdateRequest};

/// Abstraction over a dimension-configured document store.
///
/// Operations are synchronous. Each mutation runs in its own transaction and
/// leaves the store untouched when it fails.
pub trait DocumentStore {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Create a document with default dimension values under `parent`.
  fn add(&self, title: &str, parent: Option<&str>) -> Result<Uuid, Self::Error>;

  /// Create a document with explicit dimension values.
  ///
  /// Keys are dimension names; the parent may be given under either the
  /// hierarchical dimension's name or its ref field.
  fn add_with_dimensions(
    &self,
    title: &str,
    values: &BTreeMap<String, String>,
  ) -> Result<Uuid, Self::Error>;

  fn update(&self, id: &str, update: UpdateRequest) -> Result<(), Self::Error>;

  /// Shorthand for updating the `status` dimension.
  fn set_status(&self, id: &str, status: &str) -> Result<(), Self::Error>;

  /// Delete a document. Without `cascade`, fails if it has children.
  fn delete(&self, id: &str, cascade: bool) -> Result<(), Self::Error>;

  /// Delete every document matching all `filters`; returns the count.
  fn delete_by_dimension(
    &self,
    filters: &BTreeMap<String, String>,
  ) -> Result<usize, Self::Error>;

  /// Apply `update` to every document matching all `filters`; returns the
  /// count.
  fn update_by_dimension(
    &self,
    filters: &BTreeMap<String, String>,
    update: UpdateRequest,
  ) -> Result<usize, Self::Error>;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn list(&self, options: &ListOptions) -> Result<Vec<Document>, Self::Error>;

  fn get(&self, id: &str) -> Result<Document, Self::Error>;

  /// Map a user-facing ID (or a UUID, returned unchanged) to a UUID.
  fn resolve_uuid(&self, id: &str) -> Result<Uuid, Self::Error>;
}
