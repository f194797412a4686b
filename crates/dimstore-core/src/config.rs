//! Dimension configuration: the runtime schema of a document store.
//!
//! A [`Config`] is plain data supplied by the caller. Nothing in it is
//! interpreted until [`Config::validate`] accepts it; every other component
//! assumes a validated configuration.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hard upper bound on the number of configured dimensions.
pub const MAX_DIMENSIONS: usize = 7;

/// Column names owned by the store itself; no dimension may claim them.
///
/// Besides the table's own columns this covers the names the listing query
/// projects (`seq`, `depth`, `local_id`) and SQLite's rowid aliases, which a
/// real column of the same name would shadow.
pub const RESERVED_COLUMNS: [&str; 12] = [
  "uuid",
  "title",
  "body",
  "created_at",
  "updated_at",
  "user_facing_id",
  "seq",
  "depth",
  "local_id",
  "rowid",
  "oid",
  "_rowid_",
];

// ─── Types ───────────────────────────────────────────────────────────────────

/// How a dimension partitions documents.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DimensionType {
  /// A fixed set of values, e.g. `status ∈ {pending, completed}`.
  Enumerated,
  /// A parent/child relation stored in a self-referencing column.
  Hierarchical,
}

/// One axis of document classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionConfig {
  pub name:          String,
  #[serde(rename = "type")]
  pub kind:          DimensionType,
  /// Valid values, in declaration order. Enumerated only.
  #[serde(default)]
  pub values:        Vec<String>,
  /// Partial map from value to a single lowercase letter. Enumerated only.
  #[serde(default)]
  pub prefixes:      BTreeMap<String, String>,
  /// Defaults to the first entry of `values` when unset. Enumerated only.
  #[serde(default)]
  pub default_value: Option<String>,
  /// Foreign-key column holding the parent UUID. Hierarchical only.
  #[serde(default)]
  pub ref_field:     Option<String>,
}

impl DimensionConfig {
  pub fn enumerated<I, S>(name: impl Into<String>, values: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      name:          name.into(),
      kind:          DimensionType::Enumerated,
      values:        values.into_iter().map(Into::into).collect(),
      prefixes:      BTreeMap::new(),
      default_value: None,
      ref_field:     None,
    }
  }

  pub fn hierarchical(name: impl Into<String>, ref_field: impl Into<String>) -> Self {
    Self {
      name:          name.into(),
      kind:          DimensionType::Hierarchical,
      values:        Vec::new(),
      prefixes:      BTreeMap::new(),
      default_value: None,
      ref_field:     Some(ref_field.into()),
    }
  }

  pub fn with_prefix(mut self, value: impl Into<String>, prefix: char) -> Self {
    self.prefixes.insert(value.into(), prefix.to_string());
    self
  }

  pub fn with_default(mut self, value: impl Into<String>) -> Self {
    self.default_value = Some(value.into());
    self
  }

  pub fn is_enumerated(&self) -> bool { self.kind == DimensionType::Enumerated }

  pub fn is_hierarchical(&self) -> bool { self.kind == DimensionType::Hierarchical }

  /// The effective default: the explicit one, else the first declared value.
  pub fn default_value(&self) -> Option<&str> {
    self
      .default_value
      .as_deref()
      .filter(|v| !v.is_empty())
      .or_else(|| self.values.first().map(String::as_str))
  }

  /// The prefix letter for `value`, if one is configured.
  pub fn prefix_for(&self, value: &str) -> Option<char> {
    self
      .prefixes
      .get(value)
      .and_then(|p| single_letter(p))
  }

  pub fn is_valid_value(&self, value: &str) -> bool {
    !self.is_enumerated() || self.values.iter().any(|v| v == value)
  }

  /// The database column backing this dimension.
  pub fn column(&self) -> &str {
    match self.kind {
      DimensionType::Enumerated => &self.name,
      DimensionType::Hierarchical => self.ref_field.as_deref().unwrap_or(&self.name),
    }
  }
}

/// The full runtime configuration of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub dimensions: Vec<DimensionConfig>,
}

impl Config {
  pub fn new(dimensions: Vec<DimensionConfig>) -> Self { Self { dimensions } }

  pub fn enumerated(&self) -> impl Iterator<Item = &DimensionConfig> {
    self.dimensions.iter().filter(|d| d.is_enumerated())
  }

  /// The hierarchical dimension, if one is configured.
  pub fn hierarchical(&self) -> Option<&DimensionConfig> {
    self.dimensions.iter().find(|d| d.is_hierarchical())
  }

  /// The hierarchical ref-field column, if a hierarchical dimension exists.
  pub fn ref_field(&self) -> Option<&str> {
    self.hierarchical().and_then(|d| d.ref_field.as_deref())
  }

  pub fn dimension(&self, name: &str) -> Option<&DimensionConfig> {
    self.dimensions.iter().find(|d| d.name == name)
  }

  /// Check every structural invariant of the configuration.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.dimensions.is_empty() {
      return Err(ConfigError::NoDimensions);
    }
    if self.dimensions.len() > MAX_DIMENSIONS {
      return Err(ConfigError::TooManyDimensions {
        count: self.dimensions.len(),
        max:   MAX_DIMENSIONS,
      });
    }

    let mut names = BTreeSet::new();
    let mut hierarchical = 0;

    for dim in &self.dimensions {
      if dim.name.is_empty() {
        return Err(ConfigError::EmptyName);
      }
      if is_reserved(&dim.name) {
        return Err(ConfigError::ReservedName(dim.name.clone()));
      }
      if !is_identifier(&dim.name) {
        return Err(ConfigError::InvalidName(dim.name.clone()));
      }
      if !names.insert(dim.name.as_str()) {
        return Err(ConfigError::DuplicateName(dim.name.clone()));
      }

      match dim.kind {
        DimensionType::Enumerated => validate_enumerated(dim)?,
        DimensionType::Hierarchical => {
          hierarchical += 1;
          if hierarchical > 1 {
            return Err(ConfigError::MultipleHierarchical);
          }
          match dim.ref_field.as_deref() {
            None | Some("") => return Err(ConfigError::MissingRefField(dim.name.clone())),
            Some(field) if !is_identifier(field) => {
              return Err(ConfigError::InvalidName(field.to_owned()));
            }
            Some(_) => {}
          }
        }
      }
    }

    // Ref fields are checked against the complete name set, including
    // dimensions declared after the hierarchical one.
    if let Some(field) = self.ref_field()
      && (names.contains(field) || is_reserved(field))
    {
      return Err(ConfigError::RefFieldConflict(field.to_owned()));
    }

    if let Some((prefix, usages)) = prefix_conflicts(self).into_iter().next() {
      return Err(ConfigError::PrefixConflict { prefix, usages });
    }

    Ok(())
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn validate_enumerated(dim: &DimensionConfig) -> Result<(), ConfigError> {
  if dim.values.is_empty() {
    return Err(ConfigError::NoValues(dim.name.clone()));
  }

  let mut seen = BTreeSet::new();
  for value in &dim.values {
    if !seen.insert(value.as_str()) {
      return Err(ConfigError::DuplicateValue {
        dimension: dim.name.clone(),
        value:     value.clone(),
      });
    }
  }

  for (value, prefix) in &dim.prefixes {
    if single_letter(prefix).is_none() {
      return Err(ConfigError::InvalidPrefix {
        dimension: dim.name.clone(),
        value:     value.clone(),
        prefix:    prefix.clone(),
      });
    }
    if !seen.contains(value.as_str()) {
      return Err(ConfigError::PrefixForUnknownValue {
        dimension: dim.name.clone(),
        value:     value.clone(),
      });
    }
  }

  if let Some(default) = dim.default_value.as_deref().filter(|d| !d.is_empty())
    && !seen.contains(default)
  {
    return Err(ConfigError::DefaultNotInValues {
      dimension: dim.name.clone(),
      value:     default.to_owned(),
    });
  }

  Ok(())
}

/// Every prefix letter claimed by more than one `dimension.value` pair,
/// together with all of its claimants, ordered by letter.
pub fn prefix_conflicts(config: &Config) -> Vec<(char, Vec<String>)> {
  let mut usage: BTreeMap<char, Vec<String>> = BTreeMap::new();
  for dim in config.enumerated() {
    for (value, prefix) in &dim.prefixes {
      if let Some(letter) = single_letter(prefix) {
        usage
          .entry(letter)
          .or_default()
          .push(format!("{}.{}", dim.name, value));
      }
    }
  }
  usage.into_iter().filter(|(_, u)| u.len() > 1).collect()
}

fn single_letter(s: &str) -> Option<char> {
  let mut chars = s.chars();
  match (chars.next(), chars.next()) {
    (Some(c), None) if c.is_ascii_lowercase() => Some(c),
    _ => None,
  }
}

/// Whether `s` can be interpolated into SQL as a bare column name.
/// SQLite identifiers ignore ASCII case, so reservations do too.
pub fn is_reserved(name: &str) -> bool {
  RESERVED_COLUMNS.iter().any(|r| r.eq_ignore_ascii_case(name))
}

pub fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
