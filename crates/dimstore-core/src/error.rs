//! Error types for `dimstore-core`.

use thiserror::Error;
use uuid::Uuid;

/// A configuration rejected before any database work happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("at least one dimension must be configured")]
  NoDimensions,

  #[error("too many dimensions: {count} (maximum {max})")]
  TooManyDimensions { count: usize, max: usize },

  #[error("dimension name cannot be empty")]
  EmptyName,

  #[error("dimension name {0:?} is not a valid column identifier")]
  InvalidName(String),

  #[error("duplicate dimension name: {0}")]
  DuplicateName(String),

  #[error("dimension name {0:?} is reserved")]
  ReservedName(String),

  #[error("enumerated dimension {0:?} must have at least one value")]
  NoValues(String),

  #[error("enumerated dimension {dimension:?} lists value {value:?} more than once")]
  DuplicateValue { dimension: String, value: String },

  #[error("prefix for {dimension}.{value} must be a single lowercase letter, got {prefix:?}")]
  InvalidPrefix {
    dimension: String,
    value:     String,
    prefix:    String,
  },

  #[error("prefix declared for {dimension}.{value}, which is not one of its values")]
  PrefixForUnknownValue { dimension: String, value: String },

  /// Every `dimension.value` pair claiming the letter is listed in `usages`.
  #[error("prefix '{prefix}' is used by multiple dimension values: {}", usages.join(", "))]
  PrefixConflict { prefix: char, usages: Vec<String> },

  #[error("default value {value:?} not in values list for dimension {dimension:?}")]
  DefaultNotInValues { dimension: String, value: String },

  #[error("only one hierarchical dimension is allowed")]
  MultipleHierarchical,

  #[error("hierarchical dimension {0:?} must specify a ref field")]
  MissingRefField(String),

  #[error("ref field {0:?} conflicts with a dimension or core column name")]
  RefFieldConflict(String),
}

/// A compact ID that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
  #[error("ID contains illegal characters")]
  IllegalCharacters,

  #[error("empty ID segment at level {0}")]
  EmptySegment(usize),

  #[error("missing number in ID segment {0:?}")]
  MissingNumber(String),

  #[error("invalid number in ID segment {0:?}")]
  InvalidNumber(String),

  #[error("ID number must be positive in segment {0:?}")]
  NonPositive(String),

  #[error("unknown prefix '{0}'")]
  UnknownPrefix(char),

  #[error("duplicate dimension filter for {0}")]
  DuplicateDimension(String),
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid configuration: {0}")]
  Config(#[from] ConfigError),

  #[error("invalid ID: {0}")]
  InvalidId(#[from] IdError),

  #[error("invalid value {value:?} for dimension {dimension:?}")]
  InvalidDimensionValue { dimension: String, value: String },

  #[error("unknown dimension {0:?}")]
  UnknownDimension(String),

  #[error("document not found: {0}")]
  NotFound(String),

  #[error("cannot set document as its own parent")]
  SelfParent,

  #[error("cannot set parent: would create circular reference")]
  CircularReference,

  #[error("cannot delete document {0} with children unless cascade is set")]
  HasChildren(Uuid),

  #[error("no fields to update")]
  NoFieldsToUpdate,

  #[error("no filters provided")]
  NoFilters,

  /// Cycle checks are per document, so bulk updates cannot move documents.
  #[error("parent cannot be changed by a bulk update")]
  BulkReparent,
}

impl Error {
  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
