//! Compact, human-readable document IDs.
//!
//! An ID is one or more dot-separated segments, each a run of lowercase
//! prefix letters followed by a 1-based rank: `1`, `c2`, `1.3`, `hc1.2`.
//! Each letter stands for one `(dimension, value)` pair; dimensions without a
//! letter take their default value. Letters are always emitted ordered by
//! dimension name, which makes that ordering the canonical form.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
  config::{Config, prefix_conflicts},
  error::{ConfigError, IdError},
};

/// Characters rejected outright in any user-supplied ID.
const ILLEGAL_CHARS: [char; 5] = ['\'', '"', '`', ';', '\\'];

// ─── Parsed form ─────────────────────────────────────────────────────────────

/// A decoded ID, one [`ParsedLevel`] per hierarchy segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedId {
  pub levels: Vec<ParsedLevel>,
}

/// One decoded segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLevel {
  /// Dimension name to value, including defaults for every enumerated
  /// dimension not named by a prefix.
  pub dimension_filters: BTreeMap<String, String>,
  /// 0-based rank within the segment's partition.
  pub offset:            usize,
}

#[derive(Debug, Clone)]
struct PrefixMapping {
  dimension: String,
  value:     String,
}

// ─── Parser ──────────────────────────────────────────────────────────────────

/// Encodes and decodes compact IDs for one configuration.
#[derive(Debug, Clone)]
pub struct IdParser {
  config:   Arc<Config>,
  prefixes: BTreeMap<char, PrefixMapping>,
}

impl IdParser {
  pub fn new(config: Arc<Config>) -> Self {
    let mut prefixes = BTreeMap::new();
    for dim in config.enumerated() {
      for value in &dim.values {
        if let Some(letter) = dim.prefix_for(value) {
          prefixes.insert(letter, PrefixMapping {
            dimension: dim.name.clone(),
            value:     value.clone(),
          });
        }
      }
    }
    Self { config, prefixes }
  }

  pub fn config(&self) -> &Config { &self.config }

  /// Decode `id` into per-level dimension filters and offsets.
  pub fn parse_id(&self, id: &str) -> Result<ParsedId, IdError> {
    check_legal(id)?;

    let levels = id
      .split('.')
      .enumerate()
      .map(|(i, segment)| self.parse_level(i + 1, segment))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedId { levels })
  }

  fn parse_level(&self, level: usize, segment: &str) -> Result<ParsedLevel, IdError> {
    if segment.is_empty() {
      return Err(IdError::EmptySegment(level));
    }

    let (letters, number) = split_segment(segment);
    let offset = parse_rank(segment, number)?;

    let mut dimension_filters = BTreeMap::new();
    for letter in letters.chars() {
      let mapping = self
        .prefixes
        .get(&letter)
        .ok_or(IdError::UnknownPrefix(letter))?;
      if dimension_filters.contains_key(&mapping.dimension) {
        return Err(IdError::DuplicateDimension(mapping.dimension.clone()));
      }
      dimension_filters.insert(mapping.dimension.clone(), mapping.value.clone());
    }

    for dim in self.config.enumerated() {
      if dimension_filters.contains_key(&dim.name) {
        continue;
      }
      if let Some(default) = dim.default_value() {
        dimension_filters.insert(dim.name.clone(), default.to_owned());
      }
    }

    Ok(ParsedLevel { dimension_filters, offset })
  }

  /// Encode one segment from a row's dimension values and 0-based offset.
  pub fn generate_id(&self, dimension_values: &BTreeMap<String, String>, offset: usize) -> String {
    let mut letters: Vec<(&str, char)> = self
      .config
      .enumerated()
      .filter_map(|dim| {
        let value = dimension_values.get(&dim.name)?;
        dim.prefix_for(value).map(|p| (dim.name.as_str(), p))
      })
      .collect();
    letters.sort_by(|a, b| a.0.cmp(b.0));

    let mut id: String = letters.into_iter().map(|(_, p)| p).collect();
    id.push_str(&(offset + 1).to_string());
    id
  }

  /// Reorder the leading prefix letters of `segment` by dimension name.
  ///
  /// Unknown letters are dropped, as is any letter for a dimension already
  /// seen. Whatever follows the letters is kept as-is.
  pub fn normalize_prefixes(&self, segment: &str) -> String {
    let (letters, rest) = split_segment(segment);

    let mut seen: Vec<(&str, char)> = Vec::new();
    for letter in letters.chars() {
      if let Some(mapping) = self.prefixes.get(&letter)
        && !seen.iter().any(|(d, _)| *d == mapping.dimension)
      {
        seen.push((mapping.dimension.as_str(), letter));
      }
    }
    seen.sort_by(|a, b| a.0.cmp(b.0));

    let mut normalized: String = seen.into_iter().map(|(_, p)| p).collect();
    normalized.push_str(rest);
    normalized
  }

  /// Canonicalise every segment of a full ID.
  ///
  /// Unlike [`IdParser::normalize_prefixes`] this is strict: unknown letters
  /// and repeated dimensions are errors rather than silently dropped.
  pub fn normalize_id(&self, id: &str) -> Result<String, IdError> {
    check_legal(id)?;

    let mut segments = Vec::new();
    for (i, segment) in id.split('.').enumerate() {
      if segment.is_empty() {
        return Err(IdError::EmptySegment(i + 1));
      }
      let (letters, _) = split_segment(segment);
      let mut dims: Vec<&str> = Vec::new();
      for letter in letters.chars() {
        let mapping = self
          .prefixes
          .get(&letter)
          .ok_or(IdError::UnknownPrefix(letter))?;
        if dims.contains(&mapping.dimension.as_str()) {
          return Err(IdError::DuplicateDimension(mapping.dimension.clone()));
        }
        dims.push(&mapping.dimension);
      }
      segments.push(self.normalize_prefixes(segment));
    }

    Ok(segments.join("."))
  }

  /// Fail if any prefix letter is claimed by more than one dimension value.
  pub fn validate_configuration(&self) -> Result<(), ConfigError> {
    match prefix_conflicts(&self.config).into_iter().next() {
      Some((prefix, usages)) => Err(ConfigError::PrefixConflict { prefix, usages }),
      None => Ok(()),
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn check_legal(id: &str) -> Result<(), IdError> {
  if id.contains(ILLEGAL_CHARS) {
    return Err(IdError::IllegalCharacters);
  }
  Ok(())
}

/// Split a segment into its leading lowercase run and the remainder.
fn split_segment(segment: &str) -> (&str, &str) {
  let end = segment
    .find(|c: char| !c.is_ascii_lowercase())
    .unwrap_or(segment.len());
  segment.split_at(end)
}

fn parse_rank(segment: &str, number: &str) -> Result<usize, IdError> {
  if number.is_empty() {
    return Err(IdError::MissingNumber(segment.to_owned()));
  }
  let n: i64 = number
    .parse()
    .map_err(|_| IdError::InvalidNumber(segment.to_owned()))?;
  if n < 1 {
    return Err(IdError::NonPositive(segment.to_owned()));
  }
  usize::try_from(n - 1).map_err(|_| IdError::InvalidNumber(segment.to_owned()))
}

/// Whether `id` has the canonical hyphenated UUID shape.
pub fn is_uuid_format(id: &str) -> bool {
  id.len() == 36
    && id.char_indices().all(|(i, c)| match i {
      8 | 13 | 18 | 23 => c == '-',
      _ => c.is_ascii_hexdigit(),
    })
}
