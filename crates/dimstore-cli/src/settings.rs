//! Configuration for the `dimstore` binary.
//!
//! Read from a TOML file layered with `DIMSTORE_*` environment variables:
//!
//! ```toml
//! database = "tasks.db"
//!
//! [[dimensions]]
//! name = "status"
//! type = "enumerated"
//! values = ["pending", "completed"]
//! prefixes = { completed = "c" }
//!
//! [[dimensions]]
//! name = "parent"
//! type = "hierarchical"
//! ref_field = "parent_uuid"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use dimstore_core::{Config, DimensionConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
  #[serde(default = "default_database")]
  pub database:   PathBuf,
  #[serde(default)]
  pub dimensions: Vec<DimensionConfig>,
}

fn default_database() -> PathBuf { PathBuf::from("dimstore.db") }

impl Settings {
  /// Load `path` if it exists, then apply environment overrides.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("DIMSTORE"))
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?;

    settings
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  /// The store configuration; a status/parent pair when none is given.
  pub fn store_config(&self) -> Config {
    if self.dimensions.is_empty() {
      return Config::new(vec![
        DimensionConfig::enumerated("status", ["pending", "completed"])
          .with_prefix("completed", 'c')
          .with_default("pending"),
        DimensionConfig::hierarchical("parent", "parent_uuid"),
      ]);
    }
    Config::new(self.dimensions.clone())
  }
}
