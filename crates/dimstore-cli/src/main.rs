//! `dimstore`: command-line front end for a dimension-addressed document
//! store.
//!
//! # Usage
//!
//! ```text
//! dimstore add "Buy milk"
//! dimstore add "Skimmed" --parent 1
//! dimstore status 1 completed
//! dimstore list --status pending --format json
//! dimstore --config ~/.config/dimstore/tasks.toml resolve c1.1
//! ```

mod output;
mod settings;

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use dimstore_core::{Config, DocumentStore, ListOptions, ParentRef, UpdateRequest};
use dimstore_sqlite::{SchemaBuilder, SqliteStore};
use output::Format;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "dimstore", version, about = "Dimension-addressed document store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "dimstore.toml")]
  config: PathBuf,

  /// Database file; overrides `database` from the configuration.
  #[arg(long, value_name = "FILE")]
  database: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create a document.
  Add {
    title:  String,
    /// Parent document, by UUID or ID.
    #[arg(long)]
    parent: Option<String>,
    /// Dimension value, e.g. `--dim priority=high`. Repeatable.
    #[arg(long = "dim", value_name = "NAME=VALUE", value_parser = parse_pair)]
    dims:   Vec<(String, String)>,
  },

  /// List documents with their current IDs.
  List {
    #[arg(long)]
    status: Vec<String>,
    /// Only direct children of this document.
    #[arg(long, conflicts_with = "roots")]
    parent: Option<String>,
    /// Only root documents.
    #[arg(long)]
    roots:  bool,
    /// Substring of title or body.
    #[arg(long)]
    search: Option<String>,
    #[arg(long = "dim", value_name = "NAME=VALUE", value_parser = parse_pair)]
    dims:   Vec<(String, String)>,
    #[arg(long, value_enum, default_value_t)]
    format: Format,
  },

  /// Change a document's fields.
  Update {
    id:     String,
    #[arg(long)]
    title:  Option<String>,
    #[arg(long)]
    body:   Option<String>,
    /// New parent; an empty string makes the document a root.
    #[arg(long)]
    parent: Option<String>,
    #[arg(long = "dim", value_name = "NAME=VALUE", value_parser = parse_pair)]
    dims:   Vec<(String, String)>,
  },

  /// Set the `status` dimension.
  Status { id: String, value: String },

  /// Delete a document.
  Delete {
    id:      String,
    /// Also delete every descendant.
    #[arg(long)]
    cascade: bool,
  },

  /// Print the UUID behind an ID.
  Resolve { id: String },

  /// Print the DDL for the configured dimensions.
  Schema,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
  s.split_once('=')
    .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
    .filter(|(k, _)| !k.is_empty())
    .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))
}

// ─── Entry point ─────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;
  let config = settings.store_config();

  if let Command::Schema = cli.command {
    config.validate().context("invalid dimension configuration")?;
    for statement in SchemaBuilder::new(Arc::new(config)).full_schema() {
      println!("{statement};");
    }
    return Ok(());
  }

  let database = cli.database.unwrap_or(settings.database);
  let store = SqliteStore::open(&database, config.clone())
    .with_context(|| format!("failed to open store at {}", database.display()))?;

  run(&store, &config, cli.command)?;
  store.close().context("failed to close store")?;
  Ok(())
}

fn run<S: DocumentStore>(store: &S, config: &Config, command: Command) -> anyhow::Result<()> {
  match command {
    Command::Add { title, parent, dims } => {
      let mut values: BTreeMap<String, String> = dims.into_iter().collect();
      if let Some(parent) = parent {
        let key = config.hierarchical().map_or("parent", |h| h.name.as_str());
        values.insert(key.to_owned(), parent);
      }
      let uuid = store.add_with_dimensions(&title, &values)?;
      println!("{}", store.get(&uuid.to_string())?.user_facing_id);
    }

    Command::List { status, parent, roots, search, dims, format } => {
      let mut dimensions: BTreeMap<String, Vec<String>> = BTreeMap::new();
      for (name, value) in dims {
        dimensions.entry(name).or_default().push(value);
      }
      let parent = match (roots, parent) {
        (true, _) => Some(ParentRef::Root),
        (false, parent) => parent.map(ParentRef::Id),
      };
      let docs = store.list(&ListOptions { status, parent, search, dimensions })?;
      print!("{}", output::render(&docs, config, format)?);
    }

    Command::Update { id, title, body, parent, dims } => {
      store.update(&id, UpdateRequest {
        title,
        body,
        parent: parent.map(ParentRef::Id),
        dimensions: dims.into_iter().collect(),
      })?;
    }

    Command::Status { id, value } => store.set_status(&id, &value)?,

    Command::Delete { id, cascade } => store.delete(&id, cascade)?,

    Command::Resolve { id } => println!("{}", store.resolve_uuid(&id)?),

    Command::Schema => {}
  }
  Ok(())
}
