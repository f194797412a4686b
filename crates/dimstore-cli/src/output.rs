//! Rendering documents for the terminal.

use clap::ValueEnum;
use dimstore_core::{Config, Document};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
  #[default]
  Table,
  Json,
}

pub fn render(docs: &[Document], config: &Config, format: Format) -> anyhow::Result<String> {
  match format {
    Format::Table => Ok(table(docs, config)),
    Format::Json => Ok(serde_json::to_string_pretty(docs)?),
  }
}

/// Plain aligned columns: ID, title, one per enumerated dimension, created.
fn table(docs: &[Document], config: &Config) -> String {
  let mut header = vec!["ID".to_owned(), "TITLE".to_owned()];
  header.extend(config.enumerated().map(|d| d.name.to_uppercase()));
  header.push("CREATED".to_owned());

  let rows: Vec<Vec<String>> = docs
    .iter()
    .map(|doc| {
      let mut row = vec![doc.user_facing_id.clone(), doc.title.clone()];
      row.extend(
        config
          .enumerated()
          .map(|d| doc.dimension(&d.name).unwrap_or_default().to_owned()),
      );
      row.push(doc.created_at.format("%Y-%m-%d %H:%M").to_string());
      row
    })
    .collect();

  let widths: Vec<usize> = (0..header.len())
    .map(|i| {
      rows
        .iter()
        .map(|r| r[i].chars().count())
        .chain([header[i].len()])
        .max()
        .unwrap_or_default()
    })
    .collect();

  let mut out = String::new();
  for row in std::iter::once(&header).chain(&rows) {
    let cells: Vec<String> = row
      .iter()
      .zip(&widths)
      .map(|(cell, &w)| format!("{cell:<w$}"))
      .collect();
    out.push_str(cells.join("  ").trim_end());
    out.push('\n');
  }
  out
}
