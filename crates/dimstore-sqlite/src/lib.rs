//! SQLite backend for the dimstore document store.
//!
//! Generates schema and listing SQL from a runtime [`dimstore_core::Config`]
//! and runs it through a blocking [`rusqlite`] connection. Every mutation is
//! a single transaction that rolls back unless it completes.

mod encode;
mod resolve;
mod store;

pub mod error;
pub mod query;
pub mod schema;
pub mod sql;

pub use error::{Error, Result};
pub use query::{FilterValue, QueryBuilder};
pub use schema::SchemaBuilder;
pub use sql::{SqlBuilder, Statement};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
