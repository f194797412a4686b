//! Core types for the dimstore document store.
//!
//! Holds the runtime dimension configuration, the compact-ID codec and the
//! `DocumentStore` trait. This crate has no database dependency; backends
//! such as `dimstore-sqlite` build on it.

pub mod config;
pub mod document;
pub mod error;
pub mod id;
pub mod store;

pub use config::{Config, DimensionConfig, DimensionType};
pub use document::{DimensionValue, Document, ListOptions, ParentRef, UpdateRequest};
pub use error::{ConfigError, Error, IdError, Result};
pub use id::{IdParser, ParsedId, ParsedLevel};
pub use store::DocumentStore;
