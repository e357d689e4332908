//! dbmeta Library
//!
//! Provider-agnostic database metadata: a SQL type taxonomy and value parser,
//! connection-string handling, routine statement synthesis and table
//! introspection. The `dbmeta` binary is in src/main.rs.

pub mod cli;
pub mod config;
pub mod connection;
pub mod database;
pub mod error;
pub mod naming;
pub mod provider;
pub mod types;

pub use error::{DbMetaError, Result};
