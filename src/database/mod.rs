//! Database module
//!
//! Catalog access capabilities, the bundled drivers, table introspection
//! and the column/table descriptor model.

pub mod catalog;
pub mod connection;
pub mod indexer;
pub mod manager;
pub mod schema;

// Re-exports
pub use catalog::{
    CatalogCommand, CatalogConnection, CatalogRow, CatalogValue, ConnectionFactory, PlaceholderStyle,
    UnsupportedConnectionFactory,
};
pub use connection::{
    register_builtin_providers, DatabasePool, SqlxConnectionFactory, TiberiusConnectionFactory,
};
pub use indexer::describe_table;
pub use manager::Introspector;
pub use schema::{ColumnDescriptor, TableDescriptor};
