//! Connection strings and connection options
//!
//! Builds driver connection strings per family, parses raw ones, and
//! resolves them into [`ConnectionOptions`].

pub mod builder;
pub mod keys;
pub mod options;
pub mod string;

pub use builder::{build_connection_string, tns_descriptor, ConnectionStringBuilder};
pub use options::{ConnectionOptions, ConnectionOverrides, Credentials, DbHost};
pub use string::ConnectionString;
