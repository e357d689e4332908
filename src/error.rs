//! Error types for dbmeta
//!
//! This module defines the error type shared by the type taxonomy, the
//! connection-string layer, statement synthesis and introspection.

use std::time::Duration;
use thiserror::Error;

use crate::provider::{ProviderFamily, RoutineKind};

/// Result type alias for dbmeta
pub type Result<T> = std::result::Result<T, DbMetaError>;

/// Main error type for dbmeta
#[derive(Error, Debug)]
pub enum DbMetaError {
    /// No provider registered for the requested family or driver name
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Routine kind / return shape not expressible in the target dialect
    #[error("Provider {family} does not support routine type {kind} (returns table: {returns_table})")]
    UnsupportedRoutineCombination {
        family: ProviderFamily,
        kind: RoutineKind,
        returns_table: bool,
    },

    /// Connection string carries no server/host key
    #[error("Connection string does not contain a server name or IP address: {0}")]
    ConnectionStringMissingServer(String),

    /// Connection string could not be parsed
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Text could not be converted to the declared type
    #[error("Cannot parse '{value}' as {type_name}: {reason}")]
    Parse {
        type_name: String,
        value: String,
        reason: String,
    },

    /// Hexadecimal text with odd length or non-hex digits
    #[error("Malformed hexadecimal value: {0}")]
    MalformedHex(String),

    /// Empty text supplied for a non-nullable column
    #[error("Value cannot be null or empty for non-nullable column {column}")]
    NonNullableEmptyValue { column: String },

    /// Constraint references a column the table does not have
    #[error("Constraint {constraint} on table {table} references unknown column {column}")]
    UnknownColumnInConstraint {
        table: String,
        constraint: String,
        column: String,
    },

    /// Raw type string not present in any taxonomy set
    #[error("Unrecognized SQL type: {0}")]
    UnrecognizedType(String),

    /// Array column without a user-defined element type name
    #[error("Array column {column} has no user-defined element type")]
    MissingArrayElementType { column: String },

    /// Catalog row cell has an unexpected shape
    #[error("Malformed catalog row: expected {expected} at index {index}")]
    MalformedCatalogRow { index: usize, expected: String },

    /// sqlx driver errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// tiberius driver errors
    #[error("SQL Server error: {0}")]
    SqlServer(#[from] tiberius::error::Error),

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog query exceeded the configured timeout
    #[error("Catalog query timed out after {0:?}")]
    Timeout(Duration),

    /// Command parsing errors
    #[error("Command parsing error: {0}")]
    CommandParse(String),

    /// Command with missing or malformed arguments
    #[error("Invalid syntax for {command}, expected: {expected}")]
    InvalidCommandSyntax { command: String, expected: String },
}

impl DbMetaError {
    /// Create a Parse error
    pub fn parse(
        type_name: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        DbMetaError::Parse {
            type_name: type_name.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a MalformedCatalogRow error
    pub fn malformed_row(index: usize, expected: impl Into<String>) -> Self {
        DbMetaError::MalformedCatalogRow {
            index,
            expected: expected.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routine_combination_message_names_family_and_kind() {
        let err = DbMetaError::UnsupportedRoutineCombination {
            family: ProviderFamily::Sqlite,
            kind: RoutineKind::StoredProcedure,
            returns_table: false,
        };
        assert_eq!(
            err.to_string(),
            "Provider Sqlite does not support routine type StoredProcedure (returns table: false)"
        );

        let err = DbMetaError::UnsupportedRoutineCombination {
            family: ProviderFamily::MySql,
            kind: RoutineKind::StoredFunction,
            returns_table: true,
        };
        assert!(err.to_string().contains("MySql"));
        assert!(err.to_string().ends_with("(returns table: true)"));
    }

    #[test]
    fn test_parse_error_includes_value_and_type() {
        let err = DbMetaError::parse("integer", "abc", "invalid digit");
        assert_eq!(
            err.to_string(),
            "Cannot parse 'abc' as integer: invalid digit"
        );
    }
}
