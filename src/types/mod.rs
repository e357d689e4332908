//! Type taxonomy
//!
//! Maps raw vendor type names (as reported by `information_schema`) onto a
//! small closed set of semantic categories. Matching is exact and
//! case-insensitive; only array and user-defined detection use heuristics.

pub mod value;

use crate::error::{DbMetaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use value::{parse_array, parse_hexadecimal, parse_raw_value, parse_value, DbValue};

/// Semantic category of a raw SQL type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCategory {
    SmallInteger,
    StandardInteger,
    LargeInteger,
    SinglePrecisionFloat,
    DoublePrecisionFloat,
    Decimal,
    Character,
    Date,
    DateTime,
    DateTimeOffset,
    Time,
    Boolean,
    UniqueIdentifier,
    Binary,
    Json,
    Xml,
    Enumerated,
    Set,
    UserDefined,
}

impl TypeCategory {
    /// Classify a raw type name, `None` when it belongs to no category
    pub fn classify(raw_type: &str) -> Option<Self> {
        let normalized = raw_type.trim().to_lowercase();
        let category = match normalized.as_str() {
            "smallint" | "int2" | "smallserial" | "tinyint" => Self::SmallInteger,
            "int" | "integer" | "int4" | "mediumint" | "serial4" => Self::StandardInteger,
            "bigint" | "int8" | "serial" | "bigserial" | "serial8" => Self::LargeInteger,
            "real" | "float4" => Self::SinglePrecisionFloat,
            "float" | "float8" | "double" | "double precision" => Self::DoublePrecisionFloat,
            "decimal" | "numeric" | "money" | "smallmoney" | "number" => Self::Decimal,
            "char" | "character" | "nchar" | "varchar" | "nvarchar" | "varchar2"
            | "nvarchar2" | "character varying" | "bpchar" | "text" | "ntext" | "tinytext"
            | "mediumtext" | "longtext" | "clob" | "nclob" | "long" | "name" | "citext" => {
                Self::Character
            }
            "date" => Self::Date,
            "datetime" | "smalldatetime" | "datetime2" | "timestamp"
            | "timestamp without time zone" => Self::DateTime,
            "timestamp with time zone" | "timestamptz" | "datetimeoffset" => {
                Self::DateTimeOffset
            }
            "time" | "time without time zone" | "time with time zone" | "timetz"
            | "interval" => Self::Time,
            "boolean" | "bool" | "bit" => Self::Boolean,
            "uuid" | "uniqueidentifier" => Self::UniqueIdentifier,
            "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob"
            | "bytea" | "raw" | "long raw" | "image" => Self::Binary,
            "json" | "jsonb" => Self::Json,
            "xml" | "xmltype" => Self::Xml,
            "enum" => Self::Enumerated,
            "set" => Self::Set,
            "user-defined" => Self::UserDefined,
            _ => return None,
        };
        Some(category)
    }

    /// Classify a raw type name, failing on unknown types
    pub fn from_raw(raw_type: &str) -> Result<Self> {
        Self::classify(raw_type).ok_or_else(|| DbMetaError::UnrecognizedType(raw_type.to_string()))
    }

    /// Classify a raw type name, treating unknown types as character data
    pub fn classify_or_character(raw_type: &str) -> Self {
        Self::classify(raw_type).unwrap_or(Self::Character)
    }

    /// Wire type used when binding values of this category
    pub fn db_type(&self) -> DbType {
        match self {
            Self::SmallInteger => DbType::Int16,
            Self::StandardInteger => DbType::Int32,
            Self::LargeInteger => DbType::Int64,
            Self::SinglePrecisionFloat => DbType::Single,
            Self::DoublePrecisionFloat => DbType::Double,
            Self::Decimal => DbType::Decimal,
            Self::Date => DbType::Date,
            Self::DateTime => DbType::DateTime,
            Self::DateTimeOffset => DbType::DateTimeOffset,
            Self::Time => DbType::Time,
            Self::Boolean => DbType::Boolean,
            Self::UniqueIdentifier => DbType::Guid,
            Self::Binary => DbType::Binary,
            Self::Character
            | Self::Json
            | Self::Xml
            | Self::Enumerated
            | Self::Set
            | Self::UserDefined => DbType::String,
        }
    }

    /// Runtime representation of values in this category
    pub fn runtime_type(&self) -> RuntimeType {
        match self {
            Self::SmallInteger => RuntimeType::I16,
            Self::StandardInteger => RuntimeType::I32,
            Self::LargeInteger => RuntimeType::I64,
            Self::SinglePrecisionFloat => RuntimeType::F32,
            Self::DoublePrecisionFloat => RuntimeType::F64,
            Self::Decimal => RuntimeType::Decimal,
            Self::Date => RuntimeType::Date,
            Self::DateTime => RuntimeType::DateTime,
            Self::DateTimeOffset => RuntimeType::DateTimeOffset,
            Self::Time => RuntimeType::Duration,
            Self::Boolean => RuntimeType::Bool,
            Self::UniqueIdentifier => RuntimeType::Uuid,
            Self::Binary => RuntimeType::Bytes,
            Self::Character
            | Self::Json
            | Self::Xml
            | Self::Enumerated
            | Self::Set
            | Self::UserDefined => RuntimeType::String,
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Database wire type used for parameter binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbType {
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    Date,
    DateTime,
    DateTimeOffset,
    Time,
    Boolean,
    Guid,
    Binary,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Runtime representation of a parsed value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeType {
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    String,
    Date,
    DateTime,
    DateTimeOffset,
    Duration,
    Bool,
    Uuid,
    Bytes,
    Array(Box<RuntimeType>),
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeType::Array(element) => write!(f, "{}[]", element),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Best-guess wire type for a raw type name; never fails
pub fn db_type_of(raw_type: &str) -> DbType {
    TypeCategory::classify_or_character(raw_type).db_type()
}

/// Whether a raw type name denotes an array
pub fn is_array(raw_type: &str) -> bool {
    let normalized = raw_type.trim().to_lowercase();
    normalized.contains("[]") || normalized.starts_with("array") || normalized.ends_with(" array")
}

/// Whether a raw type name is the catalog's generic user-defined marker
pub fn is_user_defined_type(raw_type: &str) -> bool {
    raw_type.trim().to_lowercase() == "user-defined"
}

/// Element type of a PostgreSQL array UDT name (`_int4` -> `int4`)
pub fn element_type_name(udt_name: &str) -> &str {
    udt_name.strip_prefix('_').unwrap_or(udt_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(TypeCategory::classify("INTEGER"), Some(TypeCategory::StandardInteger));
        assert_eq!(TypeCategory::classify("Double Precision"), Some(TypeCategory::DoublePrecisionFloat));
        assert_eq!(TypeCategory::classify("USER-DEFINED"), Some(TypeCategory::UserDefined));
        assert_eq!(TypeCategory::classify("timestamp with time zone"), Some(TypeCategory::DateTimeOffset));
    }

    #[test]
    fn test_classify_is_exact_match() {
        assert_eq!(TypeCategory::classify("integerx"), None);
        assert_eq!(TypeCategory::classify("varchar(10)"), None);
        assert_eq!(TypeCategory::classify("int[]"), None);
    }

    #[test]
    fn test_serial_types_are_large_integers() {
        assert_eq!(TypeCategory::classify("serial"), Some(TypeCategory::LargeInteger));
        assert_eq!(TypeCategory::classify("bigserial"), Some(TypeCategory::LargeInteger));
    }

    #[test]
    fn test_unknown_type_asymmetry() {
        assert_eq!(db_type_of("geometry"), DbType::String);
        assert_eq!(TypeCategory::classify_or_character("geometry"), TypeCategory::Character);
        assert!(matches!(
            TypeCategory::from_raw("geometry"),
            Err(DbMetaError::UnrecognizedType(t)) if t == "geometry"
        ));
    }

    #[test]
    fn test_db_type_mapping() {
        assert_eq!(db_type_of("smallint"), DbType::Int16);
        assert_eq!(db_type_of("uniqueidentifier"), DbType::Guid);
        assert_eq!(db_type_of("bytea"), DbType::Binary);
        assert_eq!(db_type_of("jsonb"), DbType::String);
        assert_eq!(db_type_of("interval"), DbType::Time);
    }

    #[test]
    fn test_is_array() {
        assert!(is_array("integer[]"));
        assert!(is_array("ARRAY"));
        assert!(is_array("varchar array"));
        assert!(!is_array("integer"));
        assert!(!is_array("xarray"));
    }

    #[test]
    fn test_is_user_defined_type() {
        assert!(is_user_defined_type("USER-DEFINED"));
        assert!(!is_user_defined_type("user-defined-thing"));
        assert!(!is_user_defined_type("enum"));
    }

    #[test]
    fn test_element_type_name() {
        assert_eq!(element_type_name("_int4"), "int4");
        assert_eq!(element_type_name("text"), "text");
    }

    #[test]
    fn test_runtime_type_display() {
        assert_eq!(RuntimeType::Array(Box::new(RuntimeType::I32)).to_string(), "I32[]");
        assert_eq!(TypeCategory::Time.runtime_type(), RuntimeType::Duration);
    }
}
