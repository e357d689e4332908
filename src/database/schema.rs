//! Column and table descriptors
//!
//! Immutable records built from introspection rows. Column descriptors know
//! how to map their raw type and how to parse text values for themselves.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{DbMetaError, Result};
use crate::naming::{format_optional_qualified_name, format_qualified_name};
use crate::types::{self, DbType, DbValue, RuntimeType, TypeCategory};

/// One column as reported by `information_schema.columns`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,
    /// Raw data type (e.g. "integer", "USER-DEFINED", "ARRAY")
    pub data_type: String,
    /// 1-based ordinal position
    pub ordinal_position: i32,
    pub table_name: String,
    pub table_schema: Option<String>,
    pub table_catalog: Option<String>,
    pub is_nullable: bool,
    /// Default expression, as text
    pub default_value: Option<String>,
    pub character_maximum_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
    pub collation_name: Option<String>,
    pub is_generated: bool,
    pub domain_schema: Option<String>,
    pub domain_name: Option<String>,
    pub udt_schema: Option<String>,
    /// For PostgreSQL arrays, the element type prefixed with `_`
    pub udt_name: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        ordinal_position: i32,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ordinal_position,
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn is_array(&self) -> bool {
        types::is_array(&self.data_type)
    }

    pub fn is_user_defined_type(&self) -> bool {
        types::is_user_defined_type(&self.data_type)
    }

    pub fn table_qualified_name(&self) -> String {
        format_qualified_name(&[
            self.table_catalog.as_deref(),
            self.table_schema.as_deref(),
            Some(&self.table_name),
        ])
    }

    /// `catalog.schema.table.column`, skipping absent parts
    pub fn qualified_name(&self) -> String {
        format_qualified_name(&[
            self.table_catalog.as_deref(),
            self.table_schema.as_deref(),
            Some(&self.table_name),
            Some(&self.name),
        ])
    }

    pub fn domain_qualified_name(&self) -> Option<String> {
        format_optional_qualified_name(&[self.domain_schema.as_deref(), self.domain_name.as_deref()])
    }

    pub fn udt_qualified_name(&self) -> Option<String> {
        format_optional_qualified_name(&[self.udt_schema.as_deref(), self.udt_name.as_deref()])
    }

    /// Wire type for binding; unknown types map to `DbType::String`
    pub fn db_type(&self) -> DbType {
        types::db_type_of(&self.data_type)
    }

    /// Runtime representation of parsed values
    pub fn runtime_type(&self) -> Result<RuntimeType> {
        if !self.is_array() {
            return Ok(TypeCategory::from_raw(&self.data_type)?.runtime_type());
        }
        let element = TypeCategory::from_raw(self.array_element_type()?)?;
        Ok(RuntimeType::Array(Box::new(element.runtime_type())))
    }

    /// Parse text into a value of this column's type
    ///
    /// Empty text is NULL for nullable columns and an error otherwise.
    /// User-defined values are returned as text. Array elements are split on
    /// `separator`.
    pub fn parse_value(&self, text: Option<&str>, separator: char) -> Result<DbValue> {
        let text = match text {
            Some(t) if !t.is_empty() => t,
            _ if self.is_nullable => return Ok(DbValue::Null),
            _ => {
                return Err(DbMetaError::NonNullableEmptyValue {
                    column: self.qualified_name(),
                })
            }
        };

        if self.is_user_defined_type() {
            return Ok(DbValue::Text(text.to_string()));
        }
        if self.is_array() {
            let elements = types::parse_array(self.array_element_type()?, text, separator)?;
            return Ok(DbValue::Array(elements));
        }
        types::parse_raw_value(&self.data_type, Some(text))
    }

    fn array_element_type(&self) -> Result<&str> {
        self.udt_name
            .as_deref()
            .filter(|udt| !udt.is_empty())
            .map(types::element_type_name)
            .ok_or_else(|| DbMetaError::MissingArrayElementType {
                column: self.qualified_name(),
            })
    }
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.data_type)?;

        if let Some(len) = self.character_maximum_length {
            write!(f, "({})", len)?;
        } else if let (Some(precision), Some(scale)) = (self.numeric_precision, self.numeric_scale) {
            if scale > 0 {
                write!(f, "({}, {})", precision, scale)?;
            }
        }
        if let Some(udt) = self.udt_qualified_name().filter(|_| self.is_user_defined_type()) {
            write!(f, " [{}]", udt)?;
        }
        if !self.is_nullable {
            write!(f, " NOT NULL")?;
        }
        if let Some(ref default) = self.default_value {
            write!(f, " DEFAULT {}", default)?;
        }
        if self.is_generated {
            write!(f, " GENERATED")?;
        }

        Ok(())
    }
}

/// A table with its columns and unique constraints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    pub catalog: String,
    pub schema: Option<String>,
    pub name: String,
    columns: Vec<ColumnDescriptor>,
    unique_constraints: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TableDescriptor {
    /// Build a descriptor, checking that every constraint member exists
    ///
    /// Columns are ordered by ordinal position, then name.
    pub fn new(
        catalog: impl Into<String>,
        schema: Option<String>,
        name: impl Into<String>,
        mut columns: Vec<ColumnDescriptor>,
        unique_constraints: BTreeMap<String, Vec<String>>,
    ) -> Result<Self> {
        let name = name.into();
        columns.sort_by(|a, b| {
            a.ordinal_position
                .cmp(&b.ordinal_position)
                .then_with(|| a.name.cmp(&b.name))
        });

        let index: HashMap<String, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();

        for (constraint, members) in &unique_constraints {
            if let Some(missing) = members.iter().find(|m| !index.contains_key(m.as_str())) {
                return Err(DbMetaError::UnknownColumnInConstraint {
                    table: name,
                    constraint: constraint.clone(),
                    column: missing.clone(),
                });
            }
        }

        Ok(Self {
            catalog: catalog.into(),
            schema,
            name,
            columns,
            unique_constraints,
            index,
        })
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn try_get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    /// Constraint names with their member columns, in constraint order
    pub fn unique_constraints(&self) -> impl Iterator<Item = (&str, Vec<&ColumnDescriptor>)> + '_ {
        self.unique_constraints.iter().map(move |(name, members)| {
            let columns = members
                .iter()
                .filter_map(|m| self.try_get_column(m))
                .collect();
            (name.as_str(), columns)
        })
    }

    /// Column sets that uniquely identify a row
    pub fn primary_key_candidates(&self) -> Vec<Vec<&ColumnDescriptor>> {
        self.unique_constraints().map(|(_, columns)| columns).collect()
    }

    pub fn qualified_name(&self) -> String {
        format_qualified_name(&[Some(&self.catalog), self.schema.as_deref(), Some(&self.name)])
    }

    /// Multi-line description for terminal output
    pub fn format_schema(&self) -> String {
        let mut result = format!("Table: {}\n", self.qualified_name());

        if !self.unique_constraints.is_empty() {
            result.push_str("  Unique:\n");
            for (name, members) in &self.unique_constraints {
                result.push_str(&format!("    {} ({})\n", name, members.join(", ")));
            }
        }

        result.push_str("  Columns:\n");
        for column in &self.columns {
            result.push_str(&format!("    {}\n", column));
        }

        result
    }
}

impl fmt::Display for TableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_schema())
    }
}
