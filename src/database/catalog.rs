//! Catalog access capabilities
//!
//! Introspection talks to a database only through [`CatalogConnection`]:
//! parameterized text commands returning scalar values or rows of
//! [`CatalogValue`]s. Drivers plug in through [`ConnectionFactory`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionString;
use crate::error::{DbMetaError, Result};
use crate::provider::ProviderFamily;

/// A single cell returned by a catalog query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogValue {
    Null,
    Text(String),
    Int(i64),
    Bool(bool),
}

impl CatalogValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CatalogValue::Null)
    }

    /// Integer view, accepting numeric text
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CatalogValue::Int(v) => Some(*v),
            CatalogValue::Text(s) => s.trim().parse().ok(),
            CatalogValue::Bool(b) => Some(i64::from(*b)),
            CatalogValue::Null => None,
        }
    }
}

/// One row of a catalog query, accessed by ordinal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRow {
    values: Vec<CatalogValue>,
}

impl CatalogRow {
    pub fn new(values: Vec<CatalogValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[CatalogValue] {
        &self.values
    }

    pub fn is_null(&self, index: usize) -> Result<bool> {
        Ok(self.cell(index)?.is_null())
    }

    pub fn get_string(&self, index: usize) -> Result<String> {
        self.get_opt_string(index)?
            .ok_or_else(|| DbMetaError::malformed_row(index, "non-null text"))
    }

    pub fn get_opt_string(&self, index: usize) -> Result<Option<String>> {
        match self.cell(index)? {
            CatalogValue::Null => Ok(None),
            CatalogValue::Text(s) => Ok(Some(s.clone())),
            _ => Err(DbMetaError::malformed_row(index, "text")),
        }
    }

    pub fn get_i32(&self, index: usize) -> Result<i32> {
        self.get_opt_i32(index)?
            .ok_or_else(|| DbMetaError::malformed_row(index, "non-null integer"))
    }

    pub fn get_opt_i32(&self, index: usize) -> Result<Option<i32>> {
        match self.cell(index)? {
            CatalogValue::Null => Ok(None),
            CatalogValue::Int(v) => i32::try_from(*v)
                .map(Some)
                .map_err(|_| DbMetaError::malformed_row(index, "32-bit integer")),
            CatalogValue::Text(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| DbMetaError::malformed_row(index, "integer")),
            CatalogValue::Bool(_) => Err(DbMetaError::malformed_row(index, "integer")),
        }
    }

    /// Boolean cell; drivers without a boolean type return 0/1
    pub fn get_bool(&self, index: usize) -> Result<bool> {
        match self.cell(index)? {
            CatalogValue::Bool(b) => Ok(*b),
            CatalogValue::Int(0) => Ok(false),
            CatalogValue::Int(1) => Ok(true),
            _ => Err(DbMetaError::malformed_row(index, "boolean")),
        }
    }

    fn cell(&self, index: usize) -> Result<&CatalogValue> {
        self.values
            .get(index)
            .ok_or_else(|| DbMetaError::malformed_row(index, "a column"))
    }
}

impl From<Vec<CatalogValue>> for CatalogRow {
    fn from(values: Vec<CatalogValue>) -> Self {
        Self::new(values)
    }
}

/// How a driver spells positional parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2` (PostgreSQL)
    Dollar,
    /// `?` (MySQL, SQLite)
    QuestionMark,
    /// `@P1`, `@P2` (SQL Server)
    AtP,
}

impl PlaceholderStyle {
    pub fn for_family(family: ProviderFamily) -> Self {
        match family {
            ProviderFamily::PostgreSql => PlaceholderStyle::Dollar,
            ProviderFamily::SqlServer => PlaceholderStyle::AtP,
            ProviderFamily::MySql
            | ProviderFamily::Sqlite
            | ProviderFamily::Oracle
            | ProviderFamily::Generic => PlaceholderStyle::QuestionMark,
        }
    }
}

/// Command text with `@Name` markers and named string parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCommand {
    text: String,
    parameters: Vec<(String, Option<String>)>,
}

impl CatalogCommand {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a parameter; `None` binds NULL
    pub fn param(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.parameters.push((name.into(), value.map(str::to_string)));
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameter(&self, name: &str) -> Option<Option<&str>> {
        self.parameters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref())
    }

    /// Rewrite markers into driver placeholders
    ///
    /// Returns the text and the values in bind order. Markers that name no
    /// parameter (such as `@@VERSION`) are left untouched.
    pub fn render(&self, style: PlaceholderStyle) -> (String, Vec<Option<String>>) {
        let mut sql = String::with_capacity(self.text.len());
        let mut binds: Vec<Option<String>> = Vec::new();
        let mut numbered: Vec<String> = Vec::new();
        let mut rest = self.text.as_str();

        while let Some(at) = rest.find('@') {
            sql.push_str(&rest[..at]);
            let after = &rest[at + 1..];
            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..name_len];

            match self.parameter(name).filter(|_| !name.is_empty()) {
                Some(value) => match style {
                    PlaceholderStyle::QuestionMark => {
                        sql.push('?');
                        binds.push(value.map(str::to_string));
                    }
                    PlaceholderStyle::Dollar | PlaceholderStyle::AtP => {
                        let position = match numbered.iter().position(|n| n.eq_ignore_ascii_case(name)) {
                            Some(position) => position,
                            None => {
                                numbered.push(name.to_string());
                                binds.push(value.map(str::to_string));
                                numbered.len() - 1
                            }
                        };
                        if style == PlaceholderStyle::Dollar {
                            sql.push_str(&format!("${}", position + 1));
                        } else {
                            sql.push_str(&format!("@P{}", position + 1));
                        }
                    }
                },
                None => {
                    sql.push('@');
                    sql.push_str(name);
                }
            }
            rest = &after[name_len..];
        }
        sql.push_str(rest);

        (sql, binds)
    }
}

/// A live connection able to run catalog queries
#[async_trait]
pub trait CatalogConnection: Send {
    /// Dialect of the connected server
    fn family(&self) -> ProviderFamily;

    /// Name of the current database
    fn database(&self) -> &str;

    /// First column of the first row, `None` when there are no rows
    async fn execute_scalar(&mut self, command: &CatalogCommand) -> Result<Option<CatalogValue>>;

    async fn execute_reader(&mut self, command: &CatalogCommand) -> Result<Vec<CatalogRow>>;
}

/// Opens [`CatalogConnection`]s from connection strings
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, connection_string: &ConnectionString) -> Result<Box<dyn CatalogConnection>>;

    /// Empty connection string for this driver
    fn create_connection_string(&self) -> ConnectionString {
        ConnectionString::new()
    }
}

/// Factory for families with no bundled driver
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedConnectionFactory {
    family: ProviderFamily,
}

impl UnsupportedConnectionFactory {
    pub fn new(family: ProviderFamily) -> Self {
        Self { family }
    }
}

#[async_trait]
impl ConnectionFactory for UnsupportedConnectionFactory {
    async fn connect(&self, _connection_string: &ConnectionString) -> Result<Box<dyn CatalogConnection>> {
        Err(DbMetaError::UnsupportedProvider(format!(
            "no bundled driver for {}",
            self.family
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> CatalogCommand {
        CatalogCommand::new(
            "SELECT 1 WHERE a = @TableCatalog AND (@TableSchema IS NULL OR b = @TableSchema) AND c = @TableName",
        )
        .param("TableCatalog", Some("clinic"))
        .param("TableSchema", None)
        .param("TableName", Some("patient"))
    }

    #[test]
    fn test_render_dollar_reuses_positions() {
        let (sql, binds) = command().render(PlaceholderStyle::Dollar);
        assert_eq!(
            sql,
            "SELECT 1 WHERE a = $1 AND ($2 IS NULL OR b = $2) AND c = $3"
        );
        assert_eq!(
            binds,
            vec![Some("clinic".to_string()), None, Some("patient".to_string())]
        );
    }

    #[test]
    fn test_render_question_mark_repeats_values() {
        let (sql, binds) = command().render(PlaceholderStyle::QuestionMark);
        assert_eq!(sql, "SELECT 1 WHERE a = ? AND (? IS NULL OR b = ?) AND c = ?");
        assert_eq!(binds.len(), 4);
        assert_eq!(binds[1], None);
        assert_eq!(binds[3].as_deref(), Some("patient"));
    }

    #[test]
    fn test_render_at_p() {
        let (sql, _) = command().render(PlaceholderStyle::AtP);
        assert_eq!(
            sql,
            "SELECT 1 WHERE a = @P1 AND (@P2 IS NULL OR b = @P2) AND c = @P3"
        );
    }

    #[test]
    fn test_render_leaves_unknown_markers() {
        let (sql, binds) = CatalogCommand::new("SELECT @@VERSION, @Missing").render(PlaceholderStyle::Dollar);
        assert_eq!(sql, "SELECT @@VERSION, @Missing");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_row_accessors() {
        let row = CatalogRow::new(vec![
            CatalogValue::Text("visits".into()),
            CatalogValue::Int(8),
            CatalogValue::Null,
            CatalogValue::Int(1),
            CatalogValue::Bool(false),
        ]);
        assert_eq!(row.get_string(0).unwrap(), "visits");
        assert_eq!(row.get_i32(1).unwrap(), 8);
        assert_eq!(row.get_opt_i32(2).unwrap(), None);
        assert_eq!(row.get_opt_string(2).unwrap(), None);
        assert!(row.is_null(2).unwrap());
        assert!(row.get_bool(3).unwrap());
        assert!(!row.get_bool(4).unwrap());
    }

    #[test]
    fn test_row_type_mismatch() {
        let row = CatalogRow::new(vec![CatalogValue::Bool(true), CatalogValue::Null]);
        assert!(matches!(
            row.get_string(0),
            Err(DbMetaError::MalformedCatalogRow { index: 0, .. })
        ));
        assert!(matches!(
            row.get_i32(1),
            Err(DbMetaError::MalformedCatalogRow { index: 1, .. })
        ));
        assert!(matches!(
            row.get_string(5),
            Err(DbMetaError::MalformedCatalogRow { index: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_unsupported_factory_fails() {
        let factory = UnsupportedConnectionFactory::new(ProviderFamily::Oracle);
        let result = factory.connect(&ConnectionString::new()).await;
        assert!(matches!(result, Err(DbMetaError::UnsupportedProvider(_))));
        assert!(factory.create_connection_string().is_empty());
    }
}
