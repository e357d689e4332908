//! Table introspection
//!
//! Fixed `information_schema` queries per family and the `describe_table`
//! operation that turns their rows into a [`TableDescriptor`].

use std::collections::BTreeMap;
use tracing::debug;

use crate::database::catalog::{CatalogCommand, CatalogConnection, CatalogRow};
use crate::database::schema::{ColumnDescriptor, TableDescriptor};
use crate::error::{DbMetaError, Result};
use crate::provider::ProviderFamily;

/// The three catalog queries used to describe a table
///
/// Every query takes `@TableCatalog`, `@TableSchema` (nullable) and
/// `@TableName`.
#[derive(Debug, Clone, Copy)]
pub struct TableQueries {
    pub table_exists: &'static str,
    pub columns: &'static str,
    pub unique_constraints: &'static str,
}

/// ANSI `information_schema`; booleans come back as 0/1
const STANDARD: TableQueries = TableQueries {
    table_exists: r#"
        SELECT COUNT(*)
        FROM information_schema.tables
        WHERE
            table_catalog = @TableCatalog AND
            (@TableSchema IS NULL OR table_schema = @TableSchema) AND
            table_name = @TableName
    "#,
    columns: r#"
        SELECT
            c.column_name,
            c.data_type,
            c.ordinal_position,
            c.table_name,
            c.table_catalog,
            c.table_schema,
            c.character_maximum_length,
            c.numeric_precision,
            c.numeric_scale,
            CASE WHEN UPPER(c.is_nullable) != 'NO' THEN 1 ELSE 0 END AS is_nullable,
            c.column_default AS default_value,
            c.collation_name,
            CASE WHEN UPPER(c.is_generated) = 'ALWAYS' THEN 1 ELSE 0 END AS is_generated,
            c.domain_schema,
            c.domain_name,
            c.udt_schema,
            c.udt_name
        FROM information_schema.columns AS c
        WHERE
            c.table_catalog = @TableCatalog AND
            (@TableSchema IS NULL OR c.table_schema = @TableSchema) AND
            c.table_name = @TableName
        ORDER BY c.ordinal_position, c.column_name
    "#,
    unique_constraints: r#"
        SELECT kcu.constraint_name, kcu.column_name
        FROM information_schema.table_constraints AS tc
        JOIN information_schema.key_column_usage AS kcu
            ON tc.table_name = kcu.table_name AND tc.constraint_name = kcu.constraint_name
        WHERE
            tc.table_catalog = @TableCatalog AND
            (@TableSchema IS NULL OR tc.table_schema = @TableSchema) AND
            tc.table_name = @TableName AND
            tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
        ORDER BY tc.constraint_name, kcu.ordinal_position
    "#,
};

/// information_schema columns are domain types in PostgreSQL, so cast them
const POSTGRES: TableQueries = TableQueries {
    table_exists: r#"
        SELECT COUNT(*)
        FROM information_schema.tables
        WHERE
            table_catalog = @TableCatalog AND
            (@TableSchema::TEXT IS NULL OR table_schema = @TableSchema) AND
            table_name = @TableName
    "#,
    columns: r#"
        SELECT
            c.column_name::TEXT,
            c.data_type::TEXT,
            c.ordinal_position::INTEGER,
            c.table_name::TEXT,
            c.table_catalog::TEXT,
            c.table_schema::TEXT,
            c.character_maximum_length::INTEGER,
            c.numeric_precision::INTEGER,
            c.numeric_scale::INTEGER,
            UPPER(c.is_nullable) != 'NO' AS is_nullable,
            c.column_default::TEXT AS default_value,
            c.collation_name::TEXT,
            UPPER(c.is_generated) = 'ALWAYS' AS is_generated,
            c.domain_schema::TEXT,
            c.domain_name::TEXT,
            c.udt_schema::TEXT,
            c.udt_name::TEXT
        FROM information_schema.columns AS c
        WHERE
            c.table_catalog = @TableCatalog AND
            (@TableSchema::TEXT IS NULL OR c.table_schema = @TableSchema) AND
            c.table_name = @TableName
        ORDER BY c.ordinal_position, c.column_name
    "#,
    unique_constraints: r#"
        SELECT kcu.constraint_name::TEXT, kcu.column_name::TEXT
        FROM information_schema.table_constraints AS tc
        JOIN information_schema.key_column_usage AS kcu
            ON tc.table_schema = kcu.table_schema
            AND tc.table_name = kcu.table_name
            AND tc.constraint_name = kcu.constraint_name
        WHERE
            tc.table_catalog = @TableCatalog AND
            (@TableSchema::TEXT IS NULL OR tc.table_schema = @TableSchema) AND
            tc.table_name = @TableName AND
            tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
        ORDER BY tc.constraint_name, kcu.ordinal_position
    "#,
};

/// MySQL reports the database as `table_schema`; `table_catalog` is always `def`
const MYSQL: TableQueries = TableQueries {
    table_exists: r#"
        SELECT COUNT(*)
        FROM information_schema.tables
        WHERE
            table_schema = COALESCE(@TableSchema, @TableCatalog) AND
            table_name = @TableName
    "#,
    columns: r#"
        SELECT
            CAST(c.column_name AS CHAR),
            CAST(c.data_type AS CHAR),
            CAST(c.ordinal_position AS SIGNED),
            CAST(c.table_name AS CHAR),
            CAST(c.table_schema AS CHAR) AS table_catalog,
            CAST(c.table_schema AS CHAR),
            CAST(c.character_maximum_length AS SIGNED),
            CAST(c.numeric_precision AS SIGNED),
            CAST(c.numeric_scale AS SIGNED),
            CASE WHEN UPPER(c.is_nullable) != 'NO' THEN 1 ELSE 0 END AS is_nullable,
            CAST(c.column_default AS CHAR) AS default_value,
            CAST(c.collation_name AS CHAR),
            CASE WHEN UPPER(c.extra) LIKE '%GENERATED%' THEN 1 ELSE 0 END AS is_generated,
            NULL AS domain_schema,
            NULL AS domain_name,
            NULL AS udt_schema,
            NULL AS udt_name
        FROM information_schema.columns AS c
        WHERE
            c.table_schema = COALESCE(@TableSchema, @TableCatalog) AND
            c.table_name = @TableName
        ORDER BY c.ordinal_position, c.column_name
    "#,
    unique_constraints: r#"
        SELECT CAST(kcu.constraint_name AS CHAR), CAST(kcu.column_name AS CHAR)
        FROM information_schema.table_constraints AS tc
        JOIN information_schema.key_column_usage AS kcu
            ON tc.table_schema = kcu.table_schema
            AND tc.table_name = kcu.table_name
            AND tc.constraint_name = kcu.constraint_name
        WHERE
            tc.table_schema = COALESCE(@TableSchema, @TableCatalog) AND
            tc.table_name = @TableName AND
            tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
        ORDER BY tc.constraint_name, kcu.ordinal_position
    "#,
};

const SQL_SERVER: TableQueries = TableQueries {
    table_exists: STANDARD.table_exists,
    columns: r#"
        SELECT
            c.column_name,
            c.data_type,
            CAST(c.ordinal_position AS INT),
            c.table_name,
            c.table_catalog,
            c.table_schema,
            CAST(c.character_maximum_length AS INT),
            CAST(c.numeric_precision AS INT),
            CAST(c.numeric_scale AS INT),
            CASE WHEN UPPER(c.is_nullable) != 'NO' THEN 1 ELSE 0 END AS is_nullable,
            c.column_default AS default_value,
            c.collation_name,
            CASE WHEN COLUMNPROPERTY(
                OBJECT_ID(QUOTENAME(c.table_schema) + '.' + QUOTENAME(c.table_name)),
                c.column_name,
                'IsComputed') = 1 THEN 1 ELSE 0 END AS is_generated,
            c.domain_schema,
            c.domain_name,
            NULL AS udt_schema,
            NULL AS udt_name
        FROM information_schema.columns AS c
        WHERE
            c.table_catalog = @TableCatalog AND
            (@TableSchema IS NULL OR c.table_schema = @TableSchema) AND
            c.table_name = @TableName
        ORDER BY c.ordinal_position, c.column_name
    "#,
    unique_constraints: STANDARD.unique_constraints,
};

/// Catalog queries for a family
///
/// SQLite has no `information_schema`; its driver reports the failure.
pub fn queries_for(family: ProviderFamily) -> &'static TableQueries {
    match family {
        ProviderFamily::PostgreSql => &POSTGRES,
        ProviderFamily::MySql => &MYSQL,
        ProviderFamily::SqlServer => &SQL_SERVER,
        ProviderFamily::Oracle | ProviderFamily::Sqlite | ProviderFamily::Generic => &STANDARD,
    }
}

fn table_command(text: &str, catalog: &str, schema: Option<&str>, table: &str) -> CatalogCommand {
    CatalogCommand::new(text)
        .param("TableCatalog", Some(catalog))
        .param("TableSchema", schema)
        .param("TableName", Some(table))
}

/// Whether the table exists in the given catalog
pub async fn table_exists<C>(conn: &mut C, catalog: &str, schema: Option<&str>, table: &str) -> Result<bool>
where
    C: CatalogConnection + ?Sized,
{
    let queries = queries_for(conn.family());
    let command = table_command(queries.table_exists, catalog, schema, table);

    let count = match conn.execute_scalar(&command).await? {
        Some(value) if !value.is_null() => value
            .as_i64()
            .ok_or_else(|| DbMetaError::malformed_row(0, "integer count"))?,
        _ => 0,
    };
    Ok(count > 0)
}

/// Column rows for a table, in ordinal order
pub async fn fetch_columns<C>(
    conn: &mut C,
    catalog: &str,
    schema: Option<&str>,
    table: &str,
) -> Result<Vec<ColumnDescriptor>>
where
    C: CatalogConnection + ?Sized,
{
    let queries = queries_for(conn.family());
    let command = table_command(queries.columns, catalog, schema, table);
    let rows = conn.execute_reader(&command).await?;
    debug!("Fetched {} column rows for {}", rows.len(), table);

    rows.iter().map(column_from_row).collect()
}

/// Unique and primary-key constraints with their member columns
pub async fn fetch_unique_constraints<C>(
    conn: &mut C,
    catalog: &str,
    schema: Option<&str>,
    table: &str,
) -> Result<BTreeMap<String, Vec<String>>>
where
    C: CatalogConnection + ?Sized,
{
    let queries = queries_for(conn.family());
    let command = table_command(queries.unique_constraints, catalog, schema, table);
    let rows = conn.execute_reader(&command).await?;
    debug!("Fetched {} constraint rows for {}", rows.len(), table);

    let mut constraints: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in &rows {
        let constraint = row.get_string(0)?;
        let column = row.get_string(1)?;
        constraints.entry(constraint).or_default().push(column);
    }
    Ok(constraints)
}

/// Map one row of the column query
pub fn column_from_row(row: &CatalogRow) -> Result<ColumnDescriptor> {
    Ok(ColumnDescriptor {
        name: row.get_string(0)?,
        data_type: row.get_string(1)?,
        ordinal_position: row.get_i32(2)?,
        table_name: row.get_string(3)?,
        table_catalog: row.get_opt_string(4)?,
        table_schema: row.get_opt_string(5)?,
        character_maximum_length: row.get_opt_i32(6)?,
        numeric_precision: row.get_opt_i32(7)?,
        numeric_scale: row.get_opt_i32(8)?,
        is_nullable: row.get_bool(9)?,
        default_value: row.get_opt_string(10)?,
        collation_name: row.get_opt_string(11)?,
        is_generated: row.get_bool(12)?,
        domain_schema: row.get_opt_string(13)?,
        domain_name: row.get_opt_string(14)?,
        udt_schema: row.get_opt_string(15)?,
        udt_name: row.get_opt_string(16)?,
    })
}

/// Describe a table
///
/// The catalog defaults to the connection's current database. Returns
/// `Ok(None)` when the table does not exist.
pub async fn describe_table<C>(
    conn: &mut C,
    table: &str,
    schema: Option<&str>,
    catalog: Option<&str>,
) -> Result<Option<TableDescriptor>>
where
    C: CatalogConnection + ?Sized,
{
    let catalog = match catalog {
        Some(catalog) => catalog.to_string(),
        None => conn.database().to_string(),
    };
    debug!(
        "Describing table {}.{}.{} on {}",
        catalog,
        schema.unwrap_or("*"),
        table,
        conn.family()
    );

    if !table_exists(conn, &catalog, schema, table).await? {
        debug!("Table {} not found in {}", table, catalog);
        return Ok(None);
    }

    let columns = fetch_columns(conn, &catalog, schema, table).await?;
    let constraints = fetch_unique_constraints(conn, &catalog, schema, table).await?;

    TableDescriptor::new(catalog, schema.map(str::to_string), table, columns, constraints).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog::{CatalogValue, PlaceholderStyle};
    use async_trait::async_trait;

    /// Replies by matching the query text
    struct Scripted {
        count: i64,
        columns: Vec<CatalogRow>,
        constraints: Vec<CatalogRow>,
        seen: Vec<CatalogCommand>,
    }

    #[async_trait]
    impl CatalogConnection for Scripted {
        fn family(&self) -> ProviderFamily {
            ProviderFamily::PostgreSql
        }

        fn database(&self) -> &str {
            "clinic"
        }

        async fn execute_scalar(&mut self, command: &CatalogCommand) -> Result<Option<CatalogValue>> {
            self.seen.push(command.clone());
            Ok(Some(CatalogValue::Int(self.count)))
        }

        async fn execute_reader(&mut self, command: &CatalogCommand) -> Result<Vec<CatalogRow>> {
            self.seen.push(command.clone());
            if command.text().contains("key_column_usage") {
                Ok(self.constraints.clone())
            } else {
                Ok(self.columns.clone())
            }
        }
    }

    fn text(s: &str) -> CatalogValue {
        CatalogValue::Text(s.to_string())
    }

    fn column_row(name: &str, data_type: &str, ordinal: i64, nullable: bool) -> CatalogRow {
        CatalogRow::new(vec![
            text(name),
            text(data_type),
            CatalogValue::Int(ordinal),
            text("patient"),
            text("clinic"),
            text("public"),
            CatalogValue::Null,
            CatalogValue::Int(32),
            CatalogValue::Int(0),
            CatalogValue::Bool(nullable),
            CatalogValue::Null,
            CatalogValue::Null,
            CatalogValue::Bool(false),
            CatalogValue::Null,
            CatalogValue::Null,
            text("pg_catalog"),
            text("int4"),
        ])
    }

    #[test]
    fn test_queries_per_family() {
        assert!(queries_for(ProviderFamily::PostgreSql).columns.contains("::TEXT"));
        assert!(queries_for(ProviderFamily::MySql).columns.contains("COALESCE(@TableSchema, @TableCatalog)"));
        assert!(queries_for(ProviderFamily::SqlServer).columns.contains("IsComputed"));
        assert!(queries_for(ProviderFamily::Sqlite).table_exists.contains("information_schema.tables"));

        for family in ProviderFamily::ALL {
            let queries = queries_for(family);
            assert!(queries.columns.contains("ORDER BY c.ordinal_position, c.column_name"));
            assert!(queries.unique_constraints.contains("'PRIMARY KEY', 'UNIQUE'"));
        }
    }

    #[test]
    fn test_postgres_query_renders_positional() {
        let command = table_command(POSTGRES.table_exists, "clinic", None, "patient");
        let (sql, binds) = command.render(PlaceholderStyle::Dollar);
        assert!(sql.contains("$2::TEXT IS NULL OR table_schema = $2"));
        assert_eq!(binds.len(), 3);
    }

    #[test]
    fn test_column_from_row() {
        let column = column_from_row(&column_row("visits", "integer", 8, true)).unwrap();
        assert_eq!(column.name, "visits");
        assert_eq!(column.ordinal_position, 8);
        assert_eq!(column.table_catalog.as_deref(), Some("clinic"));
        assert_eq!(column.numeric_precision, Some(32));
        assert!(column.is_nullable);
        assert_eq!(column.udt_qualified_name().as_deref(), Some("pg_catalog.int4"));

        let short = CatalogRow::new(vec![text("visits")]);
        assert!(matches!(
            column_from_row(&short),
            Err(DbMetaError::MalformedCatalogRow { index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_describe_missing_table() {
        let mut conn = Scripted {
            count: 0,
            columns: vec![],
            constraints: vec![],
            seen: vec![],
        };
        let result = describe_table(&mut conn, "nope", None, None).await.unwrap();
        assert!(result.is_none());
        assert_eq!(conn.seen.len(), 1);
        assert_eq!(conn.seen[0].parameter("TableCatalog"), Some(Some("clinic")));
    }

    #[tokio::test]
    async fn test_describe_table_groups_constraints() {
        let mut conn = Scripted {
            count: 1,
            columns: vec![
                column_row("visits", "integer", 2, true),
                column_row("patient_id", "integer", 1, false),
            ],
            constraints: vec![CatalogRow::new(vec![text("patient_pkey"), text("patient_id")])],
            seen: vec![],
        };

        let table = describe_table(&mut conn, "patient", Some("public"), Some("other"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(table.catalog, "other");
        assert_eq!(table.columns()[0].name, "patient_id");
        let candidates = table.primary_key_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0][0].name, "patient_id");
        assert_eq!(conn.seen[1].parameter("TableSchema"), Some(Some("public")));
    }
}
