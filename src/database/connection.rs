//! Bundled drivers
//!
//! `sqlx` pools for PostgreSQL, MySQL and SQLite, and a `tiberius` client for
//! SQL Server, each exposed as a [`CatalogConnection`].

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tiberius::{Client, ColumnData, Config, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::connection::keys;
use crate::connection::ConnectionString;
use crate::database::catalog::{
    CatalogCommand, CatalogConnection, CatalogRow, CatalogValue, ConnectionFactory, PlaceholderStyle,
    UnsupportedConnectionFactory,
};
use crate::error::{DbMetaError, Result};
use crate::provider::{Provider, ProviderFamily};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Decode one cell, trying the integer widths before boolean and text
macro_rules! decode_cell {
    ($row:expr, $index:expr) => {{
        if let Ok(value) = $row.try_get::<Option<i64>, _>($index) {
            value.map_or(CatalogValue::Null, CatalogValue::Int)
        } else if let Ok(value) = $row.try_get::<Option<i32>, _>($index) {
            value.map_or(CatalogValue::Null, |v| CatalogValue::Int(i64::from(v)))
        } else if let Ok(value) = $row.try_get::<Option<i16>, _>($index) {
            value.map_or(CatalogValue::Null, |v| CatalogValue::Int(i64::from(v)))
        } else if let Ok(value) = $row.try_get::<Option<bool>, _>($index) {
            value.map_or(CatalogValue::Null, CatalogValue::Bool)
        } else if let Ok(value) = $row.try_get::<Option<String>, _>($index) {
            value.map_or(CatalogValue::Null, CatalogValue::Text)
        } else {
            return Err(DbMetaError::malformed_row($index, "integer, boolean or text"));
        }
    }};
}

macro_rules! decode_row {
    ($row:expr) => {{
        let row = $row;
        let mut values = Vec::with_capacity(row.len());
        for index in 0..row.len() {
            values.push(decode_cell!(row, index));
        }
        Ok::<CatalogRow, DbMetaError>(CatalogRow::new(values))
    }};
}

/// Database connection pool wrapper
///
/// This enum holds the actual database pool for the connected backend.
#[derive(Clone)]
pub enum DatabasePool {
    /// SQLite pool
    Sqlite(SqlitePool),
    /// PostgreSQL pool
    Postgres(PgPool),
    /// MySQL pool
    MySql(MySqlPool),
}

impl DatabasePool {
    pub fn family(&self) -> ProviderFamily {
        match self {
            DatabasePool::Sqlite(_) => ProviderFamily::Sqlite,
            DatabasePool::Postgres(_) => ProviderFamily::PostgreSql,
            DatabasePool::MySql(_) => ProviderFamily::MySql,
        }
    }

    /// Open a pool from a parsed connection string
    pub async fn connect(family: ProviderFamily, cs: &ConnectionString) -> Result<Self> {
        let settings = PoolSettings::from_connection_string(cs)?;

        match family {
            ProviderFamily::PostgreSql => {
                let pool = PgPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .min_connections(settings.min_connections)
                    .acquire_timeout(settings.connect_timeout)
                    .connect_with(postgres_options(cs)?)
                    .await?;
                Ok(DatabasePool::Postgres(pool))
            }
            ProviderFamily::MySql => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .min_connections(settings.min_connections)
                    .acquire_timeout(settings.connect_timeout)
                    .connect_with(mysql_options(cs)?)
                    .await?;
                Ok(DatabasePool::MySql(pool))
            }
            ProviderFamily::Sqlite => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(settings.max_connections)
                    .min_connections(settings.min_connections)
                    .acquire_timeout(settings.connect_timeout)
                    .connect_with(sqlite_options(cs)?)
                    .await?;
                Ok(DatabasePool::Sqlite(pool))
            }
            other => Err(DbMetaError::UnsupportedProvider(format!(
                "{} is not served by sqlx",
                other
            ))),
        }
    }

    /// Run a command and decode every row
    pub async fn fetch_rows(&self, command: &CatalogCommand) -> Result<Vec<CatalogRow>> {
        let (sql, binds) = command.render(PlaceholderStyle::for_family(self.family()));
        debug!("Catalog query on {}: {}", self.family(), sql.trim());

        match self {
            DatabasePool::Postgres(pool) => {
                let mut query = sqlx::query(&sql);
                for value in binds {
                    query = query.bind(value);
                }
                let rows = query.fetch_all(pool).await?;
                rows.iter().map(|row| decode_row!(row)).collect()
            }
            DatabasePool::MySql(pool) => {
                let mut query = sqlx::query(&sql);
                for value in binds {
                    query = query.bind(value);
                }
                let rows = query.fetch_all(pool).await?;
                rows.iter().map(|row| decode_row!(row)).collect()
            }
            DatabasePool::Sqlite(pool) => {
                let mut query = sqlx::query(&sql);
                for value in binds {
                    query = query.bind(value);
                }
                let rows = query.fetch_all(pool).await?;
                rows.iter().map(|row| decode_row!(row)).collect()
            }
        }
    }

    /// Test the connection
    pub async fn test_connection(&self) -> Result<()> {
        self.fetch_rows(&CatalogCommand::new("SELECT 1")).await.map(|_| ())
    }
}

struct PoolSettings {
    max_connections: u32,
    min_connections: u32,
    connect_timeout: Duration,
}

impl PoolSettings {
    fn from_connection_string(cs: &ConnectionString) -> Result<Self> {
        let max_connections = number(cs, keys::MAX_POOL_SIZE)?.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let min_connections = number(cs, keys::MIN_POOL_SIZE)?.unwrap_or(0).min(max_connections);
        let timeout = number(cs, keys::CONNECTION_TIMEOUT)?.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);

        Ok(Self {
            max_connections,
            min_connections,
            connect_timeout: Duration::from_secs(timeout),
        })
    }
}

fn number<T: FromStr>(cs: &ConnectionString, aliases: &[&str]) -> Result<Option<T>> {
    cs.get_any(aliases)
        .map(|value| {
            value.trim().parse().map_err(|_| {
                DbMetaError::InvalidConnectionString(format!("{} must be a number, got '{}'", aliases[0], value))
            })
        })
        .transpose()
}

fn flag(cs: &ConnectionString, aliases: &[&str]) -> Option<bool> {
    cs.get_any(aliases).map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "1" | "sspi"
        )
    })
}

fn postgres_options(cs: &ConnectionString) -> Result<PgConnectOptions> {
    let mut options = PgConnectOptions::new().host(cs.server().unwrap_or("localhost"));

    if let Some(port) = cs.port()? {
        options = options.port(port);
    }
    if let Some(user) = cs.user_name() {
        options = options.username(user);
    }
    if let Some(password) = cs.password() {
        options = options.password(password);
    }
    if let Some(database) = cs.database_name() {
        options = options.database(database);
    }
    if let Some(name) = cs.get_any(keys::APPLICATION_NAME) {
        options = options.application_name(name);
    }
    if let Some(search_path) = cs.get_any(keys::SEARCH_PATH) {
        options = options.options([("search_path", search_path)]);
    }
    if let Some(mode) = cs.get_any(keys::SSL_MODE) {
        let mode = match mode.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "disable" => PgSslMode::Disable,
            "allow" => PgSslMode::Allow,
            "prefer" => PgSslMode::Prefer,
            "require" => PgSslMode::Require,
            "verifyca" => PgSslMode::VerifyCa,
            "verifyfull" => PgSslMode::VerifyFull,
            _ => return Err(DbMetaError::InvalidConnectionString(format!("unknown SSL mode '{}'", mode))),
        };
        options = options.ssl_mode(mode);
    }

    Ok(options)
}

fn mysql_options(cs: &ConnectionString) -> Result<MySqlConnectOptions> {
    let mut options = MySqlConnectOptions::new().host(cs.server().unwrap_or("localhost"));

    if let Some(port) = cs.port()? {
        options = options.port(port);
    }
    if let Some(user) = cs.user_name() {
        options = options.username(user);
    }
    if let Some(password) = cs.password() {
        options = options.password(password);
    }
    if let Some(database) = cs.database_name() {
        options = options.database(database);
    }
    if let Some(mode) = cs.get_any(keys::SSL_MODE) {
        let mode = match mode.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "none" | "disabled" | "disable" => MySqlSslMode::Disabled,
            "preferred" | "prefer" => MySqlSslMode::Preferred,
            "required" | "require" => MySqlSslMode::Required,
            "verifyca" => MySqlSslMode::VerifyCa,
            "verifyfull" | "verifyidentity" => MySqlSslMode::VerifyIdentity,
            _ => return Err(DbMetaError::InvalidConnectionString(format!("unknown SSL mode '{}'", mode))),
        };
        options = options.ssl_mode(mode);
    }

    Ok(options)
}

fn sqlite_options(cs: &ConnectionString) -> Result<SqliteConnectOptions> {
    let path = cs
        .get_any(keys::DATA_SOURCE)
        .ok_or_else(|| DbMetaError::ConnectionStringMissingServer(cs.masked()))?;

    let options = if path.trim() == ":memory:" {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::new().filename(path)
    };

    Ok(options
        .create_if_missing(!flag(cs, keys::FAIL_IF_MISSING).unwrap_or(true))
        .read_only(flag(cs, keys::READ_ONLY).unwrap_or(false)))
}

/// Pooled sqlx connection
pub struct SqlxConnection {
    pool: DatabasePool,
    database: String,
}

impl SqlxConnection {
    /// Wrap a pool, asking the server for its current database
    pub async fn new(pool: DatabasePool) -> Result<Self> {
        let probe = match pool.family() {
            ProviderFamily::PostgreSql => "SELECT current_database()",
            ProviderFamily::MySql => "SELECT DATABASE()",
            _ => "SELECT 'main'",
        };
        let rows = pool.fetch_rows(&CatalogCommand::new(probe)).await?;
        let database = rows
            .first()
            .map(|row| row.get_opt_string(0))
            .transpose()?
            .flatten()
            .unwrap_or_default();

        Ok(Self { pool, database })
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

#[async_trait]
impl CatalogConnection for SqlxConnection {
    fn family(&self) -> ProviderFamily {
        self.pool.family()
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn execute_scalar(&mut self, command: &CatalogCommand) -> Result<Option<CatalogValue>> {
        let rows = self.pool.fetch_rows(command).await?;
        Ok(first_cell(rows))
    }

    async fn execute_reader(&mut self, command: &CatalogCommand) -> Result<Vec<CatalogRow>> {
        self.pool.fetch_rows(command).await
    }
}

/// Opens sqlx pools for PostgreSQL, MySQL and SQLite
#[derive(Debug, Clone, Copy)]
pub struct SqlxConnectionFactory {
    family: ProviderFamily,
}

impl SqlxConnectionFactory {
    pub fn new(family: ProviderFamily) -> Self {
        Self { family }
    }
}

#[async_trait]
impl ConnectionFactory for SqlxConnectionFactory {
    async fn connect(&self, connection_string: &ConnectionString) -> Result<Box<dyn CatalogConnection>> {
        info!("Opening {} pool: {}", self.family, connection_string);
        let pool = DatabasePool::connect(self.family, connection_string).await?;
        Ok(Box::new(SqlxConnection::new(pool).await?))
    }
}

/// Single SQL Server connection
pub struct TiberiusConnection {
    client: Client<Compat<TcpStream>>,
    database: String,
}

impl TiberiusConnection {
    pub async fn connect(connection_string: &ConnectionString) -> Result<Self> {
        let config = Config::from_ado_string(&connection_string.expose())?;

        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;

        let client = Client::connect(config, tcp.compat_write()).await?;
        let mut connection = Self {
            client,
            database: String::new(),
        };

        let database = connection
            .execute_scalar(&CatalogCommand::new("SELECT DB_NAME()"))
            .await?;
        if let Some(CatalogValue::Text(name)) = database {
            connection.database = name;
        }
        Ok(connection)
    }

    async fn fetch_rows(&mut self, command: &CatalogCommand) -> Result<Vec<CatalogRow>> {
        let (sql, binds) = command.render(PlaceholderStyle::AtP);
        debug!("Catalog query on SqlServer: {}", sql.trim());

        let mut query = Query::new(sql);
        for value in binds {
            query.bind(value);
        }

        let stream = query.query(&mut self.client).await?;
        let rows = stream.into_first_result().await?;

        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .map(|(index, data)| column_value(index, data))
                    .collect::<Result<Vec<_>>>()
                    .map(CatalogRow::new)
            })
            .collect()
    }
}

fn column_value(index: usize, data: ColumnData<'static>) -> Result<CatalogValue> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| CatalogValue::Int(i64::from(v))),
        ColumnData::I16(v) => v.map(|v| CatalogValue::Int(i64::from(v))),
        ColumnData::I32(v) => v.map(|v| CatalogValue::Int(i64::from(v))),
        ColumnData::I64(v) => v.map(CatalogValue::Int),
        ColumnData::Bit(v) => v.map(CatalogValue::Bool),
        ColumnData::String(v) => v.map(|s| CatalogValue::Text(s.into_owned())),
        ColumnData::Numeric(v) => v.map(|n| CatalogValue::Text(n.to_string())),
        _ => return Err(DbMetaError::malformed_row(index, "integer, bit or string")),
    };
    Ok(value.unwrap_or(CatalogValue::Null))
}

fn first_cell(rows: Vec<CatalogRow>) -> Option<CatalogValue> {
    rows.first()
        .map(|row| row.values().first().cloned().unwrap_or(CatalogValue::Null))
}

#[async_trait]
impl CatalogConnection for TiberiusConnection {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::SqlServer
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn execute_scalar(&mut self, command: &CatalogCommand) -> Result<Option<CatalogValue>> {
        let rows = self.fetch_rows(command).await?;
        Ok(first_cell(rows))
    }

    async fn execute_reader(&mut self, command: &CatalogCommand) -> Result<Vec<CatalogRow>> {
        self.fetch_rows(command).await
    }
}

/// Opens SQL Server connections through tiberius
#[derive(Debug, Clone, Copy, Default)]
pub struct TiberiusConnectionFactory;

#[async_trait]
impl ConnectionFactory for TiberiusConnectionFactory {
    async fn connect(&self, connection_string: &ConnectionString) -> Result<Box<dyn CatalogConnection>> {
        info!("Opening SqlServer connection: {}", connection_string);
        Ok(Box::new(TiberiusConnection::connect(connection_string).await?))
    }
}

/// Factory bundled for a family
pub fn builtin_factory(family: ProviderFamily) -> Arc<dyn ConnectionFactory> {
    match family {
        ProviderFamily::PostgreSql | ProviderFamily::MySql | ProviderFamily::Sqlite => {
            Arc::new(SqlxConnectionFactory::new(family))
        }
        ProviderFamily::SqlServer => Arc::new(TiberiusConnectionFactory),
        ProviderFamily::Oracle | ProviderFamily::Generic => Arc::new(UnsupportedConnectionFactory::new(family)),
    }
}

/// Register every family under its default driver name
pub fn register_builtin_providers() -> Vec<Arc<Provider>> {
    ProviderFamily::ALL
        .into_iter()
        .map(|family| Provider::register(family.default_invariant_name(), family, builtin_factory(family)))
        .collect()
}
