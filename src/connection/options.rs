//! Connection options
//!
//! A [`ConnectionOptions`] ties a [`Provider`] to a resolved host, database
//! and connection string, whichever way it was constructed.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::{keys, ConnectionString, ConnectionStringBuilder};
use crate::database::catalog::CatalogConnection;
use crate::error::{DbMetaError, Result};
use crate::provider::{Provider, ProviderFamily};

/// Server address and port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbHost {
    pub address: String,
    pub port: u16,
}

impl DbHost {
    /// Host with the family's default port when `port` is `None`
    pub fn new(family: ProviderFamily, address: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            address: address.into(),
            port: port.unwrap_or_else(|| family.default_port()),
        }
    }

    /// Resolve the host from a connection string
    ///
    /// Understands SQL Server `host,port`, Oracle TNS descriptors and Oracle
    /// `host:port/service` in addition to a plain server plus `Port` key.
    pub fn resolve(family: ProviderFamily, cs: &ConnectionString) -> Result<Self> {
        let server = cs
            .server()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DbMetaError::ConnectionStringMissingServer(cs.masked()))?;

        let (address, inline_port) = match family {
            ProviderFamily::SqlServer => match server.split_once(',') {
                Some((host, port)) => (host.trim(), Some(port.trim())),
                None => (server, None),
            },
            ProviderFamily::Oracle if server.starts_with('(') => {
                let host = tns_value(server, "HOST")
                    .ok_or_else(|| DbMetaError::ConnectionStringMissingServer(cs.masked()))?;
                (host, tns_value(server, "PORT"))
            }
            ProviderFamily::Oracle => {
                let host_port = server.split('/').next().unwrap_or(server);
                match host_port.rsplit_once(':') {
                    Some((host, port)) => (host, Some(port)),
                    None => (host_port, None),
                }
            }
            _ => (server, None),
        };

        let port = match inline_port {
            Some(port) => Some(port.parse::<u16>().map_err(|_| {
                DbMetaError::InvalidConnectionString(format!(
                    "port '{}' is not a valid port number",
                    port
                ))
            })?),
            None => cs.port()?,
        };

        Ok(Self::new(family, address, port))
    }
}

impl fmt::Display for DbHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// User name and password
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_name: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("password", &keys::PASSWORD_MASK)
            .finish()
    }
}

/// Per-connection overrides applied on top of stored options
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub user_name: Option<String>,
    pub password: Option<String>,
    /// Switch to the provider's default database (ignored for Oracle and SQLite)
    pub default_database: bool,
}

impl ConnectionOverrides {
    pub fn user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn default_database(mut self) -> Self {
        self.default_database = true;
        self
    }
}

/// Resolved options for connecting through a provider
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    provider: Arc<Provider>,
    host: DbHost,
    database_name: Option<String>,
    connection_string: ConnectionString,
}

impl ConnectionOptions {
    /// Options from an explicit host and credentials
    pub fn new(
        provider: Arc<Provider>,
        host: DbHost,
        credentials: &Credentials,
        database_name: Option<&str>,
    ) -> Self {
        let mut builder = ConnectionStringBuilder::new(provider.family())
            .host(host.address.clone())
            .port(host.port)
            .user(credentials.user_name.clone())
            .password(credentials.password.clone());
        if let Some(database) = database_name {
            builder = builder.database(database);
        }

        Self {
            database_name: database_name.map(str::to_string),
            connection_string: builder.build(),
            provider,
            host,
        }
    }

    /// Options from a raw connection string
    pub fn from_connection_string(provider: Arc<Provider>, connection_string: &str) -> Result<Self> {
        let cs = ConnectionString::parse(connection_string)?;
        Self::from_parsed(provider, cs)
    }

    pub fn from_parsed(provider: Arc<Provider>, cs: ConnectionString) -> Result<Self> {
        let host = DbHost::resolve(provider.family(), &cs)?;
        let database_name = resolve_database_name(provider.family(), &cs);

        Ok(Self {
            provider,
            host,
            database_name,
            connection_string: cs,
        })
    }

    /// Options for the provider registered under `family`
    pub fn for_family(family: ProviderFamily, connection_string: &str) -> Result<Self> {
        Self::from_connection_string(Provider::get_instance(family)?, connection_string)
    }

    /// Options for the provider registered under a driver name
    pub fn for_driver(invariant_name: &str, connection_string: &str) -> Result<Self> {
        Self::from_connection_string(Provider::get_instance_by_name(invariant_name)?, connection_string)
    }

    pub fn provider(&self) -> &Arc<Provider> {
        &self.provider
    }

    pub fn family(&self) -> ProviderFamily {
        self.provider.family()
    }

    pub fn host(&self) -> &DbHost {
        &self.host
    }

    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    pub fn connection_string(&self) -> &ConnectionString {
        &self.connection_string
    }

    /// Connection string with the overrides applied; the options are unchanged
    pub fn resolve_connection_string(&self, overrides: &ConnectionOverrides) -> ConnectionString {
        let mut cs = self.connection_string.clone();

        if let Some(user_name) = overrides.user_name.as_deref().filter(|u| !u.is_empty()) {
            cs.set_user_name(user_name);
        }
        if let Some(password) = overrides.password.as_deref().filter(|p| !p.is_empty()) {
            cs.set_password(password);
        }

        let family = self.family();
        if overrides.default_database
            && !matches!(family, ProviderFamily::Oracle | ProviderFamily::Sqlite)
        {
            if let Some(database) = family.default_database_name() {
                cs.set_database_name(database);
            }
        }
        cs
    }

    /// Open a connection through the provider's factory
    pub async fn connect(&self, overrides: &ConnectionOverrides) -> Result<Box<dyn CatalogConnection>> {
        let cs = self.resolve_connection_string(overrides);
        info!(
            provider = %self.provider,
            connection_string = %cs,
            "Opening connection"
        );
        self.provider.factory().connect(&cs).await
    }
}

impl fmt::Display for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.family(), self.connection_string.masked())
    }
}

fn resolve_database_name(family: ProviderFamily, cs: &ConnectionString) -> Option<String> {
    let name = match family {
        ProviderFamily::Sqlite => cs.get_any(keys::DATA_SOURCE),
        ProviderFamily::Oracle => {
            return cs
                .get_any(keys::SERVICE_NAME)
                .map(str::to_string)
                .or_else(|| {
                    let source = cs.get_any(keys::DATA_SOURCE)?;
                    if source.starts_with('(') {
                        tns_value(source, "SERVICE_NAME")
                            .or_else(|| tns_value(source, "SID"))
                            .map(str::to_string)
                    } else {
                        source.split_once('/').map(|(_, service)| service.to_string())
                    }
                });
        }
        // "Data Source" names the server for these families
        _ => keys::DATABASE_NAME
            .iter()
            .filter(|key| !keys::DATA_SOURCE.contains(*key))
            .find_map(|key| cs.get(key)),
    };
    name.map(str::to_string)
}

/// Value of `(KEY=value)` inside a TNS descriptor
fn tns_value<'a>(descriptor: &'a str, key: &str) -> Option<&'a str> {
    let upper = descriptor.to_ascii_uppercase();
    let needle = format!("({}=", key);
    let start = upper.find(&needle)? + needle.len();
    let end = descriptor[start..].find(')')? + start;
    Some(descriptor[start..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog::UnsupportedConnectionFactory;

    fn provider(family: ProviderFamily) -> Arc<Provider> {
        Arc::new(Provider::new(
            family.default_invariant_name(),
            family,
            Arc::new(UnsupportedConnectionFactory::new(family)),
        ))
    }

    fn parse(text: &str) -> ConnectionString {
        ConnectionString::parse(text).unwrap()
    }

    #[test]
    fn test_resolve_host_plain() {
        let host = DbHost::resolve(ProviderFamily::PostgreSql, &parse("Host=db;Port=6432")).unwrap();
        assert_eq!(host, DbHost { address: "db".into(), port: 6432 });

        let host = DbHost::resolve(ProviderFamily::MySql, &parse("Server=db")).unwrap();
        assert_eq!(host.port, 3306);
    }

    #[test]
    fn test_resolve_host_sql_server_comma_port() {
        let host = DbHost::resolve(ProviderFamily::SqlServer, &parse("Data Source=sql01,14330")).unwrap();
        assert_eq!(host.address, "sql01");
        assert_eq!(host.port, 14330);
    }

    #[test]
    fn test_resolve_host_oracle_forms() {
        let cs = parse("Data Source=(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=ora)(PORT=1522))(CONNECT_DATA=(SERVICE_NAME=XE)))");
        let host = DbHost::resolve(ProviderFamily::Oracle, &cs).unwrap();
        assert_eq!(host.to_string(), "ora:1522");
        assert_eq!(resolve_database_name(ProviderFamily::Oracle, &cs).as_deref(), Some("XE"));

        let cs = parse("Data Source=ora:1523/ORCLPDB1");
        let host = DbHost::resolve(ProviderFamily::Oracle, &cs).unwrap();
        assert_eq!(host.to_string(), "ora:1523");
        assert_eq!(resolve_database_name(ProviderFamily::Oracle, &cs).as_deref(), Some("ORCLPDB1"));
    }

    #[test]
    fn test_resolve_host_missing_server_is_masked() {
        let err = DbHost::resolve(ProviderFamily::PostgreSql, &parse("Port=1;Password=secret")).unwrap_err();
        match err {
            DbMetaError::ConnectionStringMissingServer(cs) => {
                assert!(!cs.contains("secret"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_both_construction_paths_agree() {
        let pg = provider(ProviderFamily::PostgreSql);
        let from_host = ConnectionOptions::new(
            Arc::clone(&pg),
            DbHost::new(ProviderFamily::PostgreSql, "localhost", None),
            &Credentials::new("postgres", "secret"),
            Some("clinic"),
        );
        let from_string =
            ConnectionOptions::from_connection_string(pg, &from_host.connection_string().expose())
                .unwrap();

        assert_eq!(from_host.connection_string(), from_string.connection_string());
        assert_eq!(from_host.host(), from_string.host());
        assert_eq!(from_string.database_name(), Some("clinic"));
    }

    #[test]
    fn test_display_masks_password() {
        let options = ConnectionOptions::from_connection_string(
            provider(ProviderFamily::MySql),
            "Server=localhost;Port=3306;Database=mysql;Uid=root;Pwd=root",
        )
        .unwrap();
        assert_eq!(
            options.to_string(),
            "[MySql] Server=localhost;Port=3306;Database=mysql;Uid=root;Pwd=********"
        );
    }

    #[test]
    fn test_overrides_produce_transient_string() {
        let options = ConnectionOptions::from_connection_string(
            provider(ProviderFamily::PostgreSql),
            "Host=db;Database=clinic;Username=app;Password=pw",
        )
        .unwrap();
        let overrides = ConnectionOverrides::default()
            .user_name("admin")
            .password("root")
            .default_database();

        let cs = options.resolve_connection_string(&overrides);
        assert_eq!(cs.expose(), "Host=db;Database=postgres;Username=admin;Password=root");
        assert_eq!(options.connection_string().user_name(), Some("app"));
    }

    #[test]
    fn test_mysql_default_database_is_information_schema() {
        let options = ConnectionOptions::from_connection_string(
            provider(ProviderFamily::MySql),
            "Server=localhost;Database=shop;User Id=root",
        )
        .unwrap();
        let cs = options.resolve_connection_string(&ConnectionOverrides::default().default_database());
        assert_eq!(cs.database_name(), Some("information_schema"));
        assert_eq!(options.database_name(), Some("shop"));
    }

    #[test]
    fn test_default_database_ignored_for_oracle_and_sqlite() {
        let options = ConnectionOptions::from_connection_string(
            provider(ProviderFamily::Sqlite),
            "Data Source=app.db",
        )
        .unwrap();
        let cs = options.resolve_connection_string(&ConnectionOverrides::default().default_database());
        assert_eq!(cs.expose(), "Data Source=app.db");
        assert_eq!(options.database_name(), Some("app.db"));
    }

    #[test]
    fn test_sql_server_database_does_not_fall_back_to_data_source() {
        let options = ConnectionOptions::from_connection_string(
            provider(ProviderFamily::SqlServer),
            "Data Source=sql01,1433;User Id=sa",
        )
        .unwrap();
        assert_eq!(options.database_name(), None);
    }

    #[test]
    fn test_credentials_debug_is_masked() {
        let credentials = Credentials::new("sa", "hunter2");
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }
}
