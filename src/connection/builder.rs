//! Per-family connection-string assembly

use super::ConnectionString;
use crate::provider::ProviderFamily;

/// Builds a [`ConnectionString`] with the keys a family's driver expects
///
/// ```
/// use dbmeta::connection::ConnectionStringBuilder;
/// use dbmeta::provider::ProviderFamily;
///
/// let cs = ConnectionStringBuilder::new(ProviderFamily::SqlServer)
///     .host("db")
///     .user("sa")
///     .database("app")
///     .build();
/// assert_eq!(cs.expose(), "Data Source=db,1433;User Id=sa;Initial Catalog=app");
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionStringBuilder {
    family: ProviderFamily,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    params: Vec<(String, String)>,
}

impl ConnectionStringBuilder {
    pub fn new(family: ProviderFamily) -> Self {
        Self {
            family,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            params: Vec::new(),
        }
    }

    /// Server address, or the database file path for SQLite
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Extra key appended after the family keys
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn build(self) -> ConnectionString {
        let mut cs = ConnectionString::new();
        let port = self.port.unwrap_or_else(|| self.family.default_port());
        let host = self.host.as_deref();

        match self.family {
            ProviderFamily::PostgreSql => {
                put(&mut cs, "Host", host);
                put_port(&mut cs, port);
                put(&mut cs, "Username", self.user.as_deref());
                put(&mut cs, "Password", self.password.as_deref());
                put(&mut cs, "Database", self.database.as_deref());
            }
            ProviderFamily::MySql | ProviderFamily::Generic => {
                put(&mut cs, "Server", host);
                put_port(&mut cs, port);
                put(&mut cs, "User Id", self.user.as_deref());
                put(&mut cs, "Password", self.password.as_deref());
                put(&mut cs, "Database", self.database.as_deref());
            }
            ProviderFamily::SqlServer => {
                if let Some(host) = host {
                    cs.set("Data Source", format!("{},{}", host, port));
                }
                put(&mut cs, "User Id", self.user.as_deref());
                put(&mut cs, "Password", self.password.as_deref());
                put(&mut cs, "Initial Catalog", self.database.as_deref());
            }
            ProviderFamily::Oracle => {
                if let Some(host) = host {
                    cs.set(
                        "Data Source",
                        tns_descriptor(host, port, self.database.as_deref()),
                    );
                }
                put(&mut cs, "User Id", self.user.as_deref());
                put(&mut cs, "Password", self.password.as_deref());
            }
            ProviderFamily::Sqlite => {
                put(&mut cs, "Data Source", host);
            }
        }

        for (key, value) in self.params {
            cs.push(key, value);
        }
        cs
    }
}

/// Build a connection string in one call
pub fn build_connection_string(
    family: ProviderFamily,
    host: &str,
    port: Option<u16>,
    user: Option<&str>,
    password: Option<&str>,
    database: Option<&str>,
    extra: &[(&str, &str)],
) -> ConnectionString {
    let mut builder = ConnectionStringBuilder::new(family).host(host);
    if let Some(port) = port {
        builder = builder.port(port);
    }
    if let Some(user) = user {
        builder = builder.user(user);
    }
    if let Some(password) = password {
        builder = builder.password(password);
    }
    if let Some(database) = database {
        builder = builder.database(database);
    }
    for (key, value) in extra {
        builder = builder.param(*key, *value);
    }
    builder.build()
}

/// Oracle TNS descriptor; `CONNECT_DATA` only when a service is known
pub fn tns_descriptor(host: &str, port: u16, service_name: Option<&str>) -> String {
    let address = format!("(ADDRESS=(PROTOCOL=TCP)(HOST={})(PORT={}))", host, port);
    match service_name.filter(|s| !s.is_empty()) {
        Some(service) => format!(
            "(DESCRIPTION={}(CONNECT_DATA=(SERVICE_NAME={})))",
            address, service
        ),
        None => format!("(DESCRIPTION={})", address),
    }
}

fn put(cs: &mut ConnectionString, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        cs.set(key, value);
    }
}

fn put_port(cs: &mut ConnectionString, port: u16) {
    if port != 0 {
        cs.set("Port", port.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_keys() {
        let cs = build_connection_string(
            ProviderFamily::PostgreSql,
            "localhost",
            None,
            Some("postgres"),
            Some("secret"),
            Some("clinic"),
            &[],
        );
        assert_eq!(
            cs.expose(),
            "Host=localhost;Port=5432;Username=postgres;Password=secret;Database=clinic"
        );
    }

    #[test]
    fn test_mysql_keys_with_extra_params() {
        let cs = ConnectionStringBuilder::new(ProviderFamily::MySql)
            .host("db")
            .port(3307)
            .user("root")
            .database("shop")
            .param("Allow User Variables", "true")
            .build();
        assert_eq!(
            cs.expose(),
            "Server=db;Port=3307;User Id=root;Database=shop;Allow User Variables=true"
        );
    }

    #[test]
    fn test_extra_params_appended_after_family_keys() {
        let cs = build_connection_string(
            ProviderFamily::PostgreSql,
            "db",
            Some(5433),
            None,
            None,
            None,
            &[("Port", "6000"), ("Pooling", "false")],
        );
        assert_eq!(cs.expose(), "Host=db;Port=5433;Port=6000;Pooling=false");
        assert_eq!(cs.get("Port"), Some("5433"));
        assert_eq!(cs.port().unwrap(), Some(5433));
    }

    #[test]
    fn test_sql_server_data_source_carries_port() {
        let cs = ConnectionStringBuilder::new(ProviderFamily::SqlServer)
            .host("sql01")
            .user("sa")
            .password("pw")
            .build();
        assert_eq!(cs.expose(), "Data Source=sql01,1433;User Id=sa;Password=pw");
    }

    #[test]
    fn test_oracle_descriptor() {
        let cs = ConnectionStringBuilder::new(ProviderFamily::Oracle)
            .host("ora")
            .user("scott")
            .password("tiger")
            .database("ORCLPDB1")
            .build();
        assert_eq!(
            cs.expose(),
            "Data Source=(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=ora)(PORT=1521))(CONNECT_DATA=(SERVICE_NAME=ORCLPDB1)));User Id=scott;Password=tiger"
        );

        assert_eq!(
            tns_descriptor("ora", 1522, None),
            "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=ora)(PORT=1522)))"
        );
    }

    #[test]
    fn test_sqlite_ignores_network_settings() {
        let cs = ConnectionStringBuilder::new(ProviderFamily::Sqlite)
            .host("/var/data/app.db")
            .port(9999)
            .user("ignored")
            .password("ignored")
            .build();
        assert_eq!(cs.expose(), "Data Source=/var/data/app.db");
    }

    #[test]
    fn test_generic_omits_zero_port() {
        let cs = build_connection_string(ProviderFamily::Generic, "h", None, None, None, None, &[]);
        assert_eq!(cs.expose(), "Server=h");
    }
}
