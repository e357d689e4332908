//! Provider registry and capability model
//!
//! A [`ProviderFamily`] answers dialect questions (ports, casting syntax,
//! named parameters, which routine shapes exist). A [`Provider`] binds a
//! family to a driver name and a [`ConnectionFactory`], and lives in a
//! process-wide [`ProviderRegistry`].

pub mod routine;
pub mod statement;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::connection::ConnectionString;
use crate::database::catalog::ConnectionFactory;
use crate::error::{DbMetaError, Result};

pub use routine::{
    ParameterDescriptor, ParameterDirection, RoutineDescriptor, ValueExpression,
};
pub use statement::build_statement;

/// Supported database families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderFamily {
    /// Placeholder family with no dialect support
    Generic,
    PostgreSql,
    MySql,
    SqlServer,
    Oracle,
    Sqlite,
}

impl ProviderFamily {
    /// Every family, in declaration order
    pub const ALL: [ProviderFamily; 6] = [
        ProviderFamily::Generic,
        ProviderFamily::PostgreSql,
        ProviderFamily::MySql,
        ProviderFamily::SqlServer,
        ProviderFamily::Oracle,
        ProviderFamily::Sqlite,
    ];

    /// Determine the family from a connection URL scheme
    pub fn from_url(url: &str) -> Result<Self> {
        let url_lower = url.trim().to_lowercase();

        if url_lower.starts_with("postgres://") || url_lower.starts_with("postgresql://") {
            Ok(ProviderFamily::PostgreSql)
        } else if url_lower.starts_with("mysql://") || url_lower.starts_with("mariadb://") {
            Ok(ProviderFamily::MySql)
        } else if url_lower.starts_with("sqlite:") {
            Ok(ProviderFamily::Sqlite)
        } else if url_lower.starts_with("mssql://") || url_lower.starts_with("sqlserver://") {
            Ok(ProviderFamily::SqlServer)
        } else if url_lower.starts_with("oracle://") {
            Ok(ProviderFamily::Oracle)
        } else {
            Err(DbMetaError::UnsupportedProvider(format!(
                "Unable to determine provider from URL: {}",
                url
            )))
        }
    }

    /// Default TCP port, 0 when the family has none
    pub fn default_port(&self) -> u16 {
        match self {
            ProviderFamily::PostgreSql => 5432,
            ProviderFamily::MySql => 3306,
            ProviderFamily::SqlServer => 1433,
            ProviderFamily::Oracle => 1521,
            ProviderFamily::Sqlite | ProviderFamily::Generic => 0,
        }
    }

    /// Database a fresh server always has
    pub fn default_database_name(&self) -> Option<&'static str> {
        match self {
            ProviderFamily::PostgreSql => Some("postgres"),
            ProviderFamily::MySql => Some("information_schema"),
            ProviderFamily::SqlServer => Some("master"),
            ProviderFamily::Oracle | ProviderFamily::Sqlite | ProviderFamily::Generic => None,
        }
    }

    /// Schema objects land in when none is given
    pub fn default_schema_name(&self) -> Option<&'static str> {
        match self {
            ProviderFamily::PostgreSql => Some("public"),
            ProviderFamily::SqlServer => Some("dbo"),
            ProviderFamily::MySql
            | ProviderFamily::Oracle
            | ProviderFamily::Sqlite
            | ProviderFamily::Generic => None,
        }
    }

    /// Driver name used when registering the built-in providers
    pub fn default_invariant_name(&self) -> &'static str {
        match self {
            ProviderFamily::Generic => "generic",
            ProviderFamily::PostgreSql => "postgres",
            ProviderFamily::MySql => "mysql",
            ProviderFamily::SqlServer => "mssql",
            ProviderFamily::Oracle => "oracle",
            ProviderFamily::Sqlite => "sqlite",
        }
    }

    pub fn supports_named_parameters(&self) -> bool {
        matches!(
            self,
            ProviderFamily::PostgreSql | ProviderFamily::SqlServer | ProviderFamily::Oracle
        )
    }

    pub fn supports_enums(&self) -> bool {
        matches!(self, ProviderFamily::PostgreSql | ProviderFamily::MySql)
    }

    /// Whether routines of this kind exist in the dialect at all
    pub fn supports_routine_type(&self, kind: RoutineKind) -> bool {
        !matches!(
            (self, kind),
            (ProviderFamily::Sqlite, RoutineKind::StoredProcedure)
        )
    }

    /// Whether a routine of this kind may produce a result set
    pub fn routine_can_return_table(&self, kind: RoutineKind) -> bool {
        match kind {
            RoutineKind::StoredProcedure => true,
            RoutineKind::StoredFunction => match self {
                ProviderFamily::PostgreSql | ProviderFamily::SqlServer | ProviderFamily::Oracle => {
                    true
                }
                ProviderFamily::MySql | ProviderFamily::Sqlite | ProviderFamily::Generic => false,
            },
        }
    }

    /// Prefix of parameter markers inside statements
    pub fn parameter_prefix(&self) -> &'static str {
        match self {
            ProviderFamily::Oracle => ":",
            _ => "@",
        }
    }

    /// Wrap an expression in the dialect's cast syntax
    pub fn format_casting(&self, expression: &str, type_name: &str) -> String {
        match self {
            ProviderFamily::PostgreSql => format!("{}::{}", expression, type_name),
            _ => format!("CAST({} AS {})", expression, type_name),
        }
    }

    /// Named-argument form of a parameter
    ///
    /// Only PostgreSQL (`name => expr`) and SQL Server (`name = expr`) have a
    /// named-argument syntax. The other dialects fall back to the bare
    /// prefixed name, and the value expression is not used.
    pub fn format_named_parameter(&self, name: &str, expression: &str) -> String {
        match self {
            ProviderFamily::PostgreSql => format!("{} => {}", name, expression),
            ProviderFamily::SqlServer => format!("{} = {}", name, expression),
            _ => format!("{}{}", self.parameter_prefix(), name),
        }
    }

    /// Whether `information_schema` views are available
    pub fn supports_information_schema(&self) -> bool {
        matches!(
            self,
            ProviderFamily::PostgreSql | ProviderFamily::MySql | ProviderFamily::SqlServer
        )
    }
}

impl FromStr for ProviderFamily {
    type Err = DbMetaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(ProviderFamily::PostgreSql),
            "mysql" | "mariadb" => Ok(ProviderFamily::MySql),
            "sqlserver" | "mssql" | "microsoft sql server" => Ok(ProviderFamily::SqlServer),
            "oracle" => Ok(ProviderFamily::Oracle),
            "sqlite" | "sqlite3" => Ok(ProviderFamily::Sqlite),
            "generic" => Ok(ProviderFamily::Generic),
            _ => Err(DbMetaError::UnsupportedProvider(s.to_string())),
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Kind of a database routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutineKind {
    StoredProcedure,
    StoredFunction,
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A registered database provider
pub struct Provider {
    family: ProviderFamily,
    invariant_name: String,
    factory: Arc<dyn ConnectionFactory>,
}

impl Provider {
    pub fn new(
        invariant_name: impl Into<String>,
        family: ProviderFamily,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Self {
        Self {
            family,
            invariant_name: invariant_name.into(),
            factory,
        }
    }

    /// Register a provider in the process-wide registry
    pub fn register(
        invariant_name: &str,
        family: ProviderFamily,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Arc<Provider> {
        PROVIDERS.register(invariant_name, family, factory)
    }

    /// Look up the registered provider for a family
    pub fn get_instance(family: ProviderFamily) -> Result<Arc<Provider>> {
        PROVIDERS.get(family)
    }

    /// Look up a registered provider by driver name
    pub fn get_instance_by_name(invariant_name: &str) -> Result<Arc<Provider>> {
        PROVIDERS.get_by_name(invariant_name)
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    pub fn invariant_name(&self) -> &str {
        &self.invariant_name
    }

    pub fn factory(&self) -> &Arc<dyn ConnectionFactory> {
        &self.factory
    }

    pub fn default_port(&self) -> u16 {
        self.family.default_port()
    }

    pub fn default_database_name(&self) -> Option<&'static str> {
        self.family.default_database_name()
    }

    pub fn default_schema_name(&self) -> Option<&'static str> {
        self.family.default_schema_name()
    }

    pub fn supports_named_parameters(&self) -> bool {
        self.family.supports_named_parameters()
    }

    pub fn supports_enums(&self) -> bool {
        self.family.supports_enums()
    }

    pub fn supports_routine_type(&self, kind: RoutineKind) -> bool {
        self.family.supports_routine_type(kind)
    }

    pub fn routine_can_return_table(&self, kind: RoutineKind) -> bool {
        self.family.routine_can_return_table(kind)
    }

    pub fn parameter_prefix(&self) -> &'static str {
        self.family.parameter_prefix()
    }

    pub fn format_casting(&self, expression: &str, type_name: &str) -> String {
        self.family.format_casting(expression, type_name)
    }

    pub fn format_named_parameter(&self, name: &str, expression: &str) -> String {
        self.family.format_named_parameter(name, expression)
    }

    /// Synthesize the call statement for a routine
    pub fn build_statement(&self, routine: &RoutineDescriptor) -> Result<String> {
        build_statement(self.family, routine)
    }

    /// Empty connection string from the driver factory
    pub fn create_connection_string(&self) -> ConnectionString {
        self.factory.create_connection_string()
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("family", &self.family)
            .field("invariant_name", &self.invariant_name)
            .finish()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.family, self.invariant_name)
    }
}

#[derive(Default)]
struct RegistryState {
    by_family: HashMap<ProviderFamily, Arc<Provider>>,
    by_name: HashMap<String, ProviderFamily>,
}

/// Providers keyed by family and by driver name
///
/// One provider per family; registering a family again replaces it.
#[derive(Default)]
pub struct ProviderRegistry {
    state: RwLock<RegistryState>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the provider for `family`
    pub fn register(
        &self,
        invariant_name: &str,
        family: ProviderFamily,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Arc<Provider> {
        let provider = Arc::new(Provider::new(invariant_name, family, factory));
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = state.by_family.insert(family, Arc::clone(&provider)) {
            warn!(
                family = %family,
                previous = %previous.invariant_name,
                "Replacing registered provider"
            );
            let previous_key = previous.invariant_name.to_lowercase();
            if state.by_name.get(&previous_key) == Some(&family) {
                state.by_name.remove(&previous_key);
            }
        }
        if let Some(displaced) = state
            .by_name
            .insert(invariant_name.to_lowercase(), family)
            .filter(|displaced| *displaced != family)
        {
            // the other family stays registered, reachable by family only
            warn!(
                family = %displaced,
                invariant_name,
                "Driver name moved to another family"
            );
        }

        info!(family = %family, invariant_name, "Registered provider");
        provider
    }

    pub fn get(&self, family: ProviderFamily) -> Result<Arc<Provider>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .by_family
            .get(&family)
            .cloned()
            .ok_or_else(|| DbMetaError::UnsupportedProvider(family.to_string()))
    }

    pub fn get_by_name(&self, invariant_name: &str) -> Result<Arc<Provider>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .by_name
            .get(&invariant_name.to_lowercase())
            .and_then(|family| state.by_family.get(family))
            .cloned()
            .ok_or_else(|| DbMetaError::UnsupportedProvider(invariant_name.to_string()))
    }

    /// Registered families, sorted
    pub fn families(&self) -> Vec<ProviderFamily> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut families: Vec<_> = state.by_family.keys().copied().collect();
        families.sort();
        families
    }
}

static PROVIDERS: LazyLock<ProviderRegistry> = LazyLock::new(ProviderRegistry::new);

/// Process-wide provider registry
pub fn registry() -> &'static ProviderRegistry {
    &PROVIDERS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog::UnsupportedConnectionFactory;

    fn factory(family: ProviderFamily) -> Arc<dyn ConnectionFactory> {
        Arc::new(UnsupportedConnectionFactory::new(family))
    }

    #[test]
    fn test_family_from_str() {
        assert_eq!("postgres".parse::<ProviderFamily>().unwrap(), ProviderFamily::PostgreSql);
        assert_eq!("MariaDB".parse::<ProviderFamily>().unwrap(), ProviderFamily::MySql);
        assert_eq!("mssql".parse::<ProviderFamily>().unwrap(), ProviderFamily::SqlServer);
        assert_eq!("oracle".parse::<ProviderFamily>().unwrap(), ProviderFamily::Oracle);
        assert_eq!("sqlite3".parse::<ProviderFamily>().unwrap(), ProviderFamily::Sqlite);
        assert!("db2".parse::<ProviderFamily>().is_err());
    }

    #[test]
    fn test_family_from_url() {
        assert_eq!(
            ProviderFamily::from_url("postgresql://localhost/test").unwrap(),
            ProviderFamily::PostgreSql
        );
        assert_eq!(
            ProviderFamily::from_url("mysql://localhost/test").unwrap(),
            ProviderFamily::MySql
        );
        assert_eq!(
            ProviderFamily::from_url("sqlite:test.db").unwrap(),
            ProviderFamily::Sqlite
        );
        assert!(ProviderFamily::from_url("invalid://url").is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ProviderFamily::PostgreSql.default_port(), 5432);
        assert_eq!(ProviderFamily::MySql.default_port(), 3306);
        assert_eq!(ProviderFamily::SqlServer.default_port(), 1433);
        assert_eq!(ProviderFamily::Oracle.default_port(), 1521);
        assert_eq!(ProviderFamily::Sqlite.default_port(), 0);
        assert_eq!(ProviderFamily::SqlServer.default_database_name(), Some("master"));
        assert_eq!(ProviderFamily::MySql.default_database_name(), Some("information_schema"));
        assert_eq!(ProviderFamily::Oracle.default_database_name(), None);
        assert_eq!(ProviderFamily::PostgreSql.default_schema_name(), Some("public"));
        assert_eq!(ProviderFamily::MySql.default_schema_name(), None);
    }

    #[test]
    fn test_routine_support_matrix() {
        for family in ProviderFamily::ALL {
            assert!(family.routine_can_return_table(RoutineKind::StoredProcedure));
        }
        assert!(!ProviderFamily::Sqlite.supports_routine_type(RoutineKind::StoredProcedure));
        assert!(ProviderFamily::Sqlite.supports_routine_type(RoutineKind::StoredFunction));
        assert!(!ProviderFamily::MySql.routine_can_return_table(RoutineKind::StoredFunction));
        assert!(ProviderFamily::Oracle.routine_can_return_table(RoutineKind::StoredFunction));
    }

    #[test]
    fn test_casting_and_named_parameters() {
        assert_eq!(ProviderFamily::PostgreSql.format_casting("@p", "my_enum"), "@p::my_enum");
        assert_eq!(ProviderFamily::Oracle.format_casting(":p", "NUMBER"), "CAST(:p AS NUMBER)");
        assert_eq!(ProviderFamily::PostgreSql.format_named_parameter("p", "@p"), "p => @p");
        assert_eq!(ProviderFamily::SqlServer.format_named_parameter("p", "@p"), "p = @p");
        // expression is dropped outside PostgreSQL and SQL Server
        assert_eq!(
            ProviderFamily::MySql.format_named_parameter("p", "CAST(@p AS CHAR)"),
            "@p"
        );
        assert_eq!(ProviderFamily::Oracle.format_named_parameter("p", "x"), ":p");
    }

    #[test]
    fn test_registry_register_and_lookup() {
        let registry = ProviderRegistry::new();
        let provider = registry.register("Npgsql", ProviderFamily::PostgreSql, factory(ProviderFamily::PostgreSql));

        assert_eq!(provider.family(), ProviderFamily::PostgreSql);
        assert_eq!(registry.get(ProviderFamily::PostgreSql).unwrap().invariant_name(), "Npgsql");
        assert_eq!(
            registry.get_by_name("npgsql").unwrap().family(),
            ProviderFamily::PostgreSql
        );
        assert!(matches!(
            registry.get(ProviderFamily::MySql),
            Err(DbMetaError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_registry_overwrite_replaces_name_key() {
        let registry = ProviderRegistry::new();
        registry.register("first", ProviderFamily::MySql, factory(ProviderFamily::MySql));
        registry.register("second", ProviderFamily::MySql, factory(ProviderFamily::MySql));

        assert_eq!(registry.families(), vec![ProviderFamily::MySql]);
        assert_eq!(registry.get(ProviderFamily::MySql).unwrap().invariant_name(), "second");
        assert!(registry.get_by_name("first").is_err());
    }

    #[test]
    fn test_registry_name_claimed_by_other_family_keeps_provider() {
        let registry = ProviderRegistry::new();
        registry.register("odbc", ProviderFamily::Generic, factory(ProviderFamily::Generic));
        registry.register("odbc", ProviderFamily::SqlServer, factory(ProviderFamily::SqlServer));

        assert_eq!(
            registry.families(),
            vec![ProviderFamily::Generic, ProviderFamily::SqlServer]
        );
        assert_eq!(registry.get(ProviderFamily::Generic).unwrap().invariant_name(), "odbc");
        assert_eq!(registry.get_by_name("odbc").unwrap().family(), ProviderFamily::SqlServer);

        // replacing Generic must not drop the name now held by SqlServer
        registry.register("generic", ProviderFamily::Generic, factory(ProviderFamily::Generic));
        assert_eq!(registry.get_by_name("odbc").unwrap().family(), ProviderFamily::SqlServer);
        assert_eq!(registry.get_by_name("generic").unwrap().family(), ProviderFamily::Generic);
    }

    #[test]
    fn test_provider_display() {
        let provider = Provider::new("mssql", ProviderFamily::SqlServer, factory(ProviderFamily::SqlServer));
        assert_eq!(provider.to_string(), "SqlServer (mssql)");
    }
}
