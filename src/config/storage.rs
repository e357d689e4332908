//! Configuration Storage
//!
//! Named connection profiles persisted as TOML in the user's configuration
//! directory.

use crate::connection::{ConnectionOptions, ConnectionStringBuilder};
use crate::error::{DbMetaError, Result};
use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Prefix of the environment variables that override profile fields
pub const ENV_PREFIX: &str = "DBMETA";

/// One named connection
///
/// Either `connection_string` or `host` must be given. When both are present
/// the connection string wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Family name ("postgresql", "mssql", ...) or registered driver name
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Extra connection-string keys
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl ConnectionProfile {
    /// Resolve the profile against a provider
    pub fn to_options(&self, provider: Arc<Provider>) -> Result<ConnectionOptions> {
        if let Some(ref connection_string) = self.connection_string {
            return ConnectionOptions::from_connection_string(provider, connection_string);
        }

        let host = self.host.as_deref().ok_or_else(|| {
            DbMetaError::Config(format!(
                "profile for {} needs either connection_string or host",
                self.provider
            ))
        })?;

        let mut builder = ConnectionStringBuilder::new(provider.family()).host(host);
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(ref username) = self.username {
            builder = builder.user(username.clone());
        }
        if let Some(ref password) = self.password {
            builder = builder.password(password.clone());
        }
        if let Some(ref database) = self.database {
            builder = builder.database(database.clone());
        }
        for (key, value) in &self.parameters {
            builder = builder.param(key.clone(), value.clone());
        }

        ConnectionOptions::from_parsed(provider, builder.build())
    }
}

/// Persistent configuration data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Profile used when a command names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_connection: Option<String>,
    /// Connection profiles by name
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionProfile>,
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the configuration directory path
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("dbmeta"))
            .ok_or_else(|| DbMetaError::Config("could not find configuration directory".to_string()))
    }

    /// Get the configuration file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Load configuration from disk; a missing file is an empty configuration
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No configuration at {}", path.display());
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DbMetaError::Config(format!("failed to parse config: {}", e)))
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| DbMetaError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Look up a profile; `None` picks the default connection
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &ConnectionProfile)> {
        let name = name
            .or(self.default_connection.as_deref())
            .ok_or_else(|| DbMetaError::Config("no connection named and no default_connection set".to_string()))?;

        self.connections
            .get_key_value(name)
            .map(|(name, profile)| (name.as_str(), profile))
            .ok_or_else(|| DbMetaError::Config(format!("unknown connection profile '{}'", name)))
    }

    /// Apply `DBMETA_<NAME>_PASSWORD` and `DBMETA_<NAME>_CONNECTION_STRING`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Same as [`Config::apply_env_overrides`] with a custom variable source
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, profile) in self.connections.iter_mut() {
            let prefix = env_prefix(name);

            if let Some(password) = lookup(&format!("{}_PASSWORD", prefix)) {
                debug!("Password for profile {} taken from environment", name);
                profile.password = Some(password);
            }
            if let Some(connection_string) = lookup(&format!("{}_CONNECTION_STRING", prefix)) {
                debug!("Connection string for profile {} taken from environment", name);
                profile.connection_string = Some(connection_string);
            }
        }
    }
}

/// `DBMETA_<NAME>` with the name upper-cased and non-alphanumerics as `_`
pub fn env_prefix(profile_name: &str) -> String {
    let name: String = profile_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}_{}", ENV_PREFIX, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::UnsupportedConnectionFactory;
    use crate::provider::ProviderFamily;

    const SAMPLE: &str = r#"
default_connection = "clinic"

[connections.clinic]
provider = "postgresql"
host = "localhost"
username = "postgres"
password = "secret"
database = "clinic"

[connections.clinic.parameters]
"Search Path" = "public"

[connections.legacy-erp]
provider = "mssql"
connection_string = "Data Source=sql01,1433;User Id=sa;Password=pw;Initial Catalog=erp"
"#;

    fn provider(family: ProviderFamily) -> Arc<Provider> {
        Arc::new(Provider::new(
            family.default_invariant_name(),
            family,
            Arc::new(UnsupportedConnectionFactory::new(family)),
        ))
    }

    #[test]
    fn test_parse_profiles() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.connections.len(), 2);

        let (name, profile) = config.profile(None).unwrap();
        assert_eq!(name, "clinic");
        assert_eq!(profile.port, None);
        assert_eq!(profile.parameters.get("Search Path").map(String::as_str), Some("public"));

        assert!(config.profile(Some("missing")).is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml_str("connections = 3"),
            Err(DbMetaError::Config(_))
        ));
    }

    #[test]
    fn test_profile_to_options_from_fields() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let (_, profile) = config.profile(Some("clinic")).unwrap();

        let options = profile.to_options(provider(ProviderFamily::PostgreSql)).unwrap();
        assert_eq!(options.host().address, "localhost");
        assert_eq!(options.host().port, 5432);
        assert_eq!(options.database_name(), Some("clinic"));
        assert_eq!(options.connection_string().get("Search Path"), Some("public"));
        assert!(!options.to_string().contains("secret"));
    }

    #[test]
    fn test_profile_to_options_from_connection_string() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let (_, profile) = config.profile(Some("legacy-erp")).unwrap();

        let options = profile.to_options(provider(ProviderFamily::SqlServer)).unwrap();
        assert_eq!(options.host().address, "sql01");
        assert_eq!(options.database_name(), Some("erp"));
    }

    #[test]
    fn test_profile_without_host_fails() {
        let profile = ConnectionProfile {
            provider: "mysql".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            profile.to_options(provider(ProviderFamily::MySql)),
            Err(DbMetaError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.apply_overrides_from(|key| match key {
            "DBMETA_CLINIC_PASSWORD" => Some("from-env".to_string()),
            "DBMETA_LEGACY_ERP_CONNECTION_STRING" => Some("Data Source=sql02;User Id=sa".to_string()),
            _ => None,
        });

        assert_eq!(config.connections["clinic"].password.as_deref(), Some("from-env"));
        assert_eq!(
            config.connections["legacy-erp"].connection_string.as_deref(),
            Some("Data Source=sql02;User Id=sa")
        );
        assert_eq!(env_prefix("legacy-erp"), "DBMETA_LEGACY_ERP");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("dbmeta-config-test-{}", std::process::id()))
            .join(CONFIG_FILE);
        let config = Config::from_toml_str(SAMPLE).unwrap();

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = fs::remove_dir_all(path.parent().unwrap());
        assert_eq!(Config::load_from(&path).unwrap(), Config::new());
    }
}
