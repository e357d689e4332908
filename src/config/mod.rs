//! Configuration module
//!
//! This module handles configuration management: named connection profiles
//! and their resolution against the provider registry.

pub mod storage;

pub use storage::{Config, ConnectionProfile};

use crate::connection::ConnectionOptions;
use crate::error::Result;
use crate::provider::{Provider, ProviderFamily};
use std::sync::Arc;

/// Application state
pub struct AppState {
    /// Loaded configuration, environment overrides applied
    pub config: Config,
}

impl AppState {
    /// Load the configuration from disk and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Config::load()?;
        config.apply_env_overrides();
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    /// Registered provider for a profile's `provider` field
    ///
    /// Driver names are tried first, then family names.
    pub fn provider_for(&self, profile: &ConnectionProfile) -> Result<Arc<Provider>> {
        Provider::get_instance_by_name(&profile.provider).or_else(|err| {
            match profile.provider.parse::<ProviderFamily>() {
                Ok(family) => Provider::get_instance(family),
                Err(_) => Err(err),
            }
        })
    }

    /// Connection options for a named profile, or the default one
    pub fn options(&self, name: Option<&str>) -> Result<ConnectionOptions> {
        let (_, profile) = self.config.profile(name)?;
        profile.to_options(self.provider_for(profile)?)
    }

    /// Profile names, sorted
    pub fn profile_names(&self) -> Vec<&str> {
        self.config.connections.keys().map(String::as_str).collect()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_config(Config::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::register_builtin_providers;
    use crate::error::DbMetaError;

    fn state() -> AppState {
        let config = Config::from_toml_str(
            r#"
[connections.local]
provider = "sqlite"
host = "/tmp/app.db"

[connections.warehouse]
provider = "PostgreSQL"
host = "wh"
database = "dw"

[connections.odd]
provider = "db2"
host = "mainframe"
"#,
        )
        .unwrap();
        AppState::with_config(config)
    }

    #[test]
    fn test_resolve_profiles_against_registry() {
        register_builtin_providers();
        let state = state();

        let local = state.options(Some("local")).unwrap();
        assert_eq!(local.family(), ProviderFamily::Sqlite);
        assert_eq!(local.database_name(), Some("/tmp/app.db"));

        let warehouse = state.options(Some("warehouse")).unwrap();
        assert_eq!(warehouse.family(), ProviderFamily::PostgreSql);
        assert_eq!(warehouse.database_name(), Some("dw"));

        assert!(matches!(
            state.options(Some("odd")),
            Err(DbMetaError::UnsupportedProvider(_))
        ));
        assert!(matches!(state.options(None), Err(DbMetaError::Config(_))));
    }

    #[test]
    fn test_profile_names_sorted() {
        assert_eq!(state().profile_names(), vec!["local", "odd", "warehouse"]);
    }
}
