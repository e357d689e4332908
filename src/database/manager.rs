//! Introspector
//!
//! Owns a catalog connection and runs table introspection against it,
//! optionally bounding every catalog query with a timeout.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::connection::{ConnectionOptions, ConnectionOverrides};
use crate::database::catalog::{CatalogCommand, CatalogConnection, CatalogRow, CatalogValue};
use crate::database::indexer;
use crate::database::schema::{ColumnDescriptor, TableDescriptor};
use crate::error::{DbMetaError, Result};
use crate::provider::ProviderFamily;

/// Introspection over a live connection
///
/// Nothing is cached: every call queries the catalog again.
pub struct Introspector {
    connection: Box<dyn CatalogConnection>,
    timeout: Option<Duration>,
}

impl Introspector {
    pub fn new(connection: Box<dyn CatalogConnection>) -> Self {
        Self {
            connection,
            timeout: None,
        }
    }

    /// Open a connection through the provider's factory
    ///
    /// # Example
    /// ```no_run
    /// use dbmeta::connection::{ConnectionOptions, ConnectionOverrides};
    /// use dbmeta::database::manager::Introspector;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     dbmeta::database::register_builtin_providers();
    ///     let options = ConnectionOptions::for_driver("postgres", "Host=localhost;Database=clinic")?;
    ///     let mut introspector = Introspector::connect(&options, &ConnectionOverrides::default()).await?;
    ///     let table = introspector.describe_table("patient", Some("public"), None).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(options: &ConnectionOptions, overrides: &ConnectionOverrides) -> Result<Self> {
        Ok(Self::new(options.connect(overrides).await?))
    }

    /// Bound every catalog query; an elapsed query fails with `Timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn family(&self) -> ProviderFamily {
        self.connection.family()
    }

    /// Current database of the underlying connection
    pub fn database(&self) -> &str {
        self.connection.database()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn table_exists(&mut self, table: &str, schema: Option<&str>, catalog: Option<&str>) -> Result<bool> {
        let catalog = catalog.unwrap_or(self.connection.database()).to_string();
        indexer::table_exists(&mut self.timed(), &catalog, schema, table).await
    }

    pub async fn columns(
        &mut self,
        table: &str,
        schema: Option<&str>,
        catalog: Option<&str>,
    ) -> Result<Vec<ColumnDescriptor>> {
        let catalog = catalog.unwrap_or(self.connection.database()).to_string();
        indexer::fetch_columns(&mut self.timed(), &catalog, schema, table).await
    }

    /// See [`indexer::describe_table`]
    pub async fn describe_table(
        &mut self,
        table: &str,
        schema: Option<&str>,
        catalog: Option<&str>,
    ) -> Result<Option<TableDescriptor>> {
        indexer::describe_table(&mut self.timed(), table, schema, catalog).await
    }

    /// Give the connection back
    pub fn into_inner(self) -> Box<dyn CatalogConnection> {
        self.connection
    }

    fn timed(&mut self) -> Timed<'_> {
        Timed {
            inner: self.connection.as_mut(),
            timeout: self.timeout,
        }
    }
}

/// Connection view applying the timeout to each query
struct Timed<'a> {
    inner: &'a mut dyn CatalogConnection,
    timeout: Option<Duration>,
}

impl<'a> Timed<'a> {
    async fn bounded<T, F>(timeout: Option<Duration>, future: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, future).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("Catalog query exceeded {:?}", limit);
                    Err(DbMetaError::Timeout(limit))
                }
            },
            None => future.await,
        }
    }
}

#[async_trait]
impl<'a> CatalogConnection for Timed<'a> {
    fn family(&self) -> ProviderFamily {
        self.inner.family()
    }

    fn database(&self) -> &str {
        self.inner.database()
    }

    async fn execute_scalar(&mut self, command: &CatalogCommand) -> Result<Option<CatalogValue>> {
        let timeout = self.timeout;
        Self::bounded(timeout, self.inner.execute_scalar(command)).await
    }

    async fn execute_reader(&mut self, command: &CatalogCommand) -> Result<Vec<CatalogRow>> {
        let timeout = self.timeout;
        Self::bounded(timeout, self.inner.execute_reader(command)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl CatalogConnection for Slow {
        fn family(&self) -> ProviderFamily {
            ProviderFamily::SqlServer
        }

        fn database(&self) -> &str {
            "master"
        }

        async fn execute_scalar(&mut self, _command: &CatalogCommand) -> Result<Option<CatalogValue>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(CatalogValue::Int(1)))
        }

        async fn execute_reader(&mut self, _command: &CatalogCommand) -> Result<Vec<CatalogRow>> {
            Ok(Vec::new())
        }
    }

    struct Empty;

    #[async_trait]
    impl CatalogConnection for Empty {
        fn family(&self) -> ProviderFamily {
            ProviderFamily::MySql
        }

        fn database(&self) -> &str {
            "shop"
        }

        async fn execute_scalar(&mut self, _command: &CatalogCommand) -> Result<Option<CatalogValue>> {
            Ok(None)
        }

        async fn execute_reader(&mut self, _command: &CatalogCommand) -> Result<Vec<CatalogRow>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_timeout_elapses() {
        let mut introspector = Introspector::new(Box::new(Slow)).with_timeout(Duration::from_millis(10));
        let result = introspector.describe_table("orders", None, None).await;
        assert!(matches!(result, Err(DbMetaError::Timeout(d)) if d == Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_no_rows_means_missing_table() {
        let mut introspector = Introspector::new(Box::new(Empty));
        assert_eq!(introspector.family(), ProviderFamily::MySql);
        assert_eq!(introspector.database(), "shop");
        assert!(introspector.timeout().is_none());
        assert!(!introspector.table_exists("orders", None, None).await.unwrap());
        assert!(introspector.describe_table("orders", None, None).await.unwrap().is_none());
        assert!(introspector.columns("orders", None, None).await.unwrap().is_empty());
    }
}
