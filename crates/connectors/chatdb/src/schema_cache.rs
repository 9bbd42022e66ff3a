//! Schema descriptions kept between requests.
//!
//! Entries are keyed by (host, port, database, user): the tables a role can see depend on the
//! role. A cached description is replaced whenever a fresh read disagrees with it, and dropped
//! when the backend reports an undefined table or column.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use query_engine_execution::{introspect, ConnectionParams, IntrospectionError, PgConnection};
use query_engine_metadata::metadata::{SchemaDescription, SchemaMismatch};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    host: String,
    port: u16,
    dbname: String,
    user: String,
}

impl From<&ConnectionParams> for CacheKey {
    fn from(params: &ConnectionParams) -> Self {
        CacheKey {
            host: params.host.to_lowercase(),
            port: params.port,
            dbname: params.dbname.clone(),
            user: params.user.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SchemaCache {
    enabled: bool,
    entries: RwLock<HashMap<CacheKey, Arc<SchemaDescription>>>,
}

impl SchemaCache {
    pub fn new(enabled: bool) -> Self {
        SchemaCache {
            enabled,
            entries: RwLock::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The cached description for this target, or a fresh read.
    pub async fn load(
        &self,
        connection: &mut PgConnection,
        params: &ConnectionParams,
        timeout: Duration,
    ) -> Result<Arc<SchemaDescription>, IntrospectionError> {
        if let Some(schema) = self.get(params) {
            tracing::debug!(address = %params.address(), "using cached schema");
            return Ok(schema);
        }
        let schema = Arc::new(introspect(connection, timeout).await?);
        self.insert(params, schema.clone());
        Ok(schema)
    }

    /// Read the schema again and report how it differs from the cached description, which is
    /// replaced.
    pub async fn refresh(
        &self,
        connection: &mut PgConnection,
        params: &ConnectionParams,
        timeout: Duration,
    ) -> Result<(Arc<SchemaDescription>, SchemaMismatch), IntrospectionError> {
        let fresh = Arc::new(introspect(connection, timeout).await?);
        let mismatch = self
            .get(params)
            .map(|cached| SchemaMismatch::between(&cached, &fresh))
            .unwrap_or_default();
        if !mismatch.is_empty() {
            tracing::info!(
                address = %params.address(),
                %mismatch,
                "schema changed since it was cached"
            );
        }
        self.insert(params, fresh.clone());
        Ok((fresh, mismatch))
    }

    pub fn get(&self, params: &ConnectionParams) -> Option<Arc<SchemaDescription>> {
        if !self.enabled {
            return None;
        }
        self.read().get(&CacheKey::from(params)).cloned()
    }

    pub fn insert(&self, params: &ConnectionParams, schema: Arc<SchemaDescription>) {
        if self.enabled {
            self.write().insert(CacheKey::from(params), schema);
        }
    }

    pub fn invalidate(&self, params: &ConnectionParams) {
        if self.write().remove(&CacheKey::from(params)).is_some() {
            tracing::info!(address = %params.address(), "dropped cached schema");
        }
    }

    fn read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<CacheKey, Arc<SchemaDescription>>> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<CacheKey, Arc<SchemaDescription>>> {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
