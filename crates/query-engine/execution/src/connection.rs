//! Connections scoped to one request, and the pools they come from.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;
use std::time::Duration;

use chatdb_configuration::PoolSettings;
use indexmap::IndexMap;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgConnection, PgPool, Postgres};
use tracing::{info_span, Instrument};

use crate::error::ConnectionError;

pub const DEFAULT_PORT: u16 = 5432;

const APPLICATION_NAME: &str = "chatdb";

/// Where and as whom to connect. Built per request and never persisted.
///
/// The password takes part in equality, so a changed password gets its own pool.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl ConnectionParams {
    /// `host:port/dbname`, safe to show in messages.
    pub fn address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.dbname)
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.user)
            .password(&self.password)
            .application_name(APPLICATION_NAME)
    }
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A connection held for the duration of one request. Dropping it returns a pooled connection to
/// its pool, or closes a direct one, on every exit path.
#[derive(Debug)]
pub enum ScopedConnection {
    Pooled(PoolConnection<Postgres>),
    Direct(PgConnection),
}

impl ScopedConnection {
    /// Give the connection back. A direct connection is closed gracefully.
    pub async fn release(self) {
        if let ScopedConnection::Direct(connection) = self {
            if let Err(err) = connection.close().await {
                tracing::debug!(%err, "closing a direct connection failed");
            }
        }
    }
}

impl Deref for ScopedConnection {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match self {
            ScopedConnection::Pooled(connection) => &**connection,
            ScopedConnection::Direct(connection) => connection,
        }
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match self {
            ScopedConnection::Pooled(connection) => &mut **connection,
            ScopedConnection::Direct(connection) => connection,
        }
    }
}

/// One pool per connection target, shared by concurrent requests.
///
/// The first request for a target connects directly, which surfaces the server's real answer
/// (unreachable host, bad password) instead of a pool timeout. Later requests draw from a pool
/// created for that target. At most `max_pools` targets keep a pool; the least recently used one
/// is closed to make room.
#[derive(Debug)]
pub struct PoolRegistry {
    settings: PoolSettings,
    connect_timeout: Duration,
    pools: Mutex<IndexMap<ConnectionParams, PgPool>>,
}

impl PoolRegistry {
    pub fn new(settings: PoolSettings, connect_timeout: Duration) -> Self {
        PoolRegistry {
            settings,
            connect_timeout,
            pools: Mutex::default(),
        }
    }

    pub async fn acquire(
        &self,
        params: &ConnectionParams,
    ) -> Result<ScopedConnection, ConnectionError> {
        let span = info_span!("Acquire connection", address = %params.address());
        async {
            match self.cached_pool(params) {
                Some(pool) => self.acquire_pooled(params, &pool).await,
                None => self.connect_first(params).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Number of targets that currently keep a pool.
    pub fn pool_count(&self) -> usize {
        self.lock().len()
    }

    /// Connections open across all pools, and how many of them are idle.
    pub fn connection_counts(&self) -> (u32, usize) {
        self.lock()
            .values()
            .fold((0, 0), |(size, idle), pool| (size + pool.size(), idle + pool.num_idle()))
    }

    fn cached_pool(&self, params: &ConnectionParams) -> Option<PgPool> {
        let mut pools = self.lock();
        // move to the back to keep the map in least-recently-used order
        let pool = pools.shift_remove(params)?;
        pools.insert(params.clone(), pool.clone());
        Some(pool)
    }

    async fn acquire_pooled(
        &self,
        params: &ConnectionParams,
        pool: &PgPool,
    ) -> Result<ScopedConnection, ConnectionError> {
        let acquire_timeout = Duration::from_secs(self.settings.acquire_timeout);
        match pool.acquire().await {
            Ok(connection) => Ok(ScopedConnection::Pooled(connection)),
            Err(err) => {
                let err = ConnectionError::from_sqlx(err, &params.address(), acquire_timeout);
                if !err.is_timeout() {
                    // the target changed under us; start over with a direct connection next time
                    self.forget(params);
                }
                Err(err)
            }
        }
    }

    async fn connect_first(
        &self,
        params: &ConnectionParams,
    ) -> Result<ScopedConnection, ConnectionError> {
        let options = params.connect_options();
        let connection =
            match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&options))
                .await
            {
                Ok(Ok(connection)) => connection,
                Ok(Err(err)) => {
                    return Err(ConnectionError::from_sqlx(
                        err,
                        &params.address(),
                        self.connect_timeout,
                    ))
                }
                Err(_) => return Err(ConnectionError::Timeout(self.connect_timeout)),
            };

        let pool = self.pool_options().connect_lazy_with(options);
        self.register(params.clone(), pool);
        Ok(ScopedConnection::Direct(connection))
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .acquire_timeout(Duration::from_secs(self.settings.acquire_timeout))
            .idle_timeout(self.settings.idle_timeout.map(Duration::from_secs))
            .max_lifetime(self.settings.connection_lifetime.map(Duration::from_secs))
    }

    fn register(&self, params: ConnectionParams, pool: PgPool) {
        let mut pools = self.lock();
        while pools.len() >= self.settings.max_pools.max(1) {
            let Some((evicted, old_pool)) = pools.shift_remove_index(0) else {
                break;
            };
            tracing::info!(address = %evicted.address(), "closing least recently used pool");
            tokio::spawn(async move { old_pool.close().await });
        }
        if let Some(previous) = pools.insert(params, pool) {
            tokio::spawn(async move { previous.close().await });
        }
    }

    fn forget(&self, params: &ConnectionParams) {
        if let Some(pool) = self.lock().shift_remove(params) {
            tokio::spawn(async move { pool.close().await });
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<ConnectionParams, PgPool>> {
        // the map stays consistent even if a holder panicked
        self.pools
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(host: &str) -> ConnectionParams {
        ConnectionParams {
            host: host.to_string(),
            port: DEFAULT_PORT,
            dbname: "banking".to_string(),
            user: "postgres".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn debug_hides_the_password() {
        let rendered = format!("{:?}", params("localhost"));
        assert!(rendered.contains("localhost"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn address_leaves_credentials_out() {
        assert_eq!(params("db.internal").address(), "db.internal:5432/banking");
    }

    #[tokio::test]
    async fn least_recently_used_pools_are_evicted() {
        let registry = PoolRegistry::new(
            PoolSettings {
                max_pools: 2,
                ..PoolSettings::default()
            },
            Duration::from_secs(1),
        );
        for host in ["a", "b"] {
            let pool = registry.pool_options().connect_lazy_with(params(host).connect_options());
            registry.register(params(host), pool);
        }
        // touch "a" so that "b" becomes the oldest
        assert!(registry.cached_pool(&params("a")).is_some());

        let pool = registry.pool_options().connect_lazy_with(params("c").connect_options());
        registry.register(params("c"), pool);

        assert_eq!(registry.pool_count(), 2);
        assert!(registry.cached_pool(&params("b")).is_none());
        assert!(registry.cached_pool(&params("a")).is_some());
        assert!(registry.cached_pool(&params("c")).is_some());
    }

    #[tokio::test]
    async fn unreachable_hosts_are_reported_as_such() {
        let registry = PoolRegistry::new(PoolSettings::default(), Duration::from_secs(5));
        let target = ConnectionParams {
            port: 1,
            ..params("127.0.0.1")
        };
        match registry.acquire(&target).await {
            Err(ConnectionError::Unreachable { address, .. }) => {
                assert_eq!(address, "127.0.0.1:1/banking");
            }
            other => panic!("expected an unreachable host, got {other:?}"),
        }
        assert_eq!(registry.pool_count(), 0);
    }
}
