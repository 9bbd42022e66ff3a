//! The configuration the server runs with.

use std::time::Duration;

use crate::values::PoolSettings;

/// Everything needed to serve requests, with secrets resolved and units applied.
///
/// Values of this type are produced from a [`crate::ParsedConfiguration`] using
/// [`crate::make_runtime_configuration`], so the request handlers never deal with the
/// evolution of the file format.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub model: ModelConfiguration,
    pub database: DatabaseDefaults,
    pub pool_settings: PoolSettings,
    pub timeouts: Timeouts,
    pub schema_cache_enabled: bool,
}

#[derive(Clone)]
pub struct ModelConfiguration {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl std::fmt::Debug for ModelConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfiguration")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .finish_non_exhaustive()
    }
}

/// Fallbacks for connection parameters a request does not carry.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseDefaults {
    pub host: Option<String>,
    pub dbname: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseDefaults {
    fn default() -> Self {
        DatabaseDefaults {
            host: None,
            dbname: None,
            port: 5432,
            user: None,
            password: None,
        }
    }
}

impl std::fmt::Debug for DatabaseDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseDefaults")
            .field("host", &self.host)
            .field("dbname", &self.dbname)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub schema_read: Duration,
    pub execution: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            connect: Duration::from_secs(10),
            schema_read: Duration::from_secs(15),
            execution: Duration::from_secs(30),
        }
    }
}
