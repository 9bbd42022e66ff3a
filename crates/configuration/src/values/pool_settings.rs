use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Settings for the connection pools kept per database target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolSettings {
    /// maximum number of pool connections per target
    #[serde(default = "max_connection_default")]
    pub max_connections: u32,
    /// timeout for acquiring a connection from a pool (seconds)
    #[serde(default = "acquire_timeout_default")]
    pub acquire_timeout: u64,
    /// idle timeout for releasing a connection from a pool (seconds)
    #[serde(default = "idle_timeout_default")]
    pub idle_timeout: Option<u64>,
    /// maximum lifetime for an individual connection (seconds)
    #[serde(default = "connection_lifetime_default")]
    pub connection_lifetime: Option<u64>,
    /// how many targets keep a pool at once; the least recently used one is closed beyond that
    #[serde(default = "max_pools_default")]
    pub max_pools: usize,
}

impl PoolSettings {
    pub fn is_default(&self) -> bool {
        self == &PoolSettings::default()
    }
}

impl Default for PoolSettings {
    fn default() -> PoolSettings {
        PoolSettings {
            max_connections: max_connection_default(),
            acquire_timeout: acquire_timeout_default(),
            idle_timeout: idle_timeout_default(),
            connection_lifetime: connection_lifetime_default(),
            max_pools: max_pools_default(),
        }
    }
}

fn max_connection_default() -> u32 {
    10
}
fn acquire_timeout_default() -> u64 {
    30
}
fn idle_timeout_default() -> Option<u64> {
    Some(180)
}
fn connection_lifetime_default() -> Option<u64> {
    Some(600)
}
fn max_pools_default() -> usize {
    16
}
