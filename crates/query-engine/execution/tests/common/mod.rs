#![allow(dead_code)]

use std::time::Duration;

use chatdb_configuration::PoolSettings;
use query_engine_execution::{ConnectionParams, PoolRegistry};

/// The database `static/banking.sql` is loaded into.
pub fn banking_params() -> ConnectionParams {
    ConnectionParams {
        host: "localhost".to_string(),
        port: 64002,
        dbname: "postgres".to_string(),
        user: "postgres".to_string(),
        password: "password".to_string(),
    }
}

pub fn registry() -> PoolRegistry {
    PoolRegistry::new(PoolSettings::default(), Duration::from_secs(5))
}

pub const TIMEOUT: Duration = Duration::from_secs(10);
