pub mod connection;
pub mod error;
pub mod execution;
pub mod introspection;
pub mod metrics;
pub mod values;

pub use connection::{ConnectionParams, PoolRegistry, ScopedConnection};
pub use error::{ConnectionError, ExecutionError, IntrospectionError};
pub use execution::{execute, ExecutionOutcome};
pub use introspection::introspect;
pub use values::Record;

// Connections are handed around as sqlx's connection type.
pub use sqlx::PgConnection;
