//! Errors for connecting, reading the schema and executing statements.

use std::time::Duration;

use thiserror::Error;

/// SQLSTATE raised when `statement_timeout` cancels a statement.
const QUERY_CANCELED: &str = "57014";

/// Reaching or authenticating to the database failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("could not reach the database at {address}: {message}")]
    Unreachable { address: String, message: String },
    #[error("the database rejected the connection: {message}")]
    Rejected { code: String, message: String },
    #[error("connecting to the database timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
    #[error("could not connect to the database: {0}")]
    Other(String),
}

impl ConnectionError {
    /// A machine-usable code: the SQLSTATE when the server answered, otherwise a fixed name.
    pub fn code(&self) -> &str {
        match self {
            ConnectionError::Unreachable { .. } => "connection_unreachable",
            ConnectionError::Rejected { code, .. } => code,
            ConnectionError::Timeout(_) => "connection_timeout",
            ConnectionError::Other(_) => "connection_error",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ConnectionError::Timeout(_))
    }

    pub(crate) fn from_sqlx(err: sqlx::Error, address: &str, timeout: Duration) -> Self {
        match err {
            sqlx::Error::Io(err) => ConnectionError::Unreachable {
                address: address.to_string(),
                message: err.to_string(),
            },
            sqlx::Error::Tls(err) => ConnectionError::Unreachable {
                address: address.to_string(),
                message: err.to_string(),
            },
            sqlx::Error::Database(err) => {
                let (code, message) = database_error(err.as_ref());
                ConnectionError::Rejected { code, message }
            }
            sqlx::Error::PoolTimedOut => ConnectionError::Timeout(timeout),
            err => ConnectionError::Other(err.to_string()),
        }
    }
}

/// Reading the catalog failed after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrospectionError {
    #[error("could not read the database schema: {message}")]
    SchemaRead { code: String, message: String },
    #[error("reading the database schema timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl IntrospectionError {
    pub fn code(&self) -> &str {
        match self {
            IntrospectionError::SchemaRead { code, .. } => code,
            IntrospectionError::Timeout(_) => "schema_read_timeout",
            IntrospectionError::Connection(err) => err.code(),
        }
    }

    pub(crate) fn from_sqlx(err: sqlx::Error, timeout: Duration) -> Self {
        match err {
            sqlx::Error::Database(err) => {
                let (code, message) = database_error(err.as_ref());
                if code == QUERY_CANCELED {
                    IntrospectionError::Timeout(timeout)
                } else {
                    IntrospectionError::SchemaRead { code, message }
                }
            }
            sqlx::Error::Io(err) => {
                IntrospectionError::Connection(ConnectionError::Other(err.to_string()))
            }
            err => IntrospectionError::SchemaRead {
                code: "schema_read_error".to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// The backend refused or failed to run a validated statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// Carries the backend's SQLSTATE and message verbatim.
    #[error("{message}")]
    Database { code: String, message: String },
    #[error("statement execution timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
    #[error("could not decode column '{column}' of type {type_name}; cast it to text in the query")]
    Decode { column: String, type_name: String },
    #[error("{0}")]
    Driver(String),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl ExecutionError {
    pub fn code(&self) -> &str {
        match self {
            ExecutionError::Database { code, .. } => code,
            ExecutionError::Timeout(_) => "execution_timeout",
            ExecutionError::Decode { .. } => "decode_error",
            ExecutionError::Driver(_) => "driver_error",
            ExecutionError::Connection(err) => err.code(),
        }
    }

    pub(crate) fn from_sqlx(err: sqlx::Error, timeout: Duration) -> Self {
        match err {
            sqlx::Error::Database(err) => {
                let (code, message) = database_error(err.as_ref());
                if code == QUERY_CANCELED {
                    ExecutionError::Timeout(timeout)
                } else {
                    ExecutionError::Database { code, message }
                }
            }
            sqlx::Error::Io(err) => ExecutionError::Connection(ConnectionError::Other(format!(
                "the connection was lost: {err}"
            ))),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                ExecutionError::Connection(ConnectionError::Other(err.to_string()))
            }
            err => ExecutionError::Driver(err.to_string()),
        }
    }
}

fn database_error(err: &dyn sqlx::error::DatabaseError) -> (String, String) {
    (
        err.code()
            .map_or_else(|| "unknown".to_string(), std::borrow::Cow::into_owned),
        err.message().to_string(),
    )
}
