//! Errors that can be thrown when processing configuration.

use std::path::PathBuf;

/// The errors that can be thrown when reading the configuration directory.
#[derive(Debug, thiserror::Error)]
pub enum ParseConfigurationError {
    #[error("parse error on {file_path}:{line}:{column}: {message}")]
    ParseError {
        file_path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("unsupported configuration version {0}, expected \"1\"")]
    UnsupportedVersion(String),

    // Stringified for Clone and PartialEq.
    #[error("I/O error: {0}")]
    IoErrorButStringified(String),
}

/// The errors that can be thrown when writing the configuration directory.
#[derive(Debug, thiserror::Error)]
pub enum WriteParsedConfigurationError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("could not serialize the configuration: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The errors that can be thrown when turning a parsed configuration into a runtime one.
#[derive(Debug, thiserror::Error)]
pub enum MakeRuntimeConfigurationError {
    #[error("invalid configuration of {file_path}: {message}")]
    MissingEnvironmentVariable { file_path: PathBuf, message: String },
    #[error("invalid configuration value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}
