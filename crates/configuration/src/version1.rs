//! Version "1" of the configuration file.

use std::path::Path;

use schemars::{gen::SchemaSettings, schema::RootSchema, JsonSchema};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{ParseConfigurationError, WriteParsedConfigurationError};
use crate::values::{PoolSettings, Secret};

pub const CONFIGURATION_FILENAME: &str = "configuration.json";
pub const CONFIGURATION_JSONSCHEMA_FILENAME: &str = "schema.json";
pub const DEFAULT_MODEL_API_KEY_VARIABLE: &str = "CHATDB_MODEL_API_KEY";
pub const DEFAULT_DB_USER_VARIABLE: &str = "CHATDB_DB_USER";
pub const DEFAULT_DB_PASSWORD_VARIABLE: &str = "CHATDB_DB_PASSWORD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Version {
    #[serde(rename = "1")]
    This,
}

/// The configuration file as written by operators.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedConfiguration {
    pub version: Version,
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default, skip_serializing_if = "PoolSettings::is_default")]
    pub pool_settings: PoolSettings,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
    #[serde(default)]
    pub schema_cache: SchemaCacheSection,
}

/// How to reach the language model.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelSection {
    #[serde(default = "api_url_default")]
    pub api_url: String,
    #[serde(default = "api_key_default")]
    pub api_key: Secret,
    #[serde(default = "model_default")]
    pub model: String,
    #[serde(default = "model_timeout_default")]
    pub timeout_secs: u64,
    #[serde(default = "max_tokens_default")]
    pub max_tokens: u32,
    #[serde(default = "temperature_default")]
    pub temperature: f32,
    #[serde(default = "max_retries_default")]
    pub max_retries: u32,
    #[serde(default = "retry_backoff_default")]
    pub retry_backoff_millis: u64,
}

impl Default for ModelSection {
    fn default() -> Self {
        ModelSection {
            api_url: api_url_default(),
            api_key: api_key_default(),
            model: model_default(),
            timeout_secs: model_timeout_default(),
            max_tokens: max_tokens_default(),
            temperature: temperature_default(),
            max_retries: max_retries_default(),
            retry_backoff_millis: retry_backoff_default(),
        }
    }
}

fn api_url_default() -> String {
    "https://api.x.ai/v1/chat/completions".to_string()
}
fn api_key_default() -> Secret {
    Secret::from_environment(DEFAULT_MODEL_API_KEY_VARIABLE)
}
fn model_default() -> String {
    "grok-3-beta".to_string()
}
fn model_timeout_default() -> u64 {
    10
}
fn max_tokens_default() -> u32 {
    512
}
fn temperature_default() -> f32 {
    0.2
}
fn max_retries_default() -> u32 {
    2
}
fn retry_backoff_default() -> u64 {
    250
}

/// Values used when a request leaves connection parameters out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dbname: Option<String>,
    #[serde(default = "port_default")]
    pub default_port: u16,
    #[serde(default = "user_default")]
    pub default_user: Option<Secret>,
    #[serde(default = "password_default")]
    pub default_password: Option<Secret>,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            default_host: None,
            default_dbname: None,
            default_port: port_default(),
            default_user: user_default(),
            default_password: password_default(),
        }
    }
}

fn port_default() -> u16 {
    5432
}
#[allow(clippy::unnecessary_wraps)]
fn user_default() -> Option<Secret> {
    Some(Secret::from_environment(DEFAULT_DB_USER_VARIABLE))
}
#[allow(clippy::unnecessary_wraps)]
fn password_default() -> Option<Secret> {
    Some(Secret::from_environment(DEFAULT_DB_PASSWORD_VARIABLE))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutsSection {
    #[serde(default = "connect_default")]
    pub connect_secs: u64,
    #[serde(default = "schema_read_default")]
    pub schema_read_secs: u64,
    #[serde(default = "execution_default")]
    pub execution_secs: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        TimeoutsSection {
            connect_secs: connect_default(),
            schema_read_secs: schema_read_default(),
            execution_secs: execution_default(),
        }
    }
}

fn connect_default() -> u64 {
    10
}
fn schema_read_default() -> u64 {
    15
}
fn execution_default() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCacheSection {
    #[serde(default = "cache_enabled_default")]
    pub enabled: bool,
}

impl Default for SchemaCacheSection {
    fn default() -> Self {
        SchemaCacheSection {
            enabled: cache_enabled_default(),
        }
    }
}

fn cache_enabled_default() -> bool {
    true
}

impl ParsedConfiguration {
    pub fn initial() -> Self {
        ParsedConfiguration {
            version: Version::This,
            schema: Some(CONFIGURATION_JSONSCHEMA_FILENAME.to_string()),
            model: ModelSection::default(),
            database: DatabaseSection::default(),
            pool_settings: PoolSettings::default(),
            timeouts: TimeoutsSection::default(),
            schema_cache: SchemaCacheSection::default(),
        }
    }
}

/// Parse the configuration directory. A directory without a configuration file yields the
/// defaults.
pub async fn parse_configuration(
    configuration_dir: impl AsRef<Path>,
) -> Result<ParsedConfiguration, ParseConfigurationError> {
    let configuration_file = configuration_dir.as_ref().join(CONFIGURATION_FILENAME);

    let configuration_file_contents = match fs::read_to_string(&configuration_file).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(
                path = %configuration_file.display(),
                "no configuration file found; using defaults"
            );
            return Ok(ParsedConfiguration::initial());
        }
        Err(err) => return Err(ParseConfigurationError::IoErrorButStringified(err.to_string())),
    };

    parse_configuration_contents(&configuration_file, &configuration_file_contents)
}

fn parse_configuration_contents(
    file_path: &Path,
    contents: &str,
) -> Result<ParsedConfiguration, ParseConfigurationError> {
    let value: serde_json::Value =
        serde_json::from_str(contents).map_err(|error| parse_error(file_path, &error))?;

    match value.get("version") {
        Some(serde_json::Value::String(version)) if version == "1" => {}
        Some(other) => {
            let version = match other {
                serde_json::Value::String(version) => version.clone(),
                other => other.to_string(),
            };
            return Err(ParseConfigurationError::UnsupportedVersion(version));
        }
        None => return Err(ParseConfigurationError::UnsupportedVersion("<missing>".into())),
    }

    // Deserialize from the text again so that positions in errors are meaningful.
    serde_json::from_str(contents).map_err(|error| parse_error(file_path, &error))
}

fn parse_error(file_path: &Path, error: &serde_json::Error) -> ParseConfigurationError {
    ParseConfigurationError::ParseError {
        file_path: file_path.to_owned(),
        line: error.line(),
        column: error.column(),
        message: error.to_string(),
    }
}

/// Write the parsed configuration into a directory on disk, along with its JSON schema.
pub async fn write_parsed_configuration(
    parsed_config: ParsedConfiguration,
    out_dir: impl AsRef<Path>,
) -> Result<(), WriteParsedConfigurationError> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir).await?;

    let configuration_file = out_dir.join(CONFIGURATION_FILENAME);
    let contents = serde_json::to_string_pretty(&parsed_config)? + "\n";
    fs::write(&configuration_file, contents).await?;

    let schema_file = out_dir.join(CONFIGURATION_JSONSCHEMA_FILENAME);
    let schema = serde_json::to_string_pretty(&configuration_jsonschema())? + "\n";
    fs::write(&schema_file, schema).await?;

    Ok(())
}

/// The JSON schema of the configuration file.
pub fn configuration_jsonschema() -> RootSchema {
    SchemaSettings::draft07()
        .into_generator().into_root_schema_for::<ParsedConfiguration>()
}
