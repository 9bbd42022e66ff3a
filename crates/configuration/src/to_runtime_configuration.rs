//! Convert a parsed configuration into the runtime one.

use std::path::PathBuf;
use std::time::Duration;

use crate::configuration::{Configuration, DatabaseDefaults, ModelConfiguration, Timeouts};
use crate::environment::{self, Environment};
use crate::error::MakeRuntimeConfigurationError;
use crate::values::Secret;
use crate::version1::{ParsedConfiguration, CONFIGURATION_FILENAME};

/// Resolve secrets and apply units. The model key is mandatory; database defaults that cannot be
/// resolved are left out so requests have to carry them.
pub fn make_runtime_configuration(
    parsed_config: ParsedConfiguration,
    environment: &impl Environment,
) -> Result<Configuration, MakeRuntimeConfigurationError> {
    let model = parsed_config.model;
    let api_key = resolve_secret(&model.api_key, environment).map_err(|err| {
        MakeRuntimeConfigurationError::MissingEnvironmentVariable {
            file_path: PathBuf::from(CONFIGURATION_FILENAME),
            message: err.to_string(),
        }
    })?;
    if !(0.0..=2.0).contains(&model.temperature) {
        return Err(MakeRuntimeConfigurationError::InvalidValue {
            field: "model.temperature",
            message: format!("{} is outside 0.0..=2.0", model.temperature),
        });
    }
    match url::Url::parse(&model.api_url) {
        Ok(api_url) if matches!(api_url.scheme(), "http" | "https") => {}
        Ok(api_url) => {
            return Err(MakeRuntimeConfigurationError::InvalidValue {
                field: "model.apiUrl",
                message: format!("unsupported scheme '{}'", api_url.scheme()),
            })
        }
        Err(err) => {
            return Err(MakeRuntimeConfigurationError::InvalidValue {
                field: "model.apiUrl",
                message: err.to_string(),
            })
        }
    }
    if model.timeout_secs == 0 {
        return Err(MakeRuntimeConfigurationError::InvalidValue {
            field: "model.timeoutSecs",
            message: "must be at least 1".to_string(),
        });
    }

    let database = parsed_config.database;
    let timeouts = parsed_config.timeouts;
    if timeouts.connect_secs == 0 || timeouts.schema_read_secs == 0 || timeouts.execution_secs == 0
    {
        return Err(MakeRuntimeConfigurationError::InvalidValue {
            field: "timeouts",
            message: "every timeout must be at least 1 second".to_string(),
        });
    }
    if parsed_config.pool_settings.max_connections == 0 {
        return Err(MakeRuntimeConfigurationError::InvalidValue {
            field: "poolSettings.maxConnections",
            message: "must be at least 1".to_string(),
        });
    }

    Ok(Configuration {
        model: ModelConfiguration {
            api_url: model.api_url,
            api_key,
            model: model.model,
            timeout: Duration::from_secs(model.timeout_secs),
            max_tokens: model.max_tokens,
            temperature: model.temperature,
            max_retries: model.max_retries,
            retry_backoff: Duration::from_millis(model.retry_backoff_millis),
        },
        database: DatabaseDefaults {
            host: non_blank(database.default_host),
            dbname: non_blank(database.default_dbname),
            port: database.default_port,
            user: resolve_optional(database.default_user.as_ref(), environment),
            password: resolve_optional(database.default_password.as_ref(), environment),
        },
        pool_settings: parsed_config.pool_settings,
        timeouts: Timeouts {
            connect: Duration::from_secs(timeouts.connect_secs),
            schema_read: Duration::from_secs(timeouts.schema_read_secs),
            execution: Duration::from_secs(timeouts.execution_secs),
        },
        schema_cache_enabled: parsed_config.schema_cache.enabled,
    })
}

fn resolve_secret(
    secret: &Secret,
    environment: &impl Environment,
) -> Result<String, environment::Error> {
    match secret {
        Secret::Plain(value) => Ok(value.clone()),
        Secret::FromEnvironment { variable } => environment.read(variable),
    }
}

fn resolve_optional(secret: Option<&Secret>, environment: &impl Environment) -> Option<String> {
    let secret = secret?;
    match resolve_secret(secret, environment) {
        Ok(value) => non_blank(Some(value)),
        Err(err) => {
            tracing::debug!(%err, "no default available");
            None
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
