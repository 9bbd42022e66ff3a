//! Transient state used by the server.
//!
//! This is initialized on startup.

use std::sync::Arc;

use thiserror::Error;

use chatdb_configuration::{Configuration, ModelConfiguration};
use query_engine_execution::metrics::{self, Metrics};
use query_engine_execution::PoolRegistry;
use query_engine_translation::translation::{
    ChatCompletionsModel, LanguageModel, ModelError, ModelSettings, Translator,
};

use crate::schema_cache::SchemaCache;

/// State shared by every request.
#[derive(Clone)]
pub struct ServerState {
    pub configuration: Arc<Configuration>,
    pub pools: Arc<PoolRegistry>,
    pub schema_cache: Arc<SchemaCache>,
    pub translator: Translator,
    pub metrics: Metrics,
    pub metrics_registry: Arc<prometheus::Registry>,
}

/// Build the server state around a language model.
pub fn create_state(
    configuration: Configuration,
    model: Arc<dyn LanguageModel>,
) -> Result<ServerState, InitializationError> {
    let mut metrics_registry = prometheus::Registry::new();
    let metrics = metrics::initialise_metrics(&mut metrics_registry)
        .map_err(InitializationError::MetricsError)?;
    metrics.record_statement_timeout(configuration.timeouts.execution);

    let pools = PoolRegistry::new(configuration.pool_settings, configuration.timeouts.connect);
    let schema_cache = SchemaCache::new(configuration.schema_cache_enabled);

    Ok(ServerState {
        configuration: Arc::new(configuration),
        pools: Arc::new(pools),
        schema_cache: Arc::new(schema_cache),
        translator: Translator::new(model),
        metrics,
        metrics_registry: Arc::new(metrics_registry),
    })
}

/// The chat-completions model the configuration describes.
pub fn create_model(
    configuration: &ModelConfiguration,
) -> Result<Arc<dyn LanguageModel>, InitializationError> {
    let model = ChatCompletionsModel::new(model_settings(configuration))
        .map_err(InitializationError::ModelError)?;
    Ok(Arc::new(model))
}

pub fn model_settings(configuration: &ModelConfiguration) -> ModelSettings {
    ModelSettings {
        api_url: configuration.api_url.clone(),
        api_key: configuration.api_key.clone(),
        model: configuration.model.clone(),
        timeout: configuration.timeout,
        max_tokens: configuration.max_tokens,
        temperature: configuration.temperature,
        max_retries: configuration.max_retries,
        retry_backoff: configuration.retry_backoff,
    }
}

/// State initialization error.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("error initializing metrics: {0}")]
    MetricsError(prometheus::Error),
    #[error("error initializing the language model client: {0}")]
    ModelError(ModelError),
}
