//! Servers wired to a scripted model.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum_test_helper::TestClient;

use chatdb::ServerState;
use chatdb_configuration::environment::FixedEnvironment;
use chatdb_configuration::version1::DEFAULT_MODEL_API_KEY_VARIABLE;
use chatdb_configuration::{make_runtime_configuration, Configuration, ParsedConfiguration, Variable};

use crate::model::ScriptedModel;

/// The initial configuration, with a model key and short timeouts.
pub fn test_configuration() -> Configuration {
    let environment: FixedEnvironment = HashMap::from([(
        Variable::new(DEFAULT_MODEL_API_KEY_VARIABLE),
        "test-key".to_string(),
    )]);
    let mut configuration =
        make_runtime_configuration(ParsedConfiguration::initial(), &environment).unwrap();
    configuration.timeouts.connect = Duration::from_secs(3);
    configuration.timeouts.execution = Duration::from_secs(5);
    configuration
}

/// A test client for a server built from `configuration` that asks `model` for translations.
pub fn create_client(
    configuration: Configuration,
    model: Arc<ScriptedModel>,
) -> (TestClient, ServerState) {
    let _ = env_logger::builder().is_test(true).try_init();

    let state = chatdb::create_state(configuration, model).unwrap();
    let router = chatdb::create_router(state.clone());
    (TestClient::new(router), state)
}
