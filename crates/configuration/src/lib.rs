pub mod configuration;
pub mod environment;
pub mod error;
pub mod to_runtime_configuration;
pub mod values;
pub mod version1;

pub use configuration::{Configuration, DatabaseDefaults, ModelConfiguration, Timeouts};
pub use to_runtime_configuration::make_runtime_configuration;
pub use values::{PoolSettings, Secret, Variable};
pub use version1::{
    configuration_jsonschema, parse_configuration, write_parsed_configuration,
    ParsedConfiguration,
};
