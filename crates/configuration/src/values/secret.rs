use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The name of an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct Variable(String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Variable(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Variable(value.to_string())
    }
}

/// A value that is either written into the configuration or read from the environment.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum Secret {
    Plain(String),
    FromEnvironment { variable: Variable },
}

impl Secret {
    pub fn from_environment(variable: impl Into<String>) -> Self {
        Secret::FromEnvironment {
            variable: Variable::new(variable),
        }
    }
}

// Plain values must not end up in logs.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::Plain(_) => f.write_str("Plain(<redacted>)"),
            Secret::FromEnvironment { variable } => f
                .debug_struct("FromEnvironment")
                .field("variable", variable)
                .finish(),
        }
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret::Plain(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Secret::Plain(value.to_string())
    }
}
