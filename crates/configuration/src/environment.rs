//! Where secrets come from.

use std::collections::HashMap;

use crate::values::Variable;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("the environment variable {0} is not set")]
    VariableNotPresent(Variable),
    #[error("the environment variable {0} is not valid unicode")]
    NonUnicodeValue(Variable),
}

/// Read access to a set of named variables.
pub trait Environment {
    fn read(&self, variable: &Variable) -> Result<String, Error>;
}

/// The variables of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn read(&self, variable: &Variable) -> Result<String, Error> {
        std::env::var(variable.as_str()).map_err(|err| match err {
            std::env::VarError::NotPresent => Error::VariableNotPresent(variable.clone()),
            std::env::VarError::NotUnicode(_) => Error::NonUnicodeValue(variable.clone()),
        })
    }
}

/// A fixed set of variables, used in tests.
pub type FixedEnvironment = HashMap<Variable, String>;

impl Environment for FixedEnvironment {
    fn read(&self, variable: &Variable) -> Result<String, Error> {
        self.get(variable)
            .cloned()
            .ok_or_else(|| Error::VariableNotPresent(variable.clone()))
    }
}

/// An environment with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnvironment;

impl Environment for EmptyEnvironment {
    fn read(&self, variable: &Variable) -> Result<String, Error> {
        Err(Error::VariableNotPresent(variable.clone()))
    }
}
