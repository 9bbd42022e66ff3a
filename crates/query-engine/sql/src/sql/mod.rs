//! Validate candidate SQL against a schema description.

pub mod error;
pub mod identifiers;
pub mod separators;
pub mod statement;
pub mod validation;

pub use error::ValidationError;
pub use statement::{StatementKind, ValidatedStatement};
pub use validation::validate;
