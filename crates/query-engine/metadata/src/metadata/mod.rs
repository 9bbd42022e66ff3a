//! Metadata information regarding the database the pipeline talks to.

pub mod compare;
pub mod database;

// re-export without modules
pub use compare::SchemaMismatch;
pub use database::*;
