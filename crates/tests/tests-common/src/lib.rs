//! Helpers shared by the test suites.

pub mod deployment;
pub mod model;
pub mod router;
