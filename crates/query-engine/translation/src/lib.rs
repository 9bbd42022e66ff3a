//! Turn a natural-language request into a candidate SQL statement.

pub mod translation;
