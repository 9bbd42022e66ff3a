//! Static inspection of candidate SQL before anything is allowed to reach the database.

pub mod sql;
