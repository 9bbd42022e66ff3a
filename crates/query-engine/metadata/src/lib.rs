//! Schema metadata shared by every stage of the pipeline.

pub mod metadata;
