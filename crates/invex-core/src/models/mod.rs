//! Data models: invoice records and pipeline configuration.

pub mod config;
pub mod invoice;
