//! Infrastructure layer: configuration and external system adapters.

pub mod config;
pub mod dataset;

pub use config::{ConfigError, ConnectorConfig};
pub use dataset::{DatasetCapability, DatasetError};
