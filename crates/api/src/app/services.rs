//! Service wiring: query capability, lifecycle manager, static resources.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use connector_infra::{ConnectorConfig, DatasetCapability, DatasetError};
use connector_jobs::{LifecycleManager, QueryCapability};

/// Everything the handlers need, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppServices {
    manager: LifecycleManager,
    resource_dir: PathBuf,
}

impl AppServices {
    pub fn new(manager: LifecycleManager, resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            manager,
            resource_dir: resource_dir.into(),
        }
    }

    pub fn manager(&self) -> &LifecycleManager {
        &self.manager
    }

    pub fn resource_dir(&self) -> &Path {
        &self.resource_dir
    }
}

/// Build services from configuration.
///
/// Must be called from within a Tokio runtime (the executor binds to it).
pub fn build_services(config: &ConnectorConfig) -> Result<AppServices, DatasetError> {
    let dataset = match &config.dataset {
        Some(path) => {
            let dataset = DatasetCapability::from_file(path)?;
            info!(path = %path.display(), entities = dataset.len(), "dataset loaded");
            dataset
        }
        None => {
            warn!("no dataset configured; every query returns an empty result");
            DatasetCapability::default()
        }
    };

    let capability: Arc<dyn QueryCapability> = Arc::new(dataset.with_delay(config.query_delay));
    let manager = LifecycleManager::new(capability, config.jobs.clone());

    Ok(AppServices::new(manager, config.resource_dir.clone()))
}
