//! Dataset-backed query capability.
//!
//! Stands in for the external system: entities and links are loaded from a
//! JSON file (same shape as a query result) and filtered by the criteria.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use connector_core::{Entity, QueryCriteria, QueryResult};
use connector_jobs::{QueryCapability, QueryError};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Answers queries from an in-memory dataset.
#[derive(Debug, Clone, Default)]
pub struct DatasetCapability {
    dataset: Arc<QueryResult>,
    delay: Duration,
}

impl DatasetCapability {
    pub fn new(dataset: QueryResult) -> Self {
        Self {
            dataset: Arc::new(dataset),
            delay: Duration::ZERO,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset = serde_json::from_str(&raw).map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(dataset))
    }

    /// Simulated latency before each answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn len(&self) -> usize {
        self.dataset.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.entities.is_empty()
    }

    fn search(&self, criteria: &QueryCriteria) -> Result<QueryResult, QueryError> {
        for (key, value) in criteria.iter() {
            if value.is_array() || value.is_object() || value.is_null() {
                return Err(QueryError::InvalidCriteria(format!(
                    "condition {key} must be a string, number or boolean"
                )));
            }
        }

        let entities: Vec<Entity> = self
            .dataset
            .entities
            .iter()
            .filter(|entity| {
                criteria.iter().all(|(key, expected)| {
                    entity
                        .properties
                        .get(key)
                        .is_some_and(|actual| value_matches(actual, expected))
                })
            })
            .cloned()
            .collect();

        let matched: HashSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        let links = self
            .dataset
            .links
            .iter()
            .filter(|link| {
                matched.contains(link.from_end_id.as_str()) && matched.contains(link.to_end_id.as_str())
            })
            .cloned()
            .collect();

        Ok(QueryResult::new(entities, links))
    }
}

/// Strings match case-insensitively by substring; other scalars by equality.
fn value_matches(actual: &JsonValue, expected: &JsonValue) -> bool {
    match (actual, expected) {
        (JsonValue::String(actual), JsonValue::String(expected)) => actual
            .to_lowercase()
            .contains(&expected.to_lowercase()),
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

#[async_trait]
impl QueryCapability for DatasetCapability {
    async fn execute(
        &self,
        criteria: &QueryCriteria,
        cancel: CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(QueryError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        let result = self.search(criteria)?;
        debug!(
            conditions = criteria.len(),
            entities = result.entities.len(),
            links = result.links.len(),
            "dataset query answered"
        );
        Ok(result)
    }
}
