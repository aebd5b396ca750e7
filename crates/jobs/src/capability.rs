//! The external "execute query" capability consumed by the executor.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use connector_core::{QueryCriteria, QueryResult};

/// Error reported by a query capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),
    #[error("external system error: {0}")]
    External(String),
    #[error("query cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Runs one acquisition against the external system.
///
/// Implementations should watch `cancel` and return early when it fires; the
/// executor stops waiting either way.
#[async_trait]
pub trait QueryCapability: Send + Sync + 'static {
    async fn execute(
        &self,
        criteria: &QueryCriteria,
        cancel: CancellationToken,
    ) -> Result<QueryResult, QueryError>;
}

/// Adapter for synchronous capabilities; runs them on the blocking pool.
pub struct BlockingCapability<F> {
    inner: Arc<F>,
}

impl<F> BlockingCapability<F>
where
    F: Fn(&QueryCriteria, &CancellationToken) -> Result<QueryResult, QueryError>
        + Send
        + Sync
        + 'static,
{
    pub fn new(f: F) -> Self {
        Self { inner: Arc::new(f) }
    }
}

#[async_trait]
impl<F> QueryCapability for BlockingCapability<F>
where
    F: Fn(&QueryCriteria, &CancellationToken) -> Result<QueryResult, QueryError>
        + Send
        + Sync
        + 'static,
{
    async fn execute(
        &self,
        criteria: &QueryCriteria,
        cancel: CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        let f = self.inner.clone();
        let criteria = criteria.clone();
        tokio::task::spawn_blocking(move || f(&criteria, &cancel))
            .await
            .map_err(|e| QueryError::Internal(format!("blocking query aborted: {e}")))?
    }
}
