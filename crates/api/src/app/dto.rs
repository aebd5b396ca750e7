use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use connector_core::{Condition, Entity, JobId, Link, QueryResult};
use connector_jobs::{DeletedJob, JobStateKind, JobStatusReport};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ConnectorRequest {
    pub payload: RequestPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestPayload {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncQueryResponse {
    pub query_id: JobId,
}

/// Wire names of the job states.
pub fn state_name(state: JobStateKind) -> &'static str {
    match state {
        JobStateKind::Running => "STARTED",
        JobStateKind::Completed => "SUCCEEDED",
        JobStateKind::Failed => "FAILED",
        JobStateKind::Cancelled => "CANCELLED",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubstatusType {
    Information,
    Error,
}

#[derive(Debug, Serialize)]
pub struct Substatus {
    #[serde(rename = "type")]
    pub kind: SubstatusType,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncStatusResponse {
    pub query_id: JobId,
    pub state: &'static str,
    pub substatuses: Vec<Substatus>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<JobStatusReport> for AsyncStatusResponse {
    fn from(report: JobStatusReport) -> Self {
        let substatuses = match (&report.error, report.state) {
            (Some(error), _) => vec![Substatus {
                kind: SubstatusType::Error,
                message: error.to_string(),
            }],
            (None, JobStateKind::Running) => vec![Substatus {
                kind: SubstatusType::Information,
                message: "query is running".to_string(),
            }],
            (None, _) => Vec::new(),
        };
        Self {
            query_id: report.id,
            state: state_name(report.state),
            substatuses,
            submitted_at: report.submitted_at,
            completed_at: report.completed_at,
        }
    }
}

/// Results body: the data, or an error message for a failed query.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorResponse<'a> {
    pub entities: &'a [Entity],
    pub links: &'a [Link],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl<'a> ConnectorResponse<'a> {
    pub fn from_result(result: &'a QueryResult) -> Self {
        Self {
            entities: &result.entities,
            links: &result.links,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            entities: &[],
            links: &[],
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingResponse {
    pub query_id: JobId,
    pub state: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub query_id: JobId,
    pub state: &'static str,
    pub cancelled: bool,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<DeletedJob> for DeleteResponse {
    fn from(deleted: DeletedJob) -> Self {
        Self {
            query_id: deleted.id,
            state: state_name(deleted.state),
            cancelled: deleted.cancelled,
            submitted_at: deleted.submitted_at,
            completed_at: deleted.completed_at,
        }
    }
}
