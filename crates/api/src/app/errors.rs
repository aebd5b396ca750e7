use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use connector_core::{DomainError, JobId};
use connector_jobs::JobError;

pub fn job_error_to_response(err: JobError) -> axum::response::Response {
    match err {
        JobError::NotFound(_) => not_found(),
        JobError::DuplicateId(id) => {
            tracing::error!(job_id = %id, "query id collision");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "duplicate_id", "query id collision")
        }
        JobError::Storage(msg) => {
            tracing::error!(error = %msg, "job storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(_) => not_found(),
    }
}

/// The single not-found response for unknown, deleted, expired and malformed ids.
pub fn not_found() -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", "query not found")
}

/// Parse a path id; anything unparseable is simply unknown.
pub fn parse_query_id(raw: &str) -> Result<JobId, axum::response::Response> {
    raw.parse::<JobId>().map_err(domain_error_to_response)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
