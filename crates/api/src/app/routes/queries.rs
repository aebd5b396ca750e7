//! Asynchronous query endpoints: submit, poll status, fetch results, delete.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use connector_core::QueryCriteria;
use connector_jobs::{JobStateKind, ResultsOutcome};

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/async", post(submit_query))
        .route("/async/:query_id", get(query_status).delete(delete_query))
        .route("/async/:query_id/results", get(query_results))
}

/// POST /async
pub async fn submit_query(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::ConnectorRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                rejection.body_text(),
            );
        }
    };

    let criteria = match QueryCriteria::from_conditions(body.payload.conditions) {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.manager().acquire(criteria) {
        Ok(query_id) => (
            StatusCode::ACCEPTED,
            Json(dto::AsyncQueryResponse { query_id }),
        )
            .into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

/// GET /async/:query_id
pub async fn query_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(query_id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_query_id(&query_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.manager().status(id) {
        Ok(report) => (StatusCode::OK, Json(dto::AsyncStatusResponse::from(report))).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

/// GET /async/:query_id/results
///
/// `200` with data or with an error message, `202` while the query still runs.
pub async fn query_results(
    Extension(services): Extension<Arc<AppServices>>,
    Path(query_id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_query_id(&query_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.manager().results(id) {
        Ok(ResultsOutcome::Ready(result)) => (
            StatusCode::OK,
            Json(dto::ConnectorResponse::from_result(&result)),
        )
            .into_response(),
        Ok(ResultsOutcome::Pending) => (
            StatusCode::ACCEPTED,
            Json(dto::PendingResponse {
                query_id: id,
                state: dto::state_name(JobStateKind::Running),
                message: "query results are not yet available",
            }),
        )
            .into_response(),
        Ok(ResultsOutcome::Failed(failure)) => (
            StatusCode::OK,
            Json(dto::ConnectorResponse::failure(failure.to_string())),
        )
            .into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

/// DELETE /async/:query_id
pub async fn delete_query(
    Extension(services): Extension<Arc<AppServices>>,
    Path(query_id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_query_id(&query_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.manager().delete(id) {
        Ok(deleted) => (StatusCode::OK, Json(dto::DeleteResponse::from(deleted))).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}
