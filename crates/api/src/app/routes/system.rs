use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::{errors, services::AppServices};

/// GET /health
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.manager().stats() {
        Ok(jobs) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "jobs": jobs,
                "executor": services.manager().executor_stats(),
            })),
        )
            .into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}
