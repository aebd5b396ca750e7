//! Static connector descriptors served from the resource directory.

use std::io::ErrorKind;
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::app::{errors, services::AppServices};

const JSON: &str = "application/json";
const XML: &str = "application/xml";

/// GET /config
pub async fn config(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    serve(&services, "config.json", JSON).await
}

/// GET /schema
pub async fn schema(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    serve(&services, "schema.xml", XML).await
}

/// GET /charting-schemes
pub async fn charting_schemes(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    serve(&services, "charting-schemes.xml", XML).await
}

async fn serve(services: &AppServices, file: &str, content_type: &'static str) -> axum::response::Response {
    let path = services.resource_dir().join(file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes).into_response(),
        Err(e) if e.kind() == ErrorKind::NotFound => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("{file} is not available"),
        ),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read resource");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "resource_error",
                format!("failed to read {file}"),
            )
        }
    }
}
