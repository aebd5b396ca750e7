use axum::{Router, routing::get};

pub mod queries;
pub mod resources;
pub mod system;

/// Router for the connector endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/config", get(resources::config))
        .route("/schema", get(resources::schema))
        .route("/charting-schemes", get(resources::charting_schemes))
        .merge(queries::router())
}
