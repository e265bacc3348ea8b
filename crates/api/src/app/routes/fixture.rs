use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/update-documents", post(update_documents))
        .route("/reset-database", post(reset_database))
}

/// Move `mixed-contents` under `production-lot`.
pub async fn update_documents(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.move_fixture_subtree().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::move_error_to_response(e),
    }
}

pub async fn reset_database(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.reset_fixture().await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => errors::move_error_to_response(e),
    }
}
