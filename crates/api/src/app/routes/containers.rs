use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_container))
        .route("/:id/inventory-items", get(list_items_under))
        .route("/:id/move", post(move_container))
}

pub async fn get_container(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_container_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.container(&id).await {
        Ok(Some(container)) => Json(container).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("container not found: {id}"),
        ),
        Err(e) => errors::move_error_to_response(e),
    }
}

/// Items whose current chain contains the container, at any depth.
pub async fn list_items_under(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_container_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.items_under(&id).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => errors::move_error_to_response(e),
    }
}

pub async fn move_container(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::MoveContainerRequest>,
) -> axum::response::Response {
    let source = match errors::parse_container_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let destination = match errors::parse_container_id(&body.destination_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.move_subtree(&source, &destination).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::move_error_to_response(e),
    }
}
