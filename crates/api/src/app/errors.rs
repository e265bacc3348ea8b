use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tree_core::{ContainerId, DomainError};
use tree_infra::move_service::MoveError;
use tree_infra::store::StoreError;

pub fn move_error_to_response(err: MoveError) -> axum::response::Response {
    match err {
        MoveError::Precondition(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "precondition_violation", msg)
        }
        MoveError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        e @ (MoveError::SourceNotFound(_) | MoveError::DestinationNotFound(_)) => {
            json_error(StatusCode::NOT_FOUND, "not_found", e.to_string())
        }
        MoveError::Store(e) => store_error_to_response(e),
    }
}

fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        e => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
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

pub fn parse_container_id(raw: &str) -> Result<ContainerId, axum::response::Response> {
    raw.parse::<ContainerId>()
        .map_err(|e: DomainError| move_error_to_response(MoveError::from(e)))
}
