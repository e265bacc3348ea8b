//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection, fixture loading, move service wiring
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use tree_infra::config::AppConfig;
use tree_infra::move_service::MoveError;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> Result<Router, MoveError> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router_with(services))
}

/// Router over already-wired services.
pub fn router_with(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
