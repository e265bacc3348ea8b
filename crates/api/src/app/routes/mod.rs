use axum::Router;

pub mod containers;
pub mod fixture;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .merge(fixture::router())
        .nest("/containers", containers::router())
}
