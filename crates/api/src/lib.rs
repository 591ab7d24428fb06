pub mod config;
pub mod error;
pub mod metrics;
pub mod render;
pub mod routes;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use config::{ServiceConfig, get_configuration};
pub use error::ApiError;
pub use state::{ActiveModel, AppState, ServiceContext};

pub fn router(state: AppState) -> Router {
    let configs = ServeDir::new(&state.settings.configs_dir);
    let body_limit = state.settings.max_upload_bytes;

    Router::new()
        .route("/config", post(routes::set_config))
        .route("/detect", post(routes::detect))
        .route("/health", get(routes::health))
        .nest_service("/configs", configs)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
