pub mod assets;
pub mod home;
pub mod posts;
pub mod profile;
pub mod storage;
pub mod views;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The whole app, ready to serve.
pub fn router(state: AppState) -> Router {
    let max_upload = state.config.storage.max_upload_bytes;

    Router::new()
        .route("/", get(home::index))
        .route("/notifications", get(home::notifications))
        .route("/assets/{*path}", get(assets::serve))
        .route("/storage/{bucket}/{*key}", get(storage::serve))
        .merge(posts::router())
        .merge(profile::router())
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
