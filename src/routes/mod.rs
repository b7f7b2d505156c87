pub mod home;
pub mod posts;
pub mod users;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router with state applied.
pub fn app(state: AppState) -> Router {
    let uploads = ServeDir::new(state.config.uploads_path());

    Router::new()
        .route("/", get(home::index))
        .route("/health", get(home::health))
        .merge(posts::router())
        .merge(users::router())
        .nest_service("/uploads", uploads)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
