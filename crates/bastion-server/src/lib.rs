//! Bastion Server: axum adapter over the credential lifecycle engine.

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

/// Assemble the full application router.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`;
/// every token is bound to the peer address.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/ping", get(routes::ping))
        .route("/api/v1/auth/login", post(routes::login))
        .route("/api/v1/auth/register", post(routes::register))
        .route(
            "/api/v1/auth/register-superuser",
            post(routes::register_superuser),
        )
        .route("/api/v1/auth/logout", post(routes::logout))
        .route("/api/v1/auth/logout-all", post(routes::logout_all))
        .route("/api/v1/users", get(routes::list_users))
        .route(
            "/api/v1/users/me",
            get(routes::read_me).put(routes::update_me),
        )
        .route("/api/v1/users/me/sessions", get(routes::my_sessions))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auto_refresh,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
}
