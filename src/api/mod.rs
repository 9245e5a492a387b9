//! HTTP layer - handlers and routing
//!
//! HTML pages:
//! - Post listings, detail, create/edit/delete
//! - Comments
//! - Profiles
//! - Login, logout and registration
//!
//! JSON admin API under `/api/v1/admin`, and uploaded images under `/media`.

pub mod admin;
pub mod auth;
pub mod comments;
pub mod common;
pub mod middleware;
pub mod posts;
pub mod profile;
pub mod responses;

#[cfg(test)]
mod tests;

use axum::{extract::DefaultBodyLimit, middleware as axum_middleware, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, LoginRequired, Viewer};
pub use responses::PageError;

/// Room for the text fields sent along with an image
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the admin API router (needs the admin role)
pub fn build_api_router() -> Router<AppState> {
    let admin_routes = admin::router()
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn(middleware::require_auth));

    Router::new().nest("/admin", admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.media.max_file_size as usize + FORM_OVERHEAD_BYTES;
    let media = ServeDir::new(state.media.root());

    Router::new()
        .merge(posts::router())
        .merge(comments::router())
        .merge(profile::router())
        .nest("/auth", auth::router())
        .nest("/api/v1", build_api_router())
        .nest_service("/media", media)
        .fallback(not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        // runs before the error pages so they know who is looking
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_viewer,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> PageError {
    PageError::NotFound
}
