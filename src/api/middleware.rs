//! HTTP middleware and extractors
//!
//! Contains:
//! - Application state shared by every handler
//! - Viewer resolution (session cookie or bearer token)
//! - Login, authentication and admin guards
//! - Error page rendering for HTML responses

use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tera::Context as TeraContext;

use crate::api::responses::{ErrorPage, PageError};
use crate::config::Config;
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxCommentRepository, SqlxLocationRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::services::{
    CategoryService, CategoryServiceError, CommentService, CommentServiceError, LocationService,
    LocationServiceError, MediaStore, PostService, PostServiceError, UserService,
    UserServiceError,
};
use crate::theme::{simple_error_page, StandardTemplateVars, ThemeEngine};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub category_service: Arc<CategoryService>,
    pub location_service: Arc<LocationService>,
    pub media: Arc<MediaStore>,
    pub theme: Arc<ThemeEngine>,
}

impl AppState {
    /// Wire the repositories and services over `pool`
    pub fn new(pool: DynDatabasePool, config: Config, theme: ThemeEngine) -> Self {
        let media = Arc::new(MediaStore::new(config.media.clone()));

        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let location_repo = SqlxLocationRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());

        let user_service = UserService::with_session_days(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            config.blog.session_days,
        );
        let post_service = PostService::with_page_size(
            post_repo.clone(),
            category_repo.clone(),
            location_repo.clone(),
            media.clone(),
            config.blog.posts_per_page,
        );
        let comment_service =
            CommentService::new(SqlxCommentRepository::boxed(pool.clone()), post_repo);

        Self {
            config: Arc::new(config),
            user_service: Arc::new(user_service),
            post_service: Arc::new(post_service),
            comment_service: Arc::new(comment_service),
            category_service: Arc::new(CategoryService::new(category_repo)),
            location_service: Arc::new(LocationService::new(location_repo)),
            media,
            theme: Arc::new(theme),
        }
    }

    /// Render a page with the standard variables
    pub fn render(
        &self,
        template: &str,
        context: &TeraContext,
        user: Option<&User>,
        path: &str,
    ) -> Result<Html<String>, PageError> {
        let vars = StandardTemplateVars::new(&self.config.blog.site_name, path).with_user(user);
        self.theme
            .render_with_standard_vars(template, context, &vars)
            .map(Html)
            .map_err(|e| PageError::Internal(format!("{:#}", e)))
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Whoever is looking at a page, possibly nobody
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user: Option<User>,
    /// Path and query of the request
    pub path: String,
}

impl Viewer {
    pub fn id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            user: parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|au| au.0.clone()),
            path: request_path(parts),
        })
    }
}

/// A logged-in user; anonymous visitors are sent to the login page
#[derive(Debug, Clone)]
pub struct LoginRequired {
    pub user: User,
    pub path: String,
}

impl<S: Send + Sync> FromRequestParts<S> for LoginRequired {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let path = request_path(parts);
        match parts.extensions.get::<AuthenticatedUser>() {
            Some(au) => Ok(Self {
                user: au.0.clone(),
                path,
            }),
            None => Err(Redirect::to(&login_url(&path))),
        }
    }
}

fn request_path(parts: &Parts) -> String {
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or(&parts.uri);
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Login page that returns to `next` afterwards
pub fn login_url(next: &str) -> String {
    format!("/auth/login/?next={}", urlencoding::encode(next))
}

// ============================================================================
// API errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("API error: {}", self.error.message);
        }
        (status, Json(self)).into_response()
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::DuplicateSlug(msg) => ApiError::conflict(msg),
            CategoryServiceError::NotFound(what) => {
                ApiError::not_found(format!("Category not found: {}", what))
            }
            CategoryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CategoryServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<LocationServiceError> for ApiError {
    fn from(e: LocationServiceError) -> Self {
        match e {
            LocationServiceError::NotFound(id) => {
                ApiError::not_found(format!("Location not found: {}", id))
            }
            LocationServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            LocationServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound(what) => ApiError::not_found(format!("Post not found: {}", what)),
            PostServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PostServiceError::Forbidden(denied) => ApiError::forbidden(denied.to_string()),
            PostServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound(id) => {
                ApiError::not_found(format!("Comment not found: {}", id))
            }
            CommentServiceError::PostNotFound(id) => {
                ApiError::not_found(format!("Post not found: {}", id))
            }
            CommentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommentServiceError::Forbidden(denied) => ApiError::forbidden(denied.to_string()),
            CommentServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::NotFound(what) => ApiError::not_found(format!("User not found: {}", what)),
            UserServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Extract session token from request headers
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Resolve the current user for every request
///
/// Invalid or expired tokens leave the request anonymous.
pub async fn resolve_viewer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// Authentication middleware for the JSON API
pub async fn require_auth(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.extensions().get::<AuthenticatedUser>().is_none() {
        return Err(ApiError::unauthorized("Missing or invalid authentication token"));
    }
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if user.0.role != UserRole::Admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Replace the body of HTML error responses with the themed error page
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|au| au.0.clone());
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let response = next.run(request).await;
    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };

    let mut context = TeraContext::new();
    context.insert("status", &page.status);
    context.insert("message", &page.message);

    let html = match state.render("error.html", &context, user.as_ref(), &path) {
        Ok(Html(html)) => html,
        Err(e) => {
            tracing::error!("Failed to render error page: {:?}", e);
            simple_error_page(page.status, &page.message)
        }
    };

    (response.status(), Html(html)).into_response()
}

// ============================================================================
// Tests
// ============================================================================
