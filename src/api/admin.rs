//! Admin API endpoints
//!
//! JSON endpoints for site administration, nested under `/api/v1/admin`
//! behind the auth and admin guards:
//! - Category and location CRUD
//! - Post list with title search and category filter, quick edit, delete
//! - Comment list and delete
//! - User list

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, double_option, AdminPaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{
    CategoryResponse, CommentResponse, LocationResponse, PaginatedResponse, PostResponse,
    PostSummaryResponse, UserResponse,
};
use crate::models::{
    CreateCategoryInput, CreateLocationInput, ListParams, UpdateCategoryInput,
    UpdateLocationInput, UpdatePostInput,
};

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", put(update_category).delete(delete_category))
        .route("/locations", get(list_locations).post(create_location))
        .route("/locations/{id}", put(update_location).delete(delete_location))
        .route("/posts", get(list_posts))
        .route("/posts/{id}", put(update_post).delete(delete_post))
        .route("/comments", get(list_comments))
        .route("/comments/{id}", axum::routing::delete(delete_comment))
        .route("/users", get(list_users))
}

// ============================================================================
// Categories
// ============================================================================

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = state.category_service.list().await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let category = state.category_service.create(body).await?;
    tracing::info!("Admin {} created category {}", user.username, category.slug);
    Ok((StatusCode::CREATED, Json(category.into())))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let category = state.category_service.update(id, body).await?;
    Ok(Json(category.into()))
}

/// Posts of the category keep existing without one
async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Locations
// ============================================================================

async fn list_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<LocationResponse>>, ApiError> {
    let locations = state.location_service.list().await?;
    Ok(Json(locations.into_iter().map(Into::into).collect()))
}

async fn create_location(
    State(state): State<AppState>,
    Json(body): Json<CreateLocationInput>,
) -> Result<(StatusCode, Json<LocationResponse>), ApiError> {
    let location = state.location_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(location.into())))
}

async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateLocationInput>,
) -> Result<Json<LocationResponse>, ApiError> {
    let location = state.location_service.update(id, body).await?;
    Ok(Json(location.into()))
}

async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.location_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Posts
// ============================================================================

/// Query for the admin post list
#[derive(Debug, Deserialize)]
pub struct AdminPostsQuery {
    /// Substring of the title
    pub search: Option<String>,
    pub category_id: Option<i64>,
    #[serde(default = "default_page")]
    pub page: u32,
}

/// Fields editable straight from the post list
#[derive(Debug, Deserialize)]
pub struct QuickEditRequest {
    #[serde(default)]
    pub is_published: Option<bool>,
    /// `null` removes the category
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
}

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<AdminPostsQuery>,
) -> Result<Json<PaginatedResponse<PostSummaryResponse>>, ApiError> {
    let search = query.search.filter(|s| !s.trim().is_empty());
    let result = state
        .post_service
        .admin_list(search, query.category_id, query.page)
        .await?;
    Ok(Json(PaginatedResponse::from_paged(result)))
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<QuickEditRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let input = UpdatePostInput {
        is_published: body.is_published,
        category_id: body.category_id,
        ..Default::default()
    };
    if input.is_empty() {
        return Err(ApiError::validation_error("Nothing to update"));
    }
    let post = state.post_service.admin_update(id, input).await?;
    Ok(Json(post.into()))
}

async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let post = state.post_service.admin_delete(id).await?;
    tracing::info!("Admin {} deleted post {}", user.username, post.id);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Comments and users
// ============================================================================

async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<AdminPaginationQuery>,
) -> Result<Json<PaginatedResponse<CommentResponse>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let result = state.comment_service.admin_list(&params).await?;
    Ok(Json(PaginatedResponse::from_paged(result)))
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.admin_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<AdminPaginationQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let result = state.user_service.list_users(&params).await?;
    Ok(Json(PaginatedResponse::from_paged(result)))
}
