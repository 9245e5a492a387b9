//! Shared response types
//!
//! HTML handlers fail with [`PageError`]; the admin API serializes the
//! structures below.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;

use crate::api::common::post_url;
use crate::models::{Category, CommentWithMeta, Location, PagedResult, Post, PostWithMeta, User};
use crate::services::{
    CategoryServiceError, CommentServiceError, LocationServiceError, MediaError, PostServiceError,
    UserServiceError,
};
use crate::theme::simple_error_page;

// ============================================================================
// HTML errors
// ============================================================================

/// Failure of an HTML handler
#[derive(Debug)]
pub enum PageError {
    NotFound,
    Forbidden(String),
    BadRequest(String),
    /// Send the user elsewhere (303)
    Redirect(String),
    Internal(String),
}

/// Marker left on error responses; `render_error_pages` swaps in the
/// themed page
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: u16,
    pub message: String,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            PageError::Redirect(to) => return Redirect::to(&to).into_response(),
            PageError::NotFound => (
                StatusCode::NOT_FOUND,
                "The page you requested does not exist.".to_string(),
            ),
            PageError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            PageError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            PageError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The server could not process the request.".to_string(),
                )
            }
        };

        let mut response =
            (status, Html(simple_error_page(status.as_u16(), &message))).into_response();
        response.extensions_mut().insert(ErrorPage {
            status: status.as_u16(),
            message,
        });
        response
    }
}

impl From<PostServiceError> for PageError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound(_) => PageError::NotFound,
            PostServiceError::ValidationError(msg) => PageError::BadRequest(msg),
            PostServiceError::Forbidden(denied) => PageError::Redirect(post_url(denied.post_id)),
            PostServiceError::InternalError(e) => PageError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<CommentServiceError> for PageError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound(_) | CommentServiceError::PostNotFound(_) => {
                PageError::NotFound
            }
            CommentServiceError::ValidationError(msg) => PageError::BadRequest(msg),
            CommentServiceError::Forbidden(denied) => {
                PageError::Redirect(post_url(denied.post_id))
            }
            CommentServiceError::InternalError(e) => PageError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<UserServiceError> for PageError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::NotFound(_) => PageError::NotFound,
            UserServiceError::AuthenticationError(msg)
            | UserServiceError::ValidationError(msg)
            | UserServiceError::UserExists(msg) => PageError::BadRequest(msg),
            UserServiceError::InternalError(e) => PageError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<CategoryServiceError> for PageError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::NotFound(_) => PageError::NotFound,
            CategoryServiceError::DuplicateSlug(msg) | CategoryServiceError::ValidationError(msg) => {
                PageError::BadRequest(msg)
            }
            CategoryServiceError::InternalError(e) => PageError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<LocationServiceError> for PageError {
    fn from(e: LocationServiceError) -> Self {
        match e {
            LocationServiceError::NotFound(_) => PageError::NotFound,
            LocationServiceError::ValidationError(msg) => PageError::BadRequest(msg),
            LocationServiceError::InternalError(e) => PageError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<MediaError> for PageError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Io(e) => PageError::Internal(format!("Failed to store image: {}", e)),
            other => PageError::BadRequest(other.to_string()),
        }
    }
}

// ============================================================================
// Admin API response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub created_at: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            title: category.title,
            description: category.description,
            slug: category.slug,
            is_published: category.meta.is_published,
            created_at: category.meta.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    pub created_at: String,
}

impl From<Location> for LocationResponse {
    fn from(location: Location) -> Self {
        Self {
            id: location.id,
            name: location.name,
            is_published: location.meta.is_published,
            created_at: location.meta.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub pub_date: String,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub is_published: bool,
    pub created_at: String,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        let image_url = post.image_url();
        Self {
            id: post.id,
            title: post.title,
            text: post.text,
            pub_date: post.pub_date.to_rfc3339(),
            author_id: post.author_id,
            category_id: post.category_id,
            location_id: post.location_id,
            image_url,
            is_published: post.meta.is_published,
            created_at: post.meta.created_at.to_rfc3339(),
        }
    }
}

/// Row of the admin post list
#[derive(Debug, Serialize)]
pub struct PostSummaryResponse {
    pub id: i64,
    pub title: String,
    pub pub_date: String,
    pub author: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub is_published: bool,
    pub comment_count: i64,
}

impl From<PostWithMeta> for PostSummaryResponse {
    fn from(item: PostWithMeta) -> Self {
        Self {
            id: item.post.id,
            title: item.post.display_title().to_string(),
            pub_date: item.post.pub_date.to_rfc3339(),
            author: item.author_username,
            category: item.category.map(|c| c.title),
            location: item.location.map(|l| l.name),
            is_published: item.post.meta.is_published,
            comment_count: item.comment_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub author_id: i64,
    pub author: String,
    pub created_at: String,
}

impl From<CommentWithMeta> for CommentResponse {
    fn from(item: CommentWithMeta) -> Self {
        Self {
            id: item.comment.id,
            text: item.comment.text,
            post_id: item.comment.post_id,
            author_id: item.comment.author_id,
            author: item.author_username,
            created_at: item.comment.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// One page of a list
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    /// Convert every item of `result`
    pub fn from_paged<U: Into<T>>(result: PagedResult<U>) -> Self {
        let total_pages = result.total_pages();
        Self {
            items: result.items.into_iter().map(Into::into).collect(),
            total: result.total,
            page: result.page,
            per_page: result.per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::OwnershipDenied;

    #[test]
    fn test_ownership_denial_redirects_to_post() {
        let err: PageError = PostServiceError::Forbidden(OwnershipDenied { post_id: 4 }).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/posts/4/");
        assert!(response.extensions().get::<ErrorPage>().is_none());
    }

    #[test]
    fn test_not_found_carries_error_page() {
        let response = PageError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let page = response.extensions().get::<ErrorPage>().unwrap();
        assert_eq!(page.status, 404);
    }

    #[test]
    fn test_internal_error_hides_details() {
        let response = PageError::Internal("db exploded".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let page = response.extensions().get::<ErrorPage>().unwrap();
        assert!(!page.message.contains("db exploded"));
    }

    #[test]
    fn test_media_errors() {
        let err: PageError = MediaError::UnsupportedType("text/plain".to_string()).into();
        assert!(matches!(err, PageError::BadRequest(_)));
    }

    #[test]
    fn test_paginated_response_counts_pages() {
        let params = crate::models::ListParams::new(2, 2);
        let result = PagedResult::new(vec![1, 2], 5, &params);
        let response: PaginatedResponse<i64> = PaginatedResponse::from_paged(result);
        assert_eq!(response.total_pages, 3);
        assert_eq!(response.items, vec![1, 2]);
    }
}
