//! Post service
//!
//! Listings and detail lookups go through [`PostQuery`], so every read
//! applies the visibility rule for the current viewer. Edits and deletes
//! from the site run the ownership guard first; the admin variants skip it.

use crate::db::repositories::{CategoryRepository, LocationRepository, PostRepository};
use crate::models::{
    CreatePostInput, ListParams, PagedResult, Post, PostWithMeta, PublicationMeta,
    UpdatePostInput, MAX_POST_TITLE_LENGTH,
};
use crate::services::media::MediaStore;
use crate::services::ownership::{ensure_author, OwnershipDenied};
use crate::services::visibility::PostQuery;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Default posts per page
pub const DEFAULT_POSTS_PER_PAGE: u32 = 10;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Forbidden(#[from] OwnershipDenied),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    location_repo: Arc<dyn LocationRepository>,
    media: Arc<MediaStore>,
    per_page: u32,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        location_repo: Arc<dyn LocationRepository>,
        media: Arc<MediaStore>,
    ) -> Self {
        Self::with_page_size(repo, category_repo, location_repo, media, DEFAULT_POSTS_PER_PAGE)
    }

    pub fn with_page_size(
        repo: Arc<dyn PostRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        location_repo: Arc<dyn LocationRepository>,
        media: Arc<MediaStore>,
        per_page: u32,
    ) -> Self {
        Self {
            repo,
            category_repo,
            location_repo,
            media,
            per_page,
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Published posts, newest first. Authors find their drafts on their
    /// profile, not here.
    pub async fn list_published(
        &self,
        page: u32,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        self.page_of(&PostQuery::published(Utc::now()), page).await
    }

    /// Published posts of one category; the caller has checked the category
    pub async fn list_for_category(
        &self,
        category_id: i64,
        page: u32,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        let query = PostQuery::published(Utc::now()).in_category(category_id);
        self.page_of(&query, page).await
    }

    /// Posts on an author's profile: all of them for the author, visible
    /// ones for everybody else
    pub async fn list_for_author(
        &self,
        author_id: i64,
        viewer_id: Option<i64>,
        page: u32,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        let query = if viewer_id == Some(author_id) {
            PostQuery::unfiltered()
        } else {
            PostQuery::visible_to(viewer_id, Utc::now())
        };
        self.page_of(&query.by_author(author_id), page).await
    }

    /// A post the viewer may see, with author, category, location and
    /// comment count
    pub async fn get_visible(
        &self,
        id: i64,
        viewer_id: Option<i64>,
    ) -> Result<PostWithMeta, PostServiceError> {
        let query = PostQuery::visible_to(viewer_id, Utc::now()).single(id);
        self.repo
            .find(&query)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Post>, PostServiceError> {
        let post = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get post by ID")?;
        Ok(post)
    }

    /// A post its author is about to edit or delete
    pub async fn get_owned(&self, viewer_id: i64, id: i64) -> Result<Post, PostServiceError> {
        let post = self.require(id).await?;
        ensure_author(viewer_id, &post)?;
        Ok(post)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub async fn create(
        &self,
        author_id: i64,
        input: CreatePostInput,
    ) -> Result<Post, PostServiceError> {
        let title = input.title.trim().to_string();
        validate_title(&title)?;
        validate_text(&input.text)?;
        self.validate_refs(input.category_id, input.location_id).await?;

        let post = Post {
            id: 0,
            title,
            text: input.text,
            pub_date: input.pub_date,
            author_id,
            location_id: input.location_id,
            category_id: input.category_id,
            image: input.image,
            meta: PublicationMeta::with_published(input.is_published),
        };

        let created = self.repo.create(&post).await.context("Failed to create post")?;
        tracing::info!("User {} created post {}", author_id, created.id);
        Ok(created)
    }

    /// Edit a post as its author
    pub async fn update(
        &self,
        viewer_id: i64,
        id: i64,
        input: UpdatePostInput,
    ) -> Result<Post, PostServiceError> {
        let post = self.get_owned(viewer_id, id).await?;
        self.apply_update(post, input).await
    }

    /// Delete a post as its author; its comments go with it
    pub async fn delete(&self, viewer_id: i64, id: i64) -> Result<Post, PostServiceError> {
        let post = self.get_owned(viewer_id, id).await?;
        self.remove(post).await
    }

    // ========================================================================
    // Admin
    // ========================================================================

    /// Every post, optionally filtered by title and category
    pub async fn admin_list(
        &self,
        search: Option<String>,
        category_id: Option<i64>,
        page: u32,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        let mut query = PostQuery::unfiltered().with_search(search);
        if let Some(category_id) = category_id {
            query = query.in_category(category_id);
        }
        let params = ListParams::new(page, self.per_page);
        let result = self
            .repo
            .query(&query, &params)
            .await
            .context("Failed to list posts")?;
        Ok(result)
    }

    pub async fn admin_update(
        &self,
        id: i64,
        input: UpdatePostInput,
    ) -> Result<Post, PostServiceError> {
        let post = self.require(id).await?;
        self.apply_update(post, input).await
    }

    pub async fn admin_delete(&self, id: i64) -> Result<Post, PostServiceError> {
        let post = self.require(id).await?;
        self.remove(post).await
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn page_of(
        &self,
        query: &PostQuery,
        page: u32,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        let params = ListParams::new(page, self.per_page);
        let result = self
            .repo
            .query(query, &params)
            .await
            .context("Failed to list posts")?;

        if result.is_out_of_range() {
            return Err(PostServiceError::NotFound(format!("page {}", page)));
        }
        Ok(result)
    }

    async fn require(&self, id: i64) -> Result<Post, PostServiceError> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))
    }

    async fn apply_update(
        &self,
        mut post: Post,
        input: UpdatePostInput,
    ) -> Result<Post, PostServiceError> {
        if let Some(title) = &input.title {
            validate_title(title.trim())?;
        }
        if let Some(text) = &input.text {
            validate_text(text)?;
        }
        self.validate_refs(input.category_id.flatten(), input.location_id.flatten())
            .await?;

        let old_image = post.image.clone();
        input.apply_to(&mut post);
        post.title = post.title.trim().to_string();

        let updated = self.repo.update(&post).await.context("Failed to update post")?;

        if let Some(old) = old_image.filter(|old| updated.image.as_ref() != Some(old)) {
            self.discard_image(&old).await;
        }
        Ok(updated)
    }

    async fn remove(&self, post: Post) -> Result<Post, PostServiceError> {
        self.repo.delete(post.id).await.context("Failed to delete post")?;
        if let Some(image) = &post.image {
            self.discard_image(image).await;
        }
        tracing::info!("Deleted post {}", post.id);
        Ok(post)
    }

    async fn discard_image(&self, path: &str) {
        if let Err(e) = self.media.delete(path).await {
            tracing::warn!("Failed to remove image {}: {}", path, e);
        }
    }

    async fn validate_refs(
        &self,
        category_id: Option<i64>,
        location_id: Option<i64>,
    ) -> Result<(), PostServiceError> {
        if let Some(id) = category_id {
            if self
                .category_repo
                .get_by_id(id)
                .await
                .context("Failed to get category")?
                .is_none()
            {
                return Err(PostServiceError::ValidationError(format!(
                    "Category {} does not exist",
                    id
                )));
            }
        }
        if let Some(id) = location_id {
            if self
                .location_repo
                .get_by_id(id)
                .await
                .context("Failed to get location")?
                .is_none()
            {
                return Err(PostServiceError::ValidationError(format!(
                    "Location {} does not exist",
                    id
                )));
            }
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), PostServiceError> {
    if title.trim().is_empty() {
        return Err(PostServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_POST_TITLE_LENGTH {
        return Err(PostServiceError::ValidationError(format!(
            "Title cannot exceed {} characters",
            MAX_POST_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn validate_text(text: &str) -> Result<(), PostServiceError> {
    if text.trim().is_empty() {
        return Err(PostServiceError::ValidationError(
            "Text cannot be empty".to_string(),
        ));
    }
    Ok(())
}
