//! Comment service
//!
//! Comments can only be left on posts the commenter is able to see. As with
//! posts, edits and deletes are limited to the comment's author, while the
//! admin API may remove any comment.

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CommentWithMeta, CreateCommentInput, ListParams, PagedResult};
use crate::services::ownership::{ensure_author, OwnershipDenied};
use crate::services::visibility::PostQuery;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Longest comment accepted
pub const MAX_COMMENT_LENGTH: usize = 5000;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Comment not found: {0}")]
    NotFound(i64),

    #[error("Post not found: {0}")]
    PostNotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Forbidden(#[from] OwnershipDenied),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    post_repo: Arc<dyn PostRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, post_repo: Arc<dyn PostRepository>) -> Self {
        Self { repo, post_repo }
    }

    /// Comments under a post, oldest first
    pub async fn list_for_post(
        &self,
        post_id: i64,
    ) -> Result<Vec<CommentWithMeta>, CommentServiceError> {
        let comments = self
            .repo
            .list_by_post(post_id)
            .await
            .context("Failed to list comments")?;
        Ok(comments)
    }

    /// Comment on a post the author can see
    pub async fn create(
        &self,
        author_id: i64,
        input: CreateCommentInput,
    ) -> Result<Comment, CommentServiceError> {
        let text = validate_text(&input.text)?;

        let query = PostQuery::visible_to(Some(author_id), Utc::now()).single(input.post_id);
        if self
            .post_repo
            .find(&query)
            .await
            .context("Failed to get post")?
            .is_none()
        {
            return Err(CommentServiceError::PostNotFound(input.post_id));
        }

        let comment = Comment {
            id: 0,
            text,
            post_id: input.post_id,
            author_id,
            created_at: Utc::now(),
        };

        let created = self
            .repo
            .create(&comment)
            .await
            .context("Failed to create comment")?;

        tracing::debug!("User {} commented on post {}", author_id, created.post_id);
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Comment>, CommentServiceError> {
        let comment = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get comment by ID")?;
        Ok(comment)
    }

    /// A comment its author is about to edit or delete
    pub async fn get_owned(&self, viewer_id: i64, id: i64) -> Result<Comment, CommentServiceError> {
        let comment = self.require(id).await?;
        ensure_author(viewer_id, &comment)?;
        Ok(comment)
    }

    pub async fn update(
        &self,
        viewer_id: i64,
        id: i64,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        let comment = self.get_owned(viewer_id, id).await?;
        let text = validate_text(text)?;

        let updated = self
            .repo
            .update_text(comment.id, &text)
            .await
            .context("Failed to update comment")?;
        Ok(updated)
    }

    pub async fn delete(&self, viewer_id: i64, id: i64) -> Result<Comment, CommentServiceError> {
        let comment = self.get_owned(viewer_id, id).await?;
        self.repo
            .delete(comment.id)
            .await
            .context("Failed to delete comment")?;
        Ok(comment)
    }

    /// Latest comments across all posts
    pub async fn admin_list(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<CommentWithMeta>, CommentServiceError> {
        let items = self
            .repo
            .list_recent(params.limit(), params.offset())
            .await
            .context("Failed to list comments")?;
        let total = self.repo.count().await.context("Failed to count comments")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn admin_delete(&self, id: i64) -> Result<Comment, CommentServiceError> {
        let comment = self.require(id).await?;
        self.repo
            .delete(comment.id)
            .await
            .context("Failed to delete comment")?;
        Ok(comment)
    }

    async fn require(&self, id: i64) -> Result<Comment, CommentServiceError> {
        self.get_by_id(id)
            .await?
            .ok_or(CommentServiceError::NotFound(id))
    }
}

fn validate_text(text: &str) -> Result<String, CommentServiceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CommentServiceError::ValidationError(
            "Comment cannot be empty".to_string(),
        ));
    }
    if text.chars().count() > MAX_COMMENT_LENGTH {
        return Err(CommentServiceError::ValidationError(format!(
            "Comment cannot exceed {} characters",
            MAX_COMMENT_LENGTH
        )));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCommentRepository, SqlxPostRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Post, PublicationMeta, User, UserRole};
    use chrono::Duration;

    struct Fixture {
        service: CommentService,
        post_repo: Arc<dyn PostRepository>,
        anna: i64,
        boris: i64,
    }

    async fn setup_test_service() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let mut ids = Vec::new();
        for name in ["anna", "boris"] {
            let user = users
                .create(&User {
                    id: 0,
                    username: name.to_string(),
                    email: String::new(),
                    first_name: String::new(),
                    last_name: String::new(),
                    password_hash: "hash".to_string(),
                    role: UserRole::Author,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .await
                .unwrap();
            ids.push(user.id);
        }

        let post_repo = SqlxPostRepository::boxed(pool.clone());
        Fixture {
            service: CommentService::new(SqlxCommentRepository::boxed(pool), post_repo.clone()),
            post_repo,
            anna: ids[0],
            boris: ids[1],
        }
    }

    async fn post(fx: &Fixture, is_published: bool) -> Post {
        fx.post_repo
            .create(&Post {
                id: 0,
                title: "post".to_string(),
                text: "text".to_string(),
                pub_date: Utc::now() - Duration::hours(1),
                author_id: fx.anna,
                location_id: None,
                category_id: None,
                image: None,
                meta: PublicationMeta::with_published(is_published),
            })
            .await
            .unwrap()
    }

    fn input(post_id: i64, text: &str) -> CreateCommentInput {
        CreateCommentInput {
            post_id,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_sets_author_and_post() {
        let fx = setup_test_service().await;
        let post = post(&fx, true).await;

        let comment = fx.service.create(fx.boris, input(post.id, " nice ")).await.unwrap();
        assert_eq!(comment.author_id, fx.boris);
        assert_eq!(comment.post_id, post.id);
        assert_eq!(comment.text, "nice");

        let listed = fx.service.list_for_post(post.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].author_username, "boris");
    }

    #[tokio::test]
    async fn test_create_on_missing_or_hidden_post() {
        let fx = setup_test_service().await;
        assert!(matches!(
            fx.service.create(fx.boris, input(999, "hi")).await,
            Err(CommentServiceError::PostNotFound(999))
        ));

        let draft = post(&fx, false).await;
        assert!(matches!(
            fx.service.create(fx.boris, input(draft.id, "hi")).await,
            Err(CommentServiceError::PostNotFound(_))
        ));
        // the author can comment on their own draft
        assert!(fx.service.create(fx.anna, input(draft.id, "note")).await.is_ok());
    }

    #[tokio::test]
    async fn test_comments_listed_oldest_first() {
        let fx = setup_test_service().await;
        let post = post(&fx, true).await;
        for text in ["first", "second", "third"] {
            fx.service.create(fx.boris, input(post.id, text)).await.unwrap();
        }

        let listed = fx.service.list_for_post(post.id).await.unwrap();
        let texts: Vec<_> = listed.iter().map(|c| c.comment.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert!(listed
            .windows(2)
            .all(|w| w[0].comment.created_at <= w[1].comment.created_at));
    }

    #[tokio::test]
    async fn test_only_author_edits_and_deletes() {
        let fx = setup_test_service().await;
        let post = post(&fx, true).await;
        let comment = fx.service.create(fx.boris, input(post.id, "hello")).await.unwrap();

        assert!(matches!(
            fx.service.update(fx.anna, comment.id, "changed").await,
            Err(CommentServiceError::Forbidden(OwnershipDenied { post_id })) if post_id == post.id
        ));
        assert!(matches!(
            fx.service.delete(fx.anna, comment.id).await,
            Err(CommentServiceError::Forbidden(_))
        ));
        assert_eq!(
            fx.service.get_by_id(comment.id).await.unwrap().unwrap().text,
            "hello"
        );

        let updated = fx.service.update(fx.boris, comment.id, "changed").await.unwrap();
        assert_eq!(updated.text, "changed");

        fx.service.delete(fx.boris, comment.id).await.unwrap();
        assert!(fx.service.get_by_id(comment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let fx = setup_test_service().await;
        let post = post(&fx, true).await;
        assert!(matches!(
            fx.service.create(fx.boris, input(post.id, "   ")).await,
            Err(CommentServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_list_and_delete() {
        let fx = setup_test_service().await;
        let post = post(&fx, true).await;
        let a = fx.service.create(fx.boris, input(post.id, "a")).await.unwrap();
        fx.service.create(fx.anna, input(post.id, "b")).await.unwrap();

        let page = fx.service.admin_list(&ListParams::new(1, 10)).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].comment.text, "b");

        fx.service.admin_delete(a.id).await.unwrap();
        assert!(matches!(
            fx.service.admin_delete(a.id).await,
            Err(CommentServiceError::NotFound(_))
        ));
    }
}
