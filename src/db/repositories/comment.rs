//! Comment repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentWithMeta};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert a comment; `id` of the argument is ignored
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments under a post, oldest first
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithMeta>>;

    /// Most recent comments across all posts
    async fn list_recent(&self, limit: i64, offset: i64) -> Result<Vec<CommentWithMeta>>;

    async fn count(&self) -> Result<i64>;

    async fn update_text(&self, id: i64, text: &str) -> Result<Comment>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_comment_sqlite(self.pool.sqlite()?, comment).await,
            DatabaseDriver::Mysql => create_comment_mysql(self.pool.mysql()?, comment).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_comment_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_comment_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithMeta>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_by_post_sqlite(self.pool.sqlite()?, post_id).await,
            DatabaseDriver::Mysql => list_by_post_mysql(self.pool.mysql()?, post_id).await,
        }
    }

    async fn list_recent(&self, limit: i64, offset: i64) -> Result<Vec<CommentWithMeta>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_recent_sqlite(self.pool.sqlite()?, limit, offset).await,
            DatabaseDriver::Mysql => list_recent_mysql(self.pool.mysql()?, limit, offset).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM comments";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql).fetch_one(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql).fetch_one(self.pool.mysql()?).await,
        }
        .context("Failed to count comments")?;
        Ok(count)
    }

    async fn update_text(&self, id: i64, text: &str) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_text_sqlite(self.pool.sqlite()?, id, text).await,
            DatabaseDriver::Mysql => update_text_mysql(self.pool.mysql()?, id, text).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM comments WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to delete comment")
    }
}

const COMMENT_WITH_AUTHOR: &str = r#"
    SELECT cm.id, cm.text, cm.post_id, cm.author_id, cm.created_at, u.username AS author_username
    FROM comments cm
    INNER JOIN users u ON u.id = cm.author_id
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_comment_sqlite(pool: &SqlitePool, comment: &Comment) -> Result<Comment> {
    let result = sqlx::query(
        "INSERT INTO comments (text, post_id, author_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&comment.text)
    .bind(comment.post_id)
    .bind(comment.author_id)
    .bind(comment.created_at)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        ..comment.clone()
    })
}

async fn get_comment_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(
        "SELECT id, text, post_id, author_id, created_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get comment by ID")?;

    row.as_ref().map(row_to_comment_sqlite).transpose()
}

async fn list_by_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<CommentWithMeta>> {
    let rows = sqlx::query(&format!(
        "{} WHERE cm.post_id = ? ORDER BY cm.created_at ASC, cm.id ASC",
        COMMENT_WITH_AUTHOR
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list comments")?;

    rows.iter().map(row_to_comment_with_meta_sqlite).collect()
}

async fn list_recent_sqlite(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<CommentWithMeta>> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY cm.created_at DESC, cm.id DESC LIMIT ? OFFSET ?",
        COMMENT_WITH_AUTHOR
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list recent comments")?;

    rows.iter().map(row_to_comment_with_meta_sqlite).collect()
}

async fn update_text_sqlite(pool: &SqlitePool, id: i64, text: &str) -> Result<Comment> {
    sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
        .bind(text)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update comment")?;

    get_comment_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Comment not found after update"))
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        post_id: row.try_get("post_id")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_comment_with_meta_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CommentWithMeta> {
    Ok(CommentWithMeta {
        comment: row_to_comment_sqlite(row)?,
        author_username: row.try_get("author_username")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_comment_mysql(pool: &MySqlPool, comment: &Comment) -> Result<Comment> {
    let result = sqlx::query(
        "INSERT INTO comments (text, post_id, author_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&comment.text)
    .bind(comment.post_id)
    .bind(comment.author_id)
    .bind(comment.created_at)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        ..comment.clone()
    })
}

async fn get_comment_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(
        "SELECT id, text, post_id, author_id, created_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get comment by ID")?;

    row.as_ref().map(row_to_comment_mysql).transpose()
}

async fn list_by_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<CommentWithMeta>> {
    let rows = sqlx::query(&format!(
        "{} WHERE cm.post_id = ? ORDER BY cm.created_at ASC, cm.id ASC",
        COMMENT_WITH_AUTHOR
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list comments")?;

    rows.iter().map(row_to_comment_with_meta_mysql).collect()
}

async fn list_recent_mysql(pool: &MySqlPool, limit: i64, offset: i64) -> Result<Vec<CommentWithMeta>> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY cm.created_at DESC, cm.id DESC LIMIT ? OFFSET ?",
        COMMENT_WITH_AUTHOR
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list recent comments")?;

    rows.iter().map(row_to_comment_with_meta_mysql).collect()
}

async fn update_text_mysql(pool: &MySqlPool, id: i64, text: &str) -> Result<Comment> {
    sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
        .bind(text)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update comment")?;

    get_comment_by_id_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Comment not found after update"))
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        post_id: row.try_get("post_id")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_comment_with_meta_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CommentWithMeta> {
    Ok(CommentWithMeta {
        comment: row_to_comment_mysql(row)?,
        author_username: row.try_get("author_username")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{PostRepository, SqlxPostRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Post, PublicationMeta, User, UserRole};
    use chrono::{Duration, Utc};

    async fn setup_test_repo() -> (SqlxCommentRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User {
                id: 0,
                username: "reader".to_string(),
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

        let post = SqlxPostRepository::new(pool.clone())
            .create(&Post {
                id: 0,
                title: "Post".to_string(),
                text: "Body".to_string(),
                pub_date: Utc::now(),
                author_id: user.id,
                location_id: None,
                category_id: None,
                image: None,
                meta: PublicationMeta::new(),
            })
            .await
            .unwrap();

        (SqlxCommentRepository::new(pool), user.id, post.id)
    }

    fn comment(post_id: i64, author_id: i64, text: &str, created_at: chrono::DateTime<Utc>) -> Comment {
        Comment {
            id: 0,
            text: text.to_string(),
            post_id,
            author_id,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_list_by_post_oldest_first() {
        let (repo, user_id, post_id) = setup_test_repo().await;
        let now = Utc::now();

        // inserted out of order
        repo.create(&comment(post_id, user_id, "second", now - Duration::minutes(5)))
            .await
            .unwrap();
        repo.create(&comment(post_id, user_id, "first", now - Duration::minutes(10)))
            .await
            .unwrap();
        repo.create(&comment(post_id, user_id, "third", now)).await.unwrap();

        let comments = repo.list_by_post(post_id).await.unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.comment.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert!(comments.iter().all(|c| c.author_username == "reader"));
    }

    #[tokio::test]
    async fn test_update_text_and_delete() {
        let (repo, user_id, post_id) = setup_test_repo().await;

        let created = repo
            .create(&comment(post_id, user_id, "typo", Utc::now()))
            .await
            .unwrap();
        let updated = repo.update_text(created.id, "fixed").await.unwrap();
        assert_eq!(updated.text, "fixed");
        assert_eq!(updated.created_at, created.created_at);

        assert_eq!(repo.count().await.unwrap(), 1);
        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_comment_requires_existing_post() {
        let (repo, user_id, _post_id) = setup_test_repo().await;
        assert!(repo
            .create(&comment(9999, user_id, "orphan", Utc::now()))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let (repo, user_id, post_id) = setup_test_repo().await;
        let now = Utc::now();
        repo.create(&comment(post_id, user_id, "old", now - Duration::hours(1)))
            .await
            .unwrap();
        repo.create(&comment(post_id, user_id, "new", now)).await.unwrap();

        let recent = repo.list_recent(1, 0).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].comment.text, "new");
    }
}
