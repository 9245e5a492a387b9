//! Post repository
//!
//! Single-row CRUD plus [`PostRepository::query`], which runs a
//! [`PostQuery`] and returns one page of posts joined with their author,
//! category, location and comment count.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    CategoryRef, ListParams, LocationRef, PagedResult, Post, PostWithMeta, PublicationMeta,
};
use crate::services::visibility::{FilterArg, PostQuery};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post; `id` of the argument is ignored
    async fn create(&self, post: &Post) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// One page of posts matching `query`, newest `pub_date` first
    async fn query(&self, query: &PostQuery, params: &ListParams) -> Result<PagedResult<PostWithMeta>>;

    /// The single post matching `query`, if any
    async fn find(&self, query: &PostQuery) -> Result<Option<PostWithMeta>> {
        let page = self.query(query, &ListParams::new(1, 1)).await?;
        Ok(page.items.into_iter().next())
    }

    async fn update(&self, post: &Post) -> Result<Post>;

    /// Delete a post together with its comments
    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_post_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn query(&self, query: &PostQuery, params: &ListParams) -> Result<PagedResult<PostWithMeta>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => query_posts_sqlite(self.pool.sqlite()?, query, params).await,
            DatabaseDriver::Mysql => query_posts_mysql(self.pool.mysql()?, query, params).await,
        }
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_post_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_post_mysql(self.pool.mysql()?, id).await,
        }
    }
}

const POST_COLUMNS: &str =
    "id, title, text, pub_date, author_id, location_id, category_id, image, is_published, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

fn bind_args_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    args: &[FilterArg],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for arg in args {
        query = match arg {
            FilterArg::Int(v) => query.bind(*v),
            FilterArg::Bool(v) => query.bind(*v),
            FilterArg::Time(v) => query.bind(*v),
            FilterArg::Text(v) => query.bind(v.clone()),
        };
    }
    query
}

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, text, pub_date, author_id, location_id, category_id, image, is_published, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.author_id)
    .bind(post.location_id)
    .bind(post.category_id)
    .bind(&post.image)
    .bind(post.meta.is_published)
    .bind(post.meta.created_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        ..post.clone()
    })
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn query_posts_sqlite(
    pool: &SqlitePool,
    query: &PostQuery,
    params: &ListParams,
) -> Result<PagedResult<PostWithMeta>> {
    let (count_sql, count_args) = query.count_sql();
    let count_row = bind_args_sqlite(sqlx::query(&count_sql), &count_args)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    let total: i64 = count_row.try_get(0)?;

    let (select_sql, select_args) = query.select_sql();
    let rows = bind_args_sqlite(sqlx::query(&select_sql), &select_args)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let items = rows
        .iter()
        .map(row_to_post_with_meta_sqlite)
        .collect::<Result<Vec<_>>>()?;

    Ok(PagedResult::new(items, total, params))
}

async fn update_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, text = ?, pub_date = ?, location_id = ?, category_id = ?, image = ?, is_published = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.location_id)
    .bind(post.category_id)
    .bind(&post.image)
    .bind(post.meta.is_published)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    get_post_by_id_sqlite(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

async fn delete_post_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;

    Ok(())
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        text: row.try_get("text")?,
        pub_date: row.try_get("pub_date")?,
        author_id: row.try_get("author_id")?,
        location_id: row.try_get("location_id")?,
        category_id: row.try_get("category_id")?,
        image: row.try_get("image")?,
        meta: PublicationMeta {
            is_published: row.try_get("is_published")?,
            created_at: row.try_get("created_at")?,
        },
    })
}

fn row_to_post_with_meta_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<PostWithMeta> {
    let post = row_to_post_sqlite(row)?;

    let category = match (
        post.category_id,
        row.try_get::<Option<String>, _>("category_title")?,
    ) {
        (Some(id), Some(title)) => Some(CategoryRef {
            id,
            title,
            slug: row.try_get("category_slug")?,
            is_published: row.try_get("category_is_published")?,
        }),
        _ => None,
    };

    let location = match (
        post.location_id,
        row.try_get::<Option<String>, _>("location_name")?,
    ) {
        (Some(id), Some(name)) => Some(LocationRef {
            id,
            name,
            is_published: row.try_get("location_is_published")?,
        }),
        _ => None,
    };

    Ok(PostWithMeta::new(
        post,
        row.try_get("author_username")?,
        category,
        location,
        row.try_get("comment_count")?,
    ))
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn bind_args_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    args: &[FilterArg],
) -> Query<'q, MySql, MySqlArguments> {
    for arg in args {
        query = match arg {
            FilterArg::Int(v) => query.bind(*v),
            FilterArg::Bool(v) => query.bind(*v),
            FilterArg::Time(v) => query.bind(*v),
            FilterArg::Text(v) => query.bind(v.clone()),
        };
    }
    query
}

async fn create_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, text, pub_date, author_id, location_id, category_id, image, is_published, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.author_id)
    .bind(post.location_id)
    .bind(post.category_id)
    .bind(&post.image)
    .bind(post.meta.is_published)
    .bind(post.meta.created_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        ..post.clone()
    })
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn query_posts_mysql(
    pool: &MySqlPool,
    query: &PostQuery,
    params: &ListParams,
) -> Result<PagedResult<PostWithMeta>> {
    let (count_sql, count_args) = query.count_sql();
    let count_row = bind_args_mysql(sqlx::query(&count_sql), &count_args)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    let total: i64 = count_row.try_get(0)?;

    let (select_sql, select_args) = query.select_sql();
    let rows = bind_args_mysql(sqlx::query(&select_sql), &select_args)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let items = rows
        .iter()
        .map(row_to_post_with_meta_mysql)
        .collect::<Result<Vec<_>>>()?;

    Ok(PagedResult::new(items, total, params))
}

async fn update_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, text = ?, pub_date = ?, location_id = ?, category_id = ?, image = ?, is_published = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.location_id)
    .bind(post.category_id)
    .bind(&post.image)
    .bind(post.meta.is_published)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    get_post_by_id_mysql(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

async fn delete_post_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;

    Ok(())
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        text: row.try_get("text")?,
        pub_date: row.try_get("pub_date")?,
        author_id: row.try_get("author_id")?,
        location_id: row.try_get("location_id")?,
        category_id: row.try_get("category_id")?,
        image: row.try_get("image")?,
        meta: PublicationMeta {
            is_published: row.try_get("is_published")?,
            created_at: row.try_get("created_at")?,
        },
    })
}

fn row_to_post_with_meta_mysql(row: &sqlx::mysql::MySqlRow) -> Result<PostWithMeta> {
    let post = row_to_post_mysql(row)?;

    let category = match (
        post.category_id,
        row.try_get::<Option<String>, _>("category_title")?,
    ) {
        (Some(id), Some(title)) => Some(CategoryRef {
            id,
            title,
            slug: row.try_get("category_slug")?,
            is_published: row.try_get("category_is_published")?,
        }),
        _ => None,
    };

    let location = match (
        post.location_id,
        row.try_get::<Option<String>, _>("location_name")?,
    ) {
        (Some(id), Some(name)) => Some(LocationRef {
            id,
            name,
            is_published: row.try_get("location_is_published")?,
        }),
        _ => None,
    };

    Ok(PostWithMeta::new(
        post,
        row.try_get("author_username")?,
        category,
        location,
        row.try_get("comment_count")?,
    ))
}
