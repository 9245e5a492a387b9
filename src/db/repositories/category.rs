//! Category repository
//!
//! - `CategoryRepository` trait defining category data access
//! - `SqlxCategoryRepository` implementing it for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Category, PublicationMeta};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Insert a category; `id` of the argument is ignored
    async fn create(&self, category: &Category) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// All categories, newest first
    async fn list(&self) -> Result<Vec<Category>>;

    async fn update(&self, category: &Category) -> Result<Category>;

    /// Delete a category; its posts keep existing with no category
    async fn delete(&self, id: i64) -> Result<()>;

    /// Whether another category (other than `exclude_id`) uses `slug`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_category_sqlite(self.pool.sqlite()?, category).await,
            DatabaseDriver::Mysql => create_category_mysql(self.pool.mysql()?, category).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_category_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_category_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_category_by_slug_sqlite(self.pool.sqlite()?, slug).await,
            DatabaseDriver::Mysql => get_category_by_slug_mysql(self.pool.mysql()?, slug).await,
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_categories_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_categories_mysql(self.pool.mysql()?).await,
        }
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_category_sqlite(self.pool.sqlite()?, category).await,
            DatabaseDriver::Mysql => update_category_mysql(self.pool.mysql()?, category).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_category_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_category_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exists_by_slug_sqlite(self.pool.sqlite()?, slug, exclude_id).await
            }
            DatabaseDriver::Mysql => exists_by_slug_mysql(self.pool.mysql()?, slug, exclude_id).await,
        }
    }
}

const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    let result = sqlx::query(
        r#"
        INSERT INTO categories (title, description, slug, is_published, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&category.title)
    .bind(&category.description)
    .bind(&category.slug)
    .bind(category.meta.is_published)
    .bind(category.meta.created_at)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        ..category.clone()
    })
}

async fn get_category_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM categories WHERE id = ?",
        CATEGORY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get category by ID")?;

    row.as_ref().map(row_to_category_sqlite).transpose()
}

async fn get_category_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Category>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM categories WHERE slug = ?",
        CATEGORY_COLUMNS
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get category by slug")?;

    row.as_ref().map(row_to_category_sqlite).transpose()
}

async fn list_categories_sqlite(pool: &SqlitePool) -> Result<Vec<Category>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM categories ORDER BY created_at DESC, id DESC",
        CATEGORY_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list categories")?;

    rows.iter().map(row_to_category_sqlite).collect()
}

async fn update_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    sqlx::query(
        r#"
        UPDATE categories
        SET title = ?, description = ?, slug = ?, is_published = ?
        WHERE id = ?
        "#,
    )
    .bind(&category.title)
    .bind(&category.description)
    .bind(&category.slug)
    .bind(category.meta.is_published)
    .bind(category.id)
    .execute(pool)
    .await
    .context("Failed to update category")?;

    get_category_by_id_sqlite(pool, category.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
}

async fn delete_category_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete category")?;

    Ok(())
}

async fn exists_by_slug_sqlite(
    pool: &SqlitePool,
    slug: &str,
    exclude_id: Option<i64>,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM categories WHERE slug = ? AND (? IS NULL OR id != ?)",
    )
    .bind(slug)
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
    .context("Failed to check slug existence")?;

    Ok(count > 0)
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        slug: row.try_get("slug")?,
        meta: PublicationMeta {
            is_published: row.try_get("is_published")?,
            created_at: row.try_get("created_at")?,
        },
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_category_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    let result = sqlx::query(
        r#"
        INSERT INTO categories (title, description, slug, is_published, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&category.title)
    .bind(&category.description)
    .bind(&category.slug)
    .bind(category.meta.is_published)
    .bind(category.meta.created_at)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_id() as i64,
        ..category.clone()
    })
}

async fn get_category_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM categories WHERE id = ?",
        CATEGORY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get category by ID")?;

    row.as_ref().map(row_to_category_mysql).transpose()
}

async fn get_category_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Category>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM categories WHERE slug = ?",
        CATEGORY_COLUMNS
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get category by slug")?;

    row.as_ref().map(row_to_category_mysql).transpose()
}

async fn list_categories_mysql(pool: &MySqlPool) -> Result<Vec<Category>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM categories ORDER BY created_at DESC, id DESC",
        CATEGORY_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list categories")?;

    rows.iter().map(row_to_category_mysql).collect()
}

async fn update_category_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    sqlx::query(
        r#"
        UPDATE categories
        SET title = ?, description = ?, slug = ?, is_published = ?
        WHERE id = ?
        "#,
    )
    .bind(&category.title)
    .bind(&category.description)
    .bind(&category.slug)
    .bind(category.meta.is_published)
    .bind(category.id)
    .execute(pool)
    .await
    .context("Failed to update category")?;

    get_category_by_id_mysql(pool, category.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
}

async fn delete_category_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete category")?;

    Ok(())
}

async fn exists_by_slug_mysql(pool: &MySqlPool, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM categories WHERE slug = ? AND (? IS NULL OR id != ?)",
    )
    .bind(slug)
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
    .context("Failed to check slug existence")?;

    Ok(count > 0)
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        slug: row.try_get("slug")?,
        meta: PublicationMeta {
            is_published: row.try_get("is_published")?,
            created_at: row.try_get("created_at")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, Utc};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCategoryRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxCategoryRepository::new(pool.clone());
        (pool, repo)
    }

    fn new_category(slug: &str, title: &str) -> Category {
        Category {
            id: 0,
            title: title.to_string(),
            description: format!("About {}", title),
            slug: slug.to_string(),
            meta: PublicationMeta::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create(&new_category("news", "News")).await.unwrap();
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.slug, "news");
        assert_eq!(by_id.description, "About News");
        assert!(by_id.meta.is_published);

        let by_slug = repo.get_by_slug("news").await.unwrap().unwrap();
        assert_eq!(by_slug.id, created.id);

        assert!(repo.get_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_pool, repo) = setup_test_repo().await;

        let mut older = new_category("old", "Old");
        older.meta.created_at = Utc::now() - Duration::days(2);
        repo.create(&older).await.unwrap();
        repo.create(&new_category("fresh", "Fresh")).await.unwrap();

        let slugs: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.slug)
            .collect();
        assert_eq!(slugs, vec!["fresh", "old"]);
    }

    #[tokio::test]
    async fn test_update() {
        let (_pool, repo) = setup_test_repo().await;

        let mut category = repo.create(&new_category("news", "News")).await.unwrap();
        category.title = "World news".to_string();
        category.meta.is_published = false;

        let updated = repo.update(&category).await.unwrap();
        assert_eq!(updated.title, "World news");
        assert!(!updated.meta.is_published);
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let (_pool, repo) = setup_test_repo().await;

        repo.create(&new_category("news", "News")).await.unwrap();
        assert!(repo.create(&new_category("news", "Other")).await.is_err());
    }

    #[tokio::test]
    async fn test_exists_by_slug_with_exclusion() {
        let (_pool, repo) = setup_test_repo().await;

        let category = repo.create(&new_category("news", "News")).await.unwrap();

        assert!(repo.exists_by_slug("news", None).await.unwrap());
        assert!(!repo.exists_by_slug("news", Some(category.id)).await.unwrap());
        assert!(!repo.exists_by_slug("sport", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_pool, repo) = setup_test_repo().await;

        let category = repo.create(&new_category("news", "News")).await.unwrap();
        repo.delete(category.id).await.unwrap();

        assert!(repo.get_by_id(category.id).await.unwrap().is_none());
    }
}
