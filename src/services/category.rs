//! Category service
//!
//! Category management for the admin API and the lookup behind the
//! category page. Slugs are unique and limited to latin letters, digits,
//! hyphens and underscores.

use crate::db::repositories::CategoryRepository;
use crate::models::{
    Category, CreateCategoryInput, PublicationMeta, UpdateCategoryInput,
    MAX_CATEGORY_TITLE_LENGTH, MAX_SLUG_LENGTH,
};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"));

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Category not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Whether `slug` is a valid category slug
pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= MAX_SLUG_LENGTH && SLUG_RE.is_match(slug)
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let title = input.title.trim().to_string();
        let slug = input.slug.trim().to_string();
        validate_title(&title)?;
        validate_slug(&slug)?;

        if self
            .repo
            .exists_by_slug(&slug, None)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(CategoryServiceError::DuplicateSlug(slug));
        }

        let category = Category {
            id: 0,
            title,
            description: input.description,
            slug,
            meta: PublicationMeta::with_published(input.is_published),
        };

        let created = self
            .repo
            .create(&category)
            .await
            .context("Failed to create category")?;

        tracing::info!("Created category '{}' (id {})", created.slug, created.id);
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>, CategoryServiceError> {
        let category = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category by ID")?;
        Ok(category)
    }

    /// A published category by slug.
    ///
    /// Missing and unpublished categories are both `NotFound`.
    pub async fn get_published(&self, slug: &str) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get category by slug")?
            .filter(|c| c.is_published())
            .ok_or_else(|| CategoryServiceError::NotFound(slug.to_string()))
    }

    /// All categories, newest first
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        let categories = self.repo.list().await.context("Failed to list categories")?;
        Ok(categories)
    }

    /// Published categories, for the post form
    pub async fn list_published(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|c| c.is_published())
            .collect())
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let mut category = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| CategoryServiceError::NotFound(id.to_string()))?;

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            validate_title(&title)?;
            category.title = title;
        }

        if let Some(slug) = input.slug {
            let slug = slug.trim().to_string();
            validate_slug(&slug)?;
            if self
                .repo
                .exists_by_slug(&slug, Some(id))
                .await
                .context("Failed to check slug uniqueness")?
            {
                return Err(CategoryServiceError::DuplicateSlug(slug));
            }
            category.slug = slug;
        }

        if let Some(description) = input.description {
            category.description = description;
        }

        if let Some(is_published) = input.is_published {
            category.meta.is_published = is_published;
        }

        let updated = self
            .repo
            .update(&category)
            .await
            .context("Failed to update category")?;
        Ok(updated)
    }

    /// Delete a category; its posts stay, uncategorized
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        if self.get_by_id(id).await?.is_none() {
            return Err(CategoryServiceError::NotFound(id.to_string()));
        }

        self.repo
            .delete(id)
            .await
            .context("Failed to delete category")?;

        tracing::info!("Deleted category {}", id);
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), CategoryServiceError> {
    if title.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_CATEGORY_TITLE_LENGTH {
        return Err(CategoryServiceError::ValidationError(format!(
            "Title cannot exceed {} characters",
            MAX_CATEGORY_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn validate_slug(slug: &str) -> Result<(), CategoryServiceError> {
    if !is_valid_slug(slug) {
        return Err(CategoryServiceError::ValidationError(format!(
            "Invalid slug '{}': use latin letters, digits, hyphens and underscores (at most {} characters)",
            slug, MAX_SLUG_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxCategoryRepository;
    use crate::db::{create_test_pool, migrations};
    use proptest::prelude::*;

    async fn setup_test_service() -> CategoryService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        CategoryService::new(SqlxCategoryRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_create_and_get_published() {
        let service = setup_test_service().await;

        let created = service
            .create(CreateCategoryInput::new("  News ", "news").with_description("Daily"))
            .await
            .unwrap();
        assert_eq!(created.title, "News");
        assert!(created.is_published());

        let found = service.get_published("news").await.unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_unpublished_category_is_not_found() {
        let service = setup_test_service().await;
        service
            .create(CreateCategoryInput::new("Drafts", "drafts").with_published(false))
            .await
            .unwrap();

        assert!(matches!(
            service.get_published("drafts").await,
            Err(CategoryServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.get_published("missing").await,
            Err(CategoryServiceError::NotFound(_))
        ));
        assert!(service.list_published().await.unwrap().is_empty());
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_slug() {
        let service = setup_test_service().await;
        service.create(CreateCategoryInput::new("A", "same")).await.unwrap();
        let other = service.create(CreateCategoryInput::new("B", "other")).await.unwrap();

        assert!(matches!(
            service.create(CreateCategoryInput::new("C", "same")).await,
            Err(CategoryServiceError::DuplicateSlug(_))
        ));

        let clash = UpdateCategoryInput {
            slug: Some("same".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(other.id, clash).await,
            Err(CategoryServiceError::DuplicateSlug(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let service = setup_test_service().await;

        assert!(matches!(
            service.create(CreateCategoryInput::new("A", "with space")).await,
            Err(CategoryServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(CreateCategoryInput::new("A", "новости")).await,
            Err(CategoryServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(CreateCategoryInput::new("   ", "ok")).await,
            Err(CategoryServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(CreateCategoryInput::new("x".repeat(257), "ok")).await,
            Err(CategoryServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_own_slug() {
        let service = setup_test_service().await;
        let created = service.create(CreateCategoryInput::new("A", "a")).await.unwrap();

        let input = UpdateCategoryInput {
            title: Some("Renamed".to_string()),
            slug: Some("a".to_string()),
            is_published: Some(false),
            ..Default::default()
        };
        let updated = service.update(created.id, input).await.unwrap();

        assert_eq!(updated.title, "Renamed");
        assert!(!updated.is_published());
    }

    #[tokio::test]
    async fn test_delete() {
        let service = setup_test_service().await;
        let created = service.create(CreateCategoryInput::new("A", "a")).await.unwrap();

        service.delete(created.id).await.unwrap();
        assert!(service.get_by_id(created.id).await.unwrap().is_none());
        assert!(matches!(
            service.delete(created.id).await,
            Err(CategoryServiceError::NotFound(_))
        ));
    }

    proptest! {
        #[test]
        fn slug_charset_accepted(slug in "[-a-zA-Z0-9_]{1,64}") {
            prop_assert!(is_valid_slug(&slug));
        }

        #[test]
        fn slug_with_other_char_rejected(
            prefix in "[a-z]{0,5}",
            bad in "[^-a-zA-Z0-9_]",
            suffix in "[a-z]{0,5}",
        ) {
            let slug = format!("{}{}{}", prefix, bad, suffix);
            prop_assert!(!is_valid_slug(&slug));
        }
    }
}
