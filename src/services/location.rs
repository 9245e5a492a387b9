//! Location service

use crate::db::repositories::LocationRepository;
use crate::models::{
    CreateLocationInput, Location, PublicationMeta, UpdateLocationInput, MAX_NAME_LENGTH,
};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum LocationServiceError {
    #[error("Location not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct LocationService {
    repo: Arc<dyn LocationRepository>,
}

impl LocationService {
    pub fn new(repo: Arc<dyn LocationRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CreateLocationInput) -> Result<Location, LocationServiceError> {
        let name = input.name.trim().to_string();
        validate_name(&name)?;

        let location = Location {
            id: 0,
            name,
            meta: PublicationMeta::with_published(input.is_published),
        };

        let created = self
            .repo
            .create(&location)
            .await
            .context("Failed to create location")?;
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Location>, LocationServiceError> {
        let location = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get location by ID")?;
        Ok(location)
    }

    /// All locations, newest first
    pub async fn list(&self) -> Result<Vec<Location>, LocationServiceError> {
        let locations = self.repo.list().await.context("Failed to list locations")?;
        Ok(locations)
    }

    pub async fn list_published(&self) -> Result<Vec<Location>, LocationServiceError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|l| l.meta.is_published)
            .collect())
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateLocationInput,
    ) -> Result<Location, LocationServiceError> {
        let mut location = self
            .get_by_id(id)
            .await?
            .ok_or(LocationServiceError::NotFound(id))?;

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            validate_name(&name)?;
            location.name = name;
        }
        if let Some(is_published) = input.is_published {
            location.meta.is_published = is_published;
        }

        let updated = self
            .repo
            .update(&location)
            .await
            .context("Failed to update location")?;
        Ok(updated)
    }

    /// Delete a location; posts referring to it lose the reference
    pub async fn delete(&self, id: i64) -> Result<(), LocationServiceError> {
        if self.get_by_id(id).await?.is_none() {
            return Err(LocationServiceError::NotFound(id));
        }
        self.repo
            .delete(id)
            .await
            .context("Failed to delete location")?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), LocationServiceError> {
    if name.is_empty() {
        return Err(LocationServiceError::ValidationError(
            "Name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(LocationServiceError::ValidationError(format!(
            "Name cannot exceed {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxLocationRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> LocationService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        LocationService::new(SqlxLocationRepository::boxed(pool))
    }

    fn input(name: &str, is_published: bool) -> CreateLocationInput {
        CreateLocationInput {
            name: name.to_string(),
            is_published,
        }
    }

    #[tokio::test]
    async fn test_create_list_update_delete() {
        let service = setup_test_service().await;

        let moscow = service.create(input("Moscow", true)).await.unwrap();
        service.create(input("Atlantis", false)).await.unwrap();

        assert_eq!(service.list().await.unwrap().len(), 2);
        let published = service.list_published().await.unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].name, "Moscow");

        let updated = service
            .update(
                moscow.id,
                UpdateLocationInput {
                    name: Some("Saint Petersburg".to_string()),
                    is_published: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Saint Petersburg");
        assert!(updated.meta.is_published);

        service.delete(moscow.id).await.unwrap();
        assert!(matches!(
            service.delete(moscow.id).await,
            Err(LocationServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_name_validation() {
        let service = setup_test_service().await;
        assert!(matches!(
            service.create(input("  ", true)).await,
            Err(LocationServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(input(&"x".repeat(MAX_NAME_LENGTH + 1), true)).await,
            Err(LocationServiceError::ValidationError(_))
        ));
    }
}
