//! Location repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Location, PublicationMeta};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn create(&self, location: &Location) -> Result<Location>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>>;

    /// All locations, newest first
    async fn list(&self) -> Result<Vec<Location>>;

    async fn update(&self, location: &Location) -> Result<Location>;

    /// Delete a location; posts tagged with it lose the tag
    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxLocationRepository {
    pool: DynDatabasePool,
}

impl SqlxLocationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LocationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LocationRepository for SqlxLocationRepository {
    async fn create(&self, location: &Location) -> Result<Location> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_location_sqlite(self.pool.sqlite()?, location).await,
            DatabaseDriver::Mysql => create_location_mysql(self.pool.mysql()?, location).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_location_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_location_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<Location>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_locations_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_locations_mysql(self.pool.mysql()?).await,
        }
    }

    async fn update(&self, location: &Location) -> Result<Location> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_location_sqlite(self.pool.sqlite()?, location).await,
            DatabaseDriver::Mysql => update_location_mysql(self.pool.mysql()?, location).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_location_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_location_mysql(self.pool.mysql()?, id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_location_sqlite(pool: &SqlitePool, location: &Location) -> Result<Location> {
    let result =
        sqlx::query("INSERT INTO locations (name, is_published, created_at) VALUES (?, ?, ?)")
            .bind(&location.name)
            .bind(location.meta.is_published)
            .bind(location.meta.created_at)
            .execute(pool)
            .await
            .context("Failed to create location")?;

    Ok(Location {
        id: result.last_insert_rowid(),
        ..location.clone()
    })
}

async fn get_location_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Location>> {
    let row = sqlx::query("SELECT id, name, is_published, created_at FROM locations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get location by ID")?;

    row.as_ref().map(row_to_location_sqlite).transpose()
}

async fn list_locations_sqlite(pool: &SqlitePool) -> Result<Vec<Location>> {
    let rows = sqlx::query(
        "SELECT id, name, is_published, created_at FROM locations ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list locations")?;

    rows.iter().map(row_to_location_sqlite).collect()
}

async fn update_location_sqlite(pool: &SqlitePool, location: &Location) -> Result<Location> {
    sqlx::query("UPDATE locations SET name = ?, is_published = ? WHERE id = ?")
        .bind(&location.name)
        .bind(location.meta.is_published)
        .bind(location.id)
        .execute(pool)
        .await
        .context("Failed to update location")?;

    get_location_by_id_sqlite(pool, location.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Location not found after update"))
}

async fn delete_location_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM locations WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete location")?;
    Ok(())
}

fn row_to_location_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Location> {
    Ok(Location {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        meta: PublicationMeta {
            is_published: row.try_get("is_published")?,
            created_at: row.try_get("created_at")?,
        },
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_location_mysql(pool: &MySqlPool, location: &Location) -> Result<Location> {
    let result =
        sqlx::query("INSERT INTO locations (name, is_published, created_at) VALUES (?, ?, ?)")
            .bind(&location.name)
            .bind(location.meta.is_published)
            .bind(location.meta.created_at)
            .execute(pool)
            .await
            .context("Failed to create location")?;

    Ok(Location {
        id: result.last_insert_id() as i64,
        ..location.clone()
    })
}

async fn get_location_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Location>> {
    let row = sqlx::query("SELECT id, name, is_published, created_at FROM locations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get location by ID")?;

    row.as_ref().map(row_to_location_mysql).transpose()
}

async fn list_locations_mysql(pool: &MySqlPool) -> Result<Vec<Location>> {
    let rows = sqlx::query(
        "SELECT id, name, is_published, created_at FROM locations ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list locations")?;

    rows.iter().map(row_to_location_mysql).collect()
}

async fn update_location_mysql(pool: &MySqlPool, location: &Location) -> Result<Location> {
    sqlx::query("UPDATE locations SET name = ?, is_published = ? WHERE id = ?")
        .bind(&location.name)
        .bind(location.meta.is_published)
        .bind(location.id)
        .execute(pool)
        .await
        .context("Failed to update location")?;

    get_location_by_id_mysql(pool, location.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Location not found after update"))
}

async fn delete_location_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM locations WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete location")?;
    Ok(())
}

fn row_to_location_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Location> {
    Ok(Location {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        meta: PublicationMeta {
            is_published: row.try_get("is_published")?,
            created_at: row.try_get("created_at")?,
        },
    })
}
