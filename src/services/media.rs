//! Post image storage
//!
//! Uploaded images are written under `<media.path>/posts_images/` with a
//! random file name and referenced from posts by their path relative to the
//! media root. The router serves the media root at `/media/`.

use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::config::MediaConfig;

/// Subdirectory of the media root holding post images
pub const POST_IMAGES_DIR: &str = "posts_images";

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("Image too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid media path: {0}")]
    InvalidPath(String),

    #[error("Failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes and removes files below the media root
#[derive(Debug, Clone)]
pub struct MediaStore {
    config: MediaConfig,
}

impl MediaStore {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.path
    }

    /// Validate and store an uploaded image; returns its relative path
    pub async fn save_image(&self, content_type: &str, data: &[u8]) -> Result<String, MediaError> {
        if !self.config.is_type_allowed(content_type) {
            return Err(MediaError::UnsupportedType(content_type.to_string()));
        }

        let size = data.len() as u64;
        if size > self.config.max_file_size {
            return Err(MediaError::TooLarge {
                size,
                max: self.config.max_file_size,
            });
        }

        let dir = self.config.path.join(POST_IMAGES_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!(
            "{}.{}",
            Uuid::new_v4().simple(),
            self.config.extension_for(content_type)
        );
        tokio::fs::write(dir.join(&file_name), data).await?;

        tracing::debug!("Stored image {}/{} ({} bytes)", POST_IMAGES_DIR, file_name, size);
        Ok(format!("{}/{}", POST_IMAGES_DIR, file_name))
    }

    /// Remove a stored file; a file that is already gone is not an error
    pub async fn delete(&self, relative: &str) -> Result<(), MediaError> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Absolute path of a stored file; rejects paths escaping the media root
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, MediaError> {
        let rel = Path::new(relative);
        let safe = !relative.is_empty()
            && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(MediaError::InvalidPath(relative.to_string()));
        }
        Ok(self.config.path.join(rel))
    }
}
