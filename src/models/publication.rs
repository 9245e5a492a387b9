//! Fields shared by every publishable entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of characters kept by the `display_*` helpers in listings
pub const DISPLAY_LENGTH: usize = 30;

/// Publication flag and creation time, embedded in Category, Location and Post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationMeta {
    /// Unset to hide the record from readers
    #[serde(default = "default_published")]
    pub is_published: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

fn default_published() -> bool {
    true
}

impl PublicationMeta {
    /// A published record created now
    pub fn new() -> Self {
        Self::with_published(true)
    }

    pub fn with_published(is_published: bool) -> Self {
        Self {
            is_published,
            created_at: Utc::now(),
        }
    }
}

impl Default for PublicationMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// First [`DISPLAY_LENGTH`] characters of `s`
pub fn truncate_display(s: &str) -> &str {
    match s.char_indices().nth(DISPLAY_LENGTH) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
