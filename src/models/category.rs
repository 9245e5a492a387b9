//! Category model
//!
//! Categories group posts under a slug-addressed page. An unpublished
//! category hides its page and every post filed under it.

use serde::{Deserialize, Serialize};

use super::publication::{truncate_display, PublicationMeta};

/// Maximum length of a category title
pub const MAX_TITLE_LENGTH: usize = 256;

/// Maximum length of a category slug
pub const MAX_SLUG_LENGTH: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// URL identifier; latin letters, digits, hyphen and underscore
    pub slug: String,
    #[serde(flatten)]
    pub meta: PublicationMeta,
}

impl Category {
    /// Title shortened for listings
    pub fn display_title(&self) -> &str {
        truncate_display(&self.title)
    }

    pub fn is_published(&self) -> bool {
        self.meta.is_published
    }
}

/// Input for creating a category
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub slug: String,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

impl CreateCategoryInput {
    pub fn new(title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            slug: slug.into(),
            is_published: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }
}

fn default_true() -> bool {
    true
}

/// Input for updating a category; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub is_published: Option<bool>,
}
