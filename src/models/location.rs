//! Location model

use serde::{Deserialize, Serialize};

use super::publication::{truncate_display, PublicationMeta};

/// Maximum length of a location name
pub const MAX_NAME_LENGTH: usize = 256;

/// A place a post can be geotagged with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub meta: PublicationMeta,
}

impl Location {
    /// Name shortened for listings
    pub fn display_name(&self) -> &str {
        truncate_display(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLocationInput {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLocationInput {
    pub name: Option<String>,
    pub is_published: Option<bool>,
}
