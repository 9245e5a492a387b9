//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::publication::truncate_display;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Text shortened for listings
    pub fn display_text(&self) -> &str {
        truncate_display(&self.text)
    }
}

/// Comment with its author's username for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithMeta {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: String,
}

/// Input for creating a comment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub post_id: i64,
    pub text: String,
}
