//! Author-ownership guard
//!
//! Posts and comments can only be changed or removed by the user who wrote
//! them. Each mutating service call runs [`ensure_author`] before touching
//! the database.

use crate::models::{Comment, Post};

/// Content that has exactly one author and belongs to a post
pub trait Authored {
    fn author_id(&self) -> i64;

    /// The post the content is shown on (itself, for a post)
    fn post_id(&self) -> i64;
}

impl Authored for Post {
    fn author_id(&self) -> i64 {
        self.author_id
    }

    fn post_id(&self) -> i64 {
        self.id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> i64 {
        self.author_id
    }

    fn post_id(&self) -> i64 {
        self.post_id
    }
}

/// A non-author tried to mutate content.
///
/// Carries the post to send the requester back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Only the author can modify this content (post {post_id})")]
pub struct OwnershipDenied {
    pub post_id: i64,
}

/// Check that `viewer_id` wrote `target`
pub fn ensure_author<T: Authored>(viewer_id: i64, target: &T) -> Result<(), OwnershipDenied> {
    if target.author_id() == viewer_id {
        Ok(())
    } else {
        Err(OwnershipDenied {
            post_id: target.post_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PublicationMeta;
    use chrono::Utc;

    fn post(id: i64, author_id: i64) -> Post {
        Post {
            id,
            title: "t".to_string(),
            text: "x".to_string(),
            pub_date: Utc::now(),
            author_id,
            location_id: None,
            category_id: None,
            image: None,
            meta: PublicationMeta::new(),
        }
    }

    #[test]
    fn test_author_passes() {
        assert!(ensure_author(7, &post(1, 7)).is_ok());
    }

    #[test]
    fn test_post_denied_points_at_itself() {
        assert_eq!(ensure_author(8, &post(3, 7)), Err(OwnershipDenied { post_id: 3 }));
    }

    #[test]
    fn test_comment_denied_points_at_its_post() {
        let comment = Comment {
            id: 10,
            text: "hi".to_string(),
            post_id: 4,
            author_id: 7,
            created_at: Utc::now(),
        };
        assert!(ensure_author(7, &comment).is_ok());
        assert_eq!(ensure_author(1, &comment), Err(OwnershipDenied { post_id: 4 }));
    }
}
