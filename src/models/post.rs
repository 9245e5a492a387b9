//! Post model
//!
//! A post belongs to one author, optionally to a category and a location,
//! and may be scheduled by giving it a `pub_date` in the future.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::publication::{truncate_display, PublicationMeta};

/// Maximum length of a post title
pub const MAX_TITLE_LENGTH: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    /// Publication time; a future value schedules the post
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    /// Path relative to the media directory
    pub image: Option<String>,
    #[serde(flatten)]
    pub meta: PublicationMeta,
}

impl Post {
    /// Title shortened for listings
    pub fn display_title(&self) -> &str {
        truncate_display(&self.title)
    }

    /// URL the image is served from
    pub fn image_url(&self) -> Option<String> {
        self.image.as_ref().map(|path| format!("/media/{}", path))
    }
}

/// Category columns joined onto a post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub is_published: bool,
}

/// Location columns joined onto a post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationRef {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
}

/// A post with its author, category, location and comment count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithMeta {
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub category: Option<CategoryRef>,
    pub location: Option<LocationRef>,
    pub comment_count: i64,
    /// Set by [`PostWithMeta::new`] for templates
    #[serde(default)]
    pub image_url: Option<String>,
}

impl PostWithMeta {
    pub fn new(
        post: Post,
        author_username: String,
        category: Option<CategoryRef>,
        location: Option<LocationRef>,
        comment_count: i64,
    ) -> Self {
        let image_url = post.image_url();
        Self {
            post,
            author_username,
            category,
            location,
            comment_count,
            image_url,
        }
    }

    /// The location, if it is published
    pub fn visible_location(&self) -> Option<&LocationRef> {
        self.location.as_ref().filter(|l| l.is_published)
    }

    /// Whether the joined category lets the post through
    pub fn category_published(&self) -> Option<bool> {
        self.category.as_ref().map(|c| c.is_published)
    }
}

/// Input for creating a post
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    pub image: Option<String>,
    pub is_published: bool,
}

impl CreatePostInput {
    pub fn new(title: impl Into<String>, text: impl Into<String>, pub_date: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            pub_date,
            location_id: None,
            category_id: None,
            image: None,
            is_published: true,
        }
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_location(mut self, location_id: i64) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }
}

/// Input for updating a post.
///
/// `None` leaves a field unchanged; for nullable columns `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub text: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
    pub location_id: Option<Option<i64>>,
    pub category_id: Option<Option<i64>>,
    pub image: Option<Option<String>>,
    pub is_published: Option<bool>,
}

impl UpdatePostInput {
    /// Every editable field replaced, as submitted by the post form
    pub fn replace_all(input: CreatePostInput) -> Self {
        Self {
            title: Some(input.title),
            text: Some(input.text),
            pub_date: Some(input.pub_date),
            location_id: Some(input.location_id),
            category_id: Some(input.category_id),
            image: input.image.map(Some),
            is_published: Some(input.is_published),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.text.is_none()
            && self.pub_date.is_none()
            && self.location_id.is_none()
            && self.category_id.is_none()
            && self.image.is_none()
            && self.is_published.is_none()
    }

    /// Apply the changes to `post`
    pub fn apply_to(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(text) = &self.text {
            post.text = text.clone();
        }
        if let Some(pub_date) = self.pub_date {
            post.pub_date = pub_date;
        }
        if let Some(location_id) = self.location_id {
            post.location_id = location_id;
        }
        if let Some(category_id) = self.category_id {
            post.category_id = category_id;
        }
        if let Some(image) = &self.image {
            post.image = image.clone();
        }
        if let Some(is_published) = self.is_published {
            post.meta.is_published = is_published;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_post() -> Post {
        Post {
            id: 1,
            title: "Hello".to_string(),
            text: "World".to_string(),
            pub_date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            author_id: 1,
            location_id: Some(2),
            category_id: Some(3),
            image: Some("posts_images/a.png".to_string()),
            meta: PublicationMeta::new(),
        }
    }

    #[test]
    fn test_image_url() {
        let post = sample_post();
        assert_eq!(post.image_url().as_deref(), Some("/media/posts_images/a.png"));
    }

    #[test]
    fn test_update_apply_keeps_unset_fields() {
        let mut post = sample_post();
        let update = UpdatePostInput {
            is_published: Some(false),
            category_id: Some(None),
            ..Default::default()
        };
        update.apply_to(&mut post);

        assert!(!post.meta.is_published);
        assert_eq!(post.category_id, None);
        assert_eq!(post.location_id, Some(2));
        assert_eq!(post.title, "Hello");
    }

    #[test]
    fn test_replace_all_keeps_image_when_none_uploaded() {
        let mut post = sample_post();
        let input = CreatePostInput::new("New", "Body", post.pub_date);
        let update = UpdatePostInput::replace_all(input);
        update.apply_to(&mut post);

        assert_eq!(post.title, "New");
        assert_eq!(post.category_id, None);
        assert_eq!(post.image.as_deref(), Some("posts_images/a.png"));
    }

    #[test]
    fn test_visible_location() {
        let mut with_meta = PostWithMeta::new(
            sample_post(),
            "author".to_string(),
            None,
            Some(LocationRef {
                id: 2,
                name: "Moscow".to_string(),
                is_published: false,
            }),
            0,
        );
        assert!(with_meta.visible_location().is_none());

        if let Some(location) = with_meta.location.as_mut() {
            location.is_published = true;
        }
        assert_eq!(with_meta.visible_location().map(|l| l.id), Some(2));
    }
}
