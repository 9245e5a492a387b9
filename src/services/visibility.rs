//! Post visibility
//!
//! A post is visible to readers when it is published, its category (if any)
//! is published and its publication date has passed. Its author always sees
//! it. The rule exists twice: as the predicates below, and as the SQL
//! produced by [`PostQuery`], which the post repository runs to list posts
//! together with their comment counts. Tests keep the two in agreement.

use chrono::{DateTime, Utc};

use crate::models::{Post, PostWithMeta};

/// Whether any reader may see the post at `now`.
///
/// `category_published` is `None` when the post has no category.
pub fn is_publicly_visible(
    post: &Post,
    category_published: Option<bool>,
    now: DateTime<Utc>,
) -> bool {
    post.meta.is_published && category_published.unwrap_or(true) && post.pub_date <= now
}

/// Whether `viewer_id` (None for anonymous) may see the post at `now`
pub fn can_view(
    viewer_id: Option<i64>,
    post: &Post,
    category_published: Option<bool>,
    now: DateTime<Utc>,
) -> bool {
    viewer_id == Some(post.author_id) || is_publicly_visible(post, category_published, now)
}

/// [`can_view`] for a post loaded with its category
pub fn can_view_with_meta(viewer_id: Option<i64>, post: &PostWithMeta, now: DateTime<Utc>) -> bool {
    can_view(viewer_id, &post.post, post.category_published(), now)
}

/// Which posts a query ranges over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    All,
    Category(i64),
    Author(i64),
    Post(i64),
}

/// How the visibility rule is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMode {
    /// Publicly visible posts at `now`, plus every post authored by `viewer_id`
    Viewer {
        now: DateTime<Utc>,
        viewer_id: Option<i64>,
    },
    /// No visibility filtering (profile owner, admin)
    Unfiltered,
}

/// A value bound to a `?` placeholder of the generated SQL
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    Int(i64),
    Bool(bool),
    Time(DateTime<Utc>),
    Text(String),
}

/// Columns every post listing selects; aliases are read by the repository
const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.text, p.pub_date, p.author_id, p.location_id,
           p.category_id, p.image, p.is_published, p.created_at,
           u.username AS author_username,
           c.title AS category_title, c.slug AS category_slug,
           c.is_published AS category_is_published,
           l.name AS location_name, l.is_published AS location_is_published,
           (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id
"#;

const POST_COUNT: &str = r#"
    SELECT COUNT(*)
    FROM posts p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

/// A post listing: scope, visibility and an optional title search.
///
/// ```ignore
/// let query = PostQuery::visible_to(Some(user.id), Utc::now())
///     .in_category(category.id);
/// let page = post_repo.query(&query, &ListParams::new(1, 10)).await?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PostQuery {
    pub scope: PostScope,
    pub visibility: VisibilityMode,
    /// Case-insensitive substring of the title
    pub search: Option<String>,
}

impl PostQuery {
    /// Every post the viewer may see
    pub fn visible_to(viewer_id: Option<i64>, now: DateTime<Utc>) -> Self {
        Self {
            scope: PostScope::All,
            visibility: VisibilityMode::Viewer { now, viewer_id },
            search: None,
        }
    }

    /// Posts anybody may see, with no author exception
    pub fn published(now: DateTime<Utc>) -> Self {
        Self::visible_to(None, now)
    }

    /// Every post, regardless of flags
    pub fn unfiltered() -> Self {
        Self {
            scope: PostScope::All,
            visibility: VisibilityMode::Unfiltered,
            search: None,
        }
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.scope = PostScope::Category(category_id);
        self
    }

    pub fn by_author(mut self, author_id: i64) -> Self {
        self.scope = PostScope::Author(author_id);
        self
    }

    pub fn single(mut self, post_id: i64) -> Self {
        self.scope = PostScope::Post(post_id);
        self
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    /// `WHERE` clause and its arguments, in placeholder order
    pub fn where_clause(&self) -> (String, Vec<FilterArg>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut args = Vec::new();

        match self.scope {
            PostScope::All => {}
            PostScope::Category(id) => {
                conditions.push("p.category_id = ?".to_string());
                args.push(FilterArg::Int(id));
            }
            PostScope::Author(id) => {
                conditions.push("p.author_id = ?".to_string());
                args.push(FilterArg::Int(id));
            }
            PostScope::Post(id) => {
                conditions.push("p.id = ?".to_string());
                args.push(FilterArg::Int(id));
            }
        }

        if let VisibilityMode::Viewer { now, viewer_id } = self.visibility {
            let public = "(p.is_published = ? AND (c.id IS NULL OR c.is_published = ?) AND p.pub_date <= ?)";
            match viewer_id {
                Some(viewer_id) => {
                    conditions.push(format!("(p.author_id = ? OR {})", public));
                    args.push(FilterArg::Int(viewer_id));
                }
                None => conditions.push(public.to_string()),
            }
            args.push(FilterArg::Bool(true));
            args.push(FilterArg::Bool(true));
            args.push(FilterArg::Time(now));
        }

        if let Some(search) = &self.search {
            conditions.push("LOWER(p.title) LIKE ?".to_string());
            args.push(FilterArg::Text(format!("%{}%", search.to_lowercase())));
        }

        if conditions.is_empty() {
            ("1 = 1".to_string(), args)
        } else {
            (conditions.join(" AND "), args)
        }
    }

    /// Page query; `LIMIT ? OFFSET ?` follow the `WHERE` arguments
    pub fn select_sql(&self) -> (String, Vec<FilterArg>) {
        let (where_clause, args) = self.where_clause();
        let sql = format!(
            "{} WHERE {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
            POST_SELECT, where_clause
        );
        (sql, args)
    }

    /// Total number of matching posts
    pub fn count_sql(&self) -> (String, Vec<FilterArg>) {
        let (where_clause, args) = self.where_clause();
        (format!("{} WHERE {}", POST_COUNT, where_clause), args)
    }
}
