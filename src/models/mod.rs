//! Data models
//!
//! Database entities (Category, Location, Post, Comment, User, Session) and
//! the input types the services accept.

mod category;
mod comment;
mod location;
mod pagination;
mod post;
mod publication;
mod session;
mod user;

pub use category::{
    Category, CreateCategoryInput, UpdateCategoryInput, MAX_SLUG_LENGTH,
    MAX_TITLE_LENGTH as MAX_CATEGORY_TITLE_LENGTH,
};
pub use comment::{Comment, CommentWithMeta, CreateCommentInput};
pub use location::{CreateLocationInput, Location, UpdateLocationInput, MAX_NAME_LENGTH};
pub use pagination::{ListParams, PageInfo, PagedResult};
pub use post::{
    CategoryRef, CreatePostInput, LocationRef, Post, PostWithMeta, UpdatePostInput,
    MAX_TITLE_LENGTH as MAX_POST_TITLE_LENGTH,
};
pub use publication::{truncate_display, PublicationMeta, DISPLAY_LENGTH};
pub use session::Session;
pub use user::{CreateUserInput, UpdateProfileInput, User, UserRole, MAX_USERNAME_LENGTH};
