//! Services layer - business logic
//!
//! Services validate input, apply the visibility and ownership rules and
//! call the repositories. Each returns its own error enum; the HTTP layer
//! decides how those are shown.

pub mod category;
pub mod comment;
pub mod location;
pub mod media;
pub mod ownership;
pub mod password;
pub mod post;
pub mod user;
pub mod visibility;

pub use category::{is_valid_slug, CategoryService, CategoryServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use location::{LocationService, LocationServiceError};
pub use media::{MediaError, MediaStore};
pub use ownership::{ensure_author, Authored, OwnershipDenied};
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
pub use visibility::{can_view, can_view_with_meta, is_publicly_visible, PostQuery};
