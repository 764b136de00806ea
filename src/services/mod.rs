//! Business logic
//!
//! Services sit between the web layer and the repositories. Each exposes
//! its own error enum; repository failures surface as `InternalError`.

pub mod blog;
pub mod category;
pub mod comment;
pub mod markdown;
pub mod password;
pub mod profile;
pub mod rate_limiter;
pub mod user;

pub use blog::{BlogService, BlogServiceError};
pub use category::{CategoryService, CategoryServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use markdown::MarkdownRenderer;
pub use profile::{ProfileService, ProfileServiceError};
pub use rate_limiter::{AttemptLimiter, LoginThrottle};
pub use user::{UserService, UserServiceError};
