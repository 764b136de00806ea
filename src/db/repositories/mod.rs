//! Database repositories
//!
//! One repository per entity. Each is a trait plus an SQLx implementation
//! that dispatches on the configured driver.

pub mod blog;
pub mod category;
pub mod comment;
pub mod profile;
pub mod session;
pub mod user;

pub use blog::{BlogRepository, SqlxBlogRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use profile::{ProfileRepository, SqlxProfileRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
