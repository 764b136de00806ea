//! Data models
//!
//! Database entities (User, Session, Category, Profile, Blog, Comment,
//! BlogLike), the inputs services accept, and pagination types.

mod blog;
mod category;
mod comment;
mod pagination;
mod profile;
mod session;
mod user;

pub use blog::{Blog, BlogFilter, BlogWithMeta, CreateBlogInput, UpdateBlogInput};
pub use category::{Category, CategoryWithCount, CreateCategoryInput};
pub use comment::{BlogLike, Comment, CommentWithMeta, CreateCommentInput, LikeToggle};
pub use pagination::{ListParams, PagedResult};
pub use profile::{Profile, UpdateProfileInput};
pub use session::Session;
pub use user::{CreateUserInput, UpdateAccountInput, User, UserRole};
