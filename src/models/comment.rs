//! Comment and like models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub blog_id: i64,
    pub author_id: i64,
    /// Parent comment on the same blog, for replies
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Comment with its author's name and, for root comments, its replies
#[derive(Debug, Clone, Serialize)]
pub struct CommentWithMeta {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<CommentWithMeta>,
}

/// Input for creating a comment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub blog_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
}

/// A (user, blog) like; the pair is unique
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogLike {
    pub id: i64,
    pub user_id: i64,
    pub blog_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of toggling a like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToggle {
    Liked,
    Unliked,
}
