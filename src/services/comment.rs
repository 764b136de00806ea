//! Comment and like service

use crate::db::repositories::CommentRepository;
use crate::models::{Blog, Comment, CommentWithMeta, CreateCommentInput, LikeToggle, User};
use anyhow::Context;
use std::sync::Arc;

/// Maximum length of a comment
pub const MAX_COMMENT_LENGTH: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Comment not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>) -> Self {
        Self { repo }
    }

    /// Root comments of a blog, oldest first, with nested replies
    pub async fn comments_for(&self, blog_id: i64) -> Result<Vec<CommentWithMeta>, CommentServiceError> {
        Ok(self
            .repo
            .list_for_blog(blog_id)
            .await
            .context("Failed to list comments")?)
    }

    /// Add a comment, or a reply when `parent_id` is given.
    ///
    /// A reply's parent must be a comment on the same blog. Threads are one
    /// level deep: answering a reply attaches to that reply's root comment.
    pub async fn add_comment(
        &self,
        blog: &Blog,
        author: &User,
        content: &str,
        parent_id: Option<i64>,
    ) -> Result<Comment, CommentServiceError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CommentServiceError::ValidationError(
                "Comment cannot be empty".to_string(),
            ));
        }
        if content.chars().count() > MAX_COMMENT_LENGTH {
            return Err(CommentServiceError::ValidationError(format!(
                "Comment cannot exceed {} characters",
                MAX_COMMENT_LENGTH
            )));
        }

        let mut parent_id = parent_id;
        if let Some(pid) = parent_id {
            let parent = self
                .repo
                .get_by_id(pid)
                .await
                .context("Failed to get parent comment")?
                .ok_or(CommentServiceError::NotFound(pid))?;
            if parent.blog_id != blog.id {
                return Err(CommentServiceError::ValidationError(
                    "Reply must belong to the same blog".to_string(),
                ));
            }
            if let Some(root) = parent.parent_id {
                parent_id = Some(root);
            }
        }

        let input = CreateCommentInput {
            blog_id: blog.id,
            author_id: author.id,
            parent_id,
            content: content.to_string(),
        };
        let comment = self.repo.create(&input).await.context("Failed to create comment")?;

        tracing::info!("User '{}' commented on blog '{}'", author.username, blog.slug);
        Ok(comment)
    }

    /// Like the blog if the user has not, otherwise take the like back
    pub async fn toggle_like(&self, user_id: i64, blog_id: i64) -> Result<LikeToggle, CommentServiceError> {
        if self
            .repo
            .remove_like(user_id, blog_id)
            .await
            .context("Failed to remove like")?
        {
            return Ok(LikeToggle::Unliked);
        }
        self.repo
            .add_like(user_id, blog_id)
            .await
            .context("Failed to add like")?;
        Ok(LikeToggle::Liked)
    }

    pub async fn is_liked(&self, user_id: i64, blog_id: i64) -> Result<bool, CommentServiceError> {
        Ok(self
            .repo
            .is_liked(user_id, blog_id)
            .await
            .context("Failed to check like")?)
    }

    pub async fn like_count(&self, blog_id: i64) -> Result<i64, CommentServiceError> {
        Ok(self.repo.like_count(blog_id).await.context("Failed to count likes")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxCommentRepository;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::UserRole;

    struct Fixture {
        service: CommentService,
        user: User,
        first: Blog,
        second: Blog,
    }

    async fn insert_blog(pool: &DynDatabasePool, slug: &str, author_id: i64) -> Blog {
        let id = sqlx::query("INSERT INTO blogs (title, slug, content, author_id) VALUES ('T', ?, 'c', ?)")
            .bind(slug)
            .bind(author_id)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap()
            .last_insert_rowid();
        Blog {
            id,
            ..Blog::new("T".into(), slug.into(), "c".into(), author_id, None, true)
        }
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES ('ada', 'ada@example.com', 'h')",
        )
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap()
        .last_insert_rowid();
        let user = User {
            id: user_id,
            ..User::new(
                "ada".into(),
                "ada@example.com".into(),
                String::new(),
                String::new(),
                "h".into(),
                UserRole::Author,
            )
        };
        let first = insert_blog(&pool, "first", user_id).await;
        let second = insert_blog(&pool, "second", user_id).await;
        Fixture {
            service: CommentService::new(SqlxCommentRepository::boxed(pool)),
            user,
            first,
            second,
        }
    }

    #[tokio::test]
    async fn test_toggle_like_twice_restores_count() {
        let f = setup().await;
        let before = f.service.like_count(f.first.id).await.unwrap();

        assert_eq!(f.service.toggle_like(f.user.id, f.first.id).await.unwrap(), LikeToggle::Liked);
        assert!(f.service.is_liked(f.user.id, f.first.id).await.unwrap());
        assert_eq!(f.service.like_count(f.first.id).await.unwrap(), before + 1);

        assert_eq!(f.service.toggle_like(f.user.id, f.first.id).await.unwrap(), LikeToggle::Unliked);
        assert!(!f.service.is_liked(f.user.id, f.first.id).await.unwrap());
        assert_eq!(f.service.like_count(f.first.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_reply_parent_must_be_on_same_blog() {
        let f = setup().await;
        let root = f.service.add_comment(&f.first, &f.user, "root", None).await.unwrap();

        let reply = f
            .service
            .add_comment(&f.first, &f.user, "reply", Some(root.id))
            .await
            .unwrap();
        assert_eq!(reply.parent_id, Some(root.id));

        let cross = f.service.add_comment(&f.second, &f.user, "wrong", Some(root.id)).await;
        assert!(matches!(cross, Err(CommentServiceError::ValidationError(_))));

        let missing = f.service.add_comment(&f.first, &f.user, "orphan", Some(999)).await;
        assert!(matches!(missing, Err(CommentServiceError::NotFound(999))));

        let comments = f.service.comments_for(f.second.id).await.unwrap();
        assert!(comments.is_empty());
    }

    #[tokio::test]
    async fn test_reply_to_reply_attaches_to_root() {
        let f = setup().await;
        let root = f.service.add_comment(&f.first, &f.user, "root", None).await.unwrap();
        let reply = f
            .service
            .add_comment(&f.first, &f.user, "reply", Some(root.id))
            .await
            .unwrap();
        let nested = f
            .service
            .add_comment(&f.first, &f.user, "answer to reply", Some(reply.id))
            .await
            .unwrap();
        assert_eq!(nested.parent_id, Some(root.id));

        let comments = f.service.comments_for(f.first.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].replies.len(), 2);
        assert!(comments[0].replies.iter().all(|r| r.replies.is_empty()));
    }

    #[tokio::test]
    async fn test_comment_content_rules() {
        let f = setup().await;
        assert!(matches!(
            f.service.add_comment(&f.first, &f.user, "   ", None).await,
            Err(CommentServiceError::ValidationError(_))
        ));
        assert!(matches!(
            f.service.add_comment(&f.first, &f.user, &"x".repeat(1001), None).await,
            Err(CommentServiceError::ValidationError(_))
        ));

        let saved = f
            .service
            .add_comment(&f.first, &f.user, "  hello  ", None)
            .await
            .unwrap();
        assert_eq!(saved.content, "hello");
        let comments = f.service.comments_for(f.first.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author_username, "ada");
    }
}
