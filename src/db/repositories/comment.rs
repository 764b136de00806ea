//! Comment and like repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentWithMeta, CreateCommentInput};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Get a comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Root comments of a blog, oldest first, each with its replies nested
    async fn list_for_blog(&self, blog_id: i64) -> Result<Vec<CommentWithMeta>>;

    /// Add a like. Returns false if the user already liked the blog.
    async fn add_like(&self, user_id: i64, blog_id: i64) -> Result<bool>;

    /// Remove a like. Returns false if there was none.
    async fn remove_like(&self, user_id: i64, blog_id: i64) -> Result<bool>;

    /// Check if liked
    async fn is_liked(&self, user_id: i64, blog_id: i64) -> Result<bool>;

    /// Number of likes on a blog
    async fn like_count(&self, blog_id: i64) -> Result<i64>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_FOR_BLOG: &str = r#"
    SELECT c.id, c.blog_id, c.author_id, c.parent_id, c.content, c.created_at,
           u.username AS author_username
    FROM comments c
    JOIN users u ON u.id = c.author_id
    WHERE c.blog_id = ?
    ORDER BY c.created_at ASC, c.id ASC
"#;

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), input).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = "SELECT id, blog_id, author_id, parent_id, content, created_at FROM comments WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get comment")?;
                Ok(row.map(|r| row_to_comment_sqlite(&r)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get comment")?;
                Ok(row.map(|r| row_to_comment_mysql(&r)))
            }
        }
    }

    async fn list_for_blog(&self, blog_id: i64) -> Result<Vec<CommentWithMeta>> {
        let flat: Vec<CommentWithMeta> = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(SELECT_FOR_BLOG)
                    .bind(blog_id)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list comments")?;
                rows.iter()
                    .map(|r| CommentWithMeta {
                        comment: row_to_comment_sqlite(r),
                        author_username: r.get("author_username"),
                        replies: Vec::new(),
                    })
                    .collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(SELECT_FOR_BLOG)
                    .bind(blog_id)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list comments")?;
                rows.iter()
                    .map(|r| CommentWithMeta {
                        comment: row_to_comment_mysql(r),
                        author_username: r.get("author_username"),
                        replies: Vec::new(),
                    })
                    .collect()
            }
        };
        Ok(nest_replies(flat))
    }

    async fn add_like(&self, user_id: i64, blog_id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT OR IGNORE INTO blog_likes (user_id, blog_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(blog_id)
            .bind(now)
            .execute(self.pool.as_sqlite().unwrap())
            .await
            .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(
                "INSERT IGNORE INTO blog_likes (user_id, blog_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(blog_id)
            .bind(now)
            .execute(self.pool.as_mysql().unwrap())
            .await
            .map(|r| r.rows_affected()),
        };
        Ok(affected.context("Failed to add like")? > 0)
    }

    async fn remove_like(&self, user_id: i64, blog_id: i64) -> Result<bool> {
        let sql = "DELETE FROM blog_likes WHERE user_id = ? AND blog_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(blog_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(blog_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|r| r.rows_affected()),
        };
        Ok(affected.context("Failed to remove like")? > 0)
    }

    async fn is_liked(&self, user_id: i64, blog_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM blog_likes WHERE user_id = ? AND blog_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(user_id)
                    .bind(blog_id)
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(user_id)
                    .bind(blog_id)
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
            }
        };
        Ok(count.context("Failed to check like")? > 0)
    }

    async fn like_count(&self, blog_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM blog_likes WHERE blog_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(blog_id)
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(blog_id)
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
            }
        };
        count.context("Failed to count likes")
    }
}

/// Attach every comment to its parent, keeping input (oldest-first) order.
/// Comments whose parent is missing are treated as roots.
fn nest_replies(flat: Vec<CommentWithMeta>) -> Vec<CommentWithMeta> {
    let ids: std::collections::HashSet<i64> = flat.iter().map(|c| c.comment.id).collect();
    let mut children: HashMap<i64, Vec<CommentWithMeta>> = HashMap::new();
    let mut roots = Vec::new();

    for comment in flat {
        match comment.comment.parent_id {
            Some(pid) if ids.contains(&pid) => children.entry(pid).or_default().push(comment),
            _ => roots.push(comment),
        }
    }

    fn attach(node: &mut CommentWithMeta, children: &mut HashMap<i64, Vec<CommentWithMeta>>) {
        if let Some(mut replies) = children.remove(&node.comment.id) {
            for reply in replies.iter_mut() {
                attach(reply, children);
            }
            node.replies = replies;
        }
    }

    for root in roots.iter_mut() {
        attach(root, &mut children);
    }
    roots
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (blog_id, author_id, parent_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(input.blog_id)
    .bind(input.author_id)
    .bind(input.parent_id)
    .bind(&input.content)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        blog_id: input.blog_id,
        author_id: input.author_id,
        parent_id: input.parent_id,
        content: input.content.clone(),
        created_at: now,
    })
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        blog_id: row.get("blog_id"),
        author_id: row.get("author_id"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (blog_id, author_id, parent_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(input.blog_id)
    .bind(input.author_id)
    .bind(input.parent_id)
    .bind(&input.content)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        blog_id: input.blog_id,
        author_id: input.author_id,
        parent_id: input.parent_id,
        content: input.content.clone(),
        created_at: now,
    })
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        blog_id: row.get("blog_id"),
        author_id: row.get("author_id"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}
