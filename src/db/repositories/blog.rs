//! Blog repository
//!
//! Database operations for blog posts. Listing queries are built from a
//! [`BlogFilter`]: every active criterion adds one parameterised condition
//! to the WHERE clause, and the same clause drives both the page query and
//! its total count.

use crate::config::DatabaseDriver;
use crate::db::{like_pattern, DynDatabasePool};
use crate::models::{Blog, BlogFilter, BlogWithMeta, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Blog repository trait
#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Create a new blog
    async fn create(&self, blog: &Blog) -> Result<Blog>;

    /// Get a blog with author, category and like count by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<BlogWithMeta>>;

    /// Check whether a slug is taken
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Save title, slug, content, category and publication state
    async fn update(&self, blog: &Blog) -> Result<Blog>;

    /// Delete a blog
    async fn delete(&self, id: i64) -> Result<()>;

    /// Add one to the view counter in a single statement
    async fn increment_views(&self, id: i64) -> Result<()>;

    /// Count blogs matching a filter
    async fn count(&self, filter: &BlogFilter) -> Result<i64>;

    /// One page of blogs matching a filter, newest first
    async fn list(&self, filter: &BlogFilter, params: &ListParams) -> Result<Vec<BlogWithMeta>>;
}

/// SQLx-based blog repository implementation
pub struct SqlxBlogRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogRepository {
    /// Create a new SQLx blog repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_WITH_META: &str = r#"
    SELECT b.id, b.title, b.slug, b.content, b.author_id, b.category_id,
           b.is_published, b.views, b.created_at, b.updated_at,
           u.username AS author_username,
           c.name AS category_name,
           (SELECT COUNT(*) FROM blog_likes l WHERE l.blog_id = b.id) AS like_count
    FROM blogs b
    JOIN users u ON u.id = b.author_id
    LEFT JOIN categories c ON c.id = b.category_id
"#;

const COUNT_FROM: &str = r#"
    SELECT COUNT(*)
    FROM blogs b
    JOIN users u ON u.id = b.author_id
"#;

const ORDER_NEWEST: &str = "ORDER BY b.created_at DESC, b.id DESC";

/// A value bound to a filter placeholder
#[derive(Debug, Clone, PartialEq)]
enum FilterArg {
    Int(i64),
    Text(String),
}

/// Translate a filter into a WHERE clause (empty when nothing applies) and
/// its arguments, in placeholder order.
fn filter_clause(filter: &BlogFilter, driver: DatabaseDriver) -> (String, Vec<FilterArg>) {
    let mut conditions = Vec::new();
    let mut args = Vec::new();

    if filter.published_only {
        conditions.push("b.is_published = 1".to_string());
    }
    if let Some(author_id) = filter.author_id {
        conditions.push("b.author_id = ?".to_string());
        args.push(FilterArg::Int(author_id));
    }
    if let Some(category_id) = filter.category_id {
        conditions.push("b.category_id = ?".to_string());
        args.push(FilterArg::Int(category_id));
    }
    if let Some(term) = &filter.search {
        // MySQL already treats backslash as the LIKE escape character.
        let like = match driver {
            DatabaseDriver::Sqlite => r"LIKE LOWER(?) ESCAPE '\'",
            DatabaseDriver::Mysql => "LIKE LOWER(?)",
        };
        conditions.push(format!(
            "(LOWER(b.title) {like} OR LOWER(b.content) {like} OR LOWER(u.username) {like})"
        ));
        let pattern = like_pattern(term);
        args.extend(std::iter::repeat(FilterArg::Text(pattern)).take(3));
    }

    if conditions.is_empty() {
        (String::new(), args)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), args)
    }
}

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create(&self, blog: &Blog) -> Result<Blog> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_blog_sqlite(self.pool.as_sqlite().unwrap(), blog).await,
            DatabaseDriver::Mysql => create_blog_mysql(self.pool.as_mysql().unwrap(), blog).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<BlogWithMeta>> {
        let sql = format!("{} WHERE b.slug = ?", SELECT_WITH_META);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get blog by slug")?;
                Ok(row.map(|r| row_to_blog_sqlite(&r)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get blog by slug")?;
                Ok(row.map(|r| row_to_blog_mysql(&r)))
            }
        }
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM blogs WHERE slug = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(slug)
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(slug)
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
            }
        };
        Ok(count.context("Failed to check slug")? > 0)
    }

    async fn update(&self, blog: &Blog) -> Result<Blog> {
        let now = Utc::now();
        let sql = r#"
            UPDATE blogs
            SET title = ?, slug = ?, content = ?, category_id = ?, is_published = ?, updated_at = ?
            WHERE id = ?
        "#;
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&blog.title)
                .bind(&blog.slug)
                .bind(&blog.content)
                .bind(blog.category_id)
                .bind(blog.is_published)
                .bind(now)
                .bind(blog.id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&blog.title)
                .bind(&blog.slug)
                .bind(&blog.content)
                .bind(blog.category_id)
                .bind(blog.is_published)
                .bind(now)
                .bind(blog.id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|_| ()),
        };
        result.context("Failed to update blog")?;

        Ok(Blog {
            updated_at: now,
            ..blog.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM blogs WHERE id = ?";
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|_| ()),
        };
        result.context("Failed to delete blog")
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        let sql = "UPDATE blogs SET views = views + 1 WHERE id = ?";
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|_| ()),
        };
        result.context("Failed to increment blog views")
    }

    async fn count(&self, filter: &BlogFilter) -> Result<i64> {
        let driver = self.pool.driver();
        let (clause, args) = filter_clause(filter, driver);
        let sql = format!("{} {}", COUNT_FROM, clause);
        match driver {
            DatabaseDriver::Sqlite => count_blogs_sqlite(self.pool.as_sqlite().unwrap(), &sql, args).await,
            DatabaseDriver::Mysql => count_blogs_mysql(self.pool.as_mysql().unwrap(), &sql, args).await,
        }
    }

    async fn list(&self, filter: &BlogFilter, params: &ListParams) -> Result<Vec<BlogWithMeta>> {
        let driver = self.pool.driver();
        let (clause, args) = filter_clause(filter, driver);
        let sql = format!("{} {} {} LIMIT ? OFFSET ?", SELECT_WITH_META, clause, ORDER_NEWEST);
        match driver {
            DatabaseDriver::Sqlite => {
                list_blogs_sqlite(self.pool.as_sqlite().unwrap(), &sql, args, params).await
            }
            DatabaseDriver::Mysql => {
                list_blogs_mysql(self.pool.as_mysql().unwrap(), &sql, args, params).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_blog_sqlite(pool: &SqlitePool, blog: &Blog) -> Result<Blog> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO blogs (title, slug, content, author_id, category_id, is_published, views, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&blog.title)
    .bind(&blog.slug)
    .bind(&blog.content)
    .bind(blog.author_id)
    .bind(blog.category_id)
    .bind(blog.is_published)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create blog")?;

    Ok(Blog {
        id: result.last_insert_rowid(),
        views: 0,
        created_at: now,
        updated_at: now,
        ..blog.clone()
    })
}

async fn count_blogs_sqlite(pool: &SqlitePool, sql: &str, args: Vec<FilterArg>) -> Result<i64> {
    let mut query = sqlx::query_scalar::<_, i64>(sql);
    for arg in args {
        query = match arg {
            FilterArg::Int(v) => query.bind(v),
            FilterArg::Text(s) => query.bind(s),
        };
    }
    query.fetch_one(pool).await.context("Failed to count blogs")
}

async fn list_blogs_sqlite(
    pool: &SqlitePool,
    sql: &str,
    args: Vec<FilterArg>,
    params: &ListParams,
) -> Result<Vec<BlogWithMeta>> {
    let mut query = sqlx::query(sql);
    for arg in args {
        query = match arg {
            FilterArg::Int(v) => query.bind(v),
            FilterArg::Text(s) => query.bind(s),
        };
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list blogs")?;

    Ok(rows.iter().map(row_to_blog_sqlite).collect())
}

fn row_to_blog_sqlite(row: &sqlx::sqlite::SqliteRow) -> BlogWithMeta {
    BlogWithMeta {
        blog: Blog {
            id: row.get("id"),
            title: row.get("title"),
            slug: row.get("slug"),
            content: row.get("content"),
            author_id: row.get("author_id"),
            category_id: row.get("category_id"),
            is_published: row.get("is_published"),
            views: row.get("views"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
        author_username: row.get("author_username"),
        category_name: row.get("category_name"),
        like_count: row.get("like_count"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_blog_mysql(pool: &MySqlPool, blog: &Blog) -> Result<Blog> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO blogs (title, slug, content, author_id, category_id, is_published, views, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&blog.title)
    .bind(&blog.slug)
    .bind(&blog.content)
    .bind(blog.author_id)
    .bind(blog.category_id)
    .bind(blog.is_published)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create blog")?;

    Ok(Blog {
        id: result.last_insert_id() as i64,
        views: 0,
        created_at: now,
        updated_at: now,
        ..blog.clone()
    })
}

async fn count_blogs_mysql(pool: &MySqlPool, sql: &str, args: Vec<FilterArg>) -> Result<i64> {
    let mut query = sqlx::query_scalar::<_, i64>(sql);
    for arg in args {
        query = match arg {
            FilterArg::Int(v) => query.bind(v),
            FilterArg::Text(s) => query.bind(s),
        };
    }
    query.fetch_one(pool).await.context("Failed to count blogs")
}

async fn list_blogs_mysql(
    pool: &MySqlPool,
    sql: &str,
    args: Vec<FilterArg>,
    params: &ListParams,
) -> Result<Vec<BlogWithMeta>> {
    let mut query = sqlx::query(sql);
    for arg in args {
        query = match arg {
            FilterArg::Int(v) => query.bind(v),
            FilterArg::Text(s) => query.bind(s),
        };
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list blogs")?;

    Ok(rows.iter().map(row_to_blog_mysql).collect())
}

fn row_to_blog_mysql(row: &sqlx::mysql::MySqlRow) -> BlogWithMeta {
    BlogWithMeta {
        blog: Blog {
            id: row.get("id"),
            title: row.get("title"),
            slug: row.get("slug"),
            content: row.get("content"),
            author_id: row.get("author_id"),
            category_id: row.get("category_id"),
            is_published: row.get("is_published"),
            views: row.get("views"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
        author_username: row.get("author_username"),
        category_name: row.get("category_name"),
        like_count: row.get("like_count"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    struct Fixture {
        pool: DynDatabasePool,
        repo: SqlxBlogRepository,
        author_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let author_id = insert_user(&pool, "writer").await;
        let repo = SqlxBlogRepository::new(pool.clone());
        Fixture { pool, repo, author_id }
    }

    async fn insert_user(pool: &DynDatabasePool, username: &str) -> i64 {
        sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, 'h')")
            .bind(username)
            .bind(format!("{}@example.com", username))
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap()
            .last_insert_rowid()
    }

    async fn insert_blog(f: &Fixture, title: &str, content: &str, published: bool) -> Blog {
        let slug = title.to_lowercase().replace(' ', "-");
        f.repo
            .create(&Blog::new(
                title.to_string(),
                slug,
                content.to_string(),
                f.author_id,
                None,
                published,
            ))
            .await
            .expect("Failed to create blog")
    }

    fn first_page() -> ListParams {
        ListParams { page: 1, per_page: 10 }
    }

    async fn titles(f: &Fixture, filter: &BlogFilter) -> Vec<String> {
        f.repo
            .list(filter, &first_page())
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.blog.title)
            .collect()
    }

    #[tokio::test]
    async fn test_create_and_get_by_slug() {
        let f = setup().await;
        let blog = insert_blog(&f, "Hello World", "Body", true).await;
        assert!(blog.id > 0);
        assert_eq!(blog.views, 0);

        let found = f.repo.get_by_slug("hello-world").await.unwrap().expect("Blog not found");
        assert_eq!(found.blog.id, blog.id);
        assert_eq!(found.author_username, "writer");
        assert_eq!(found.category_name, None);
        assert_eq!(found.like_count, 0);
        assert!(f.repo.slug_exists("hello-world").await.unwrap());
        assert!(!f.repo.slug_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_matches_titles_case_insensitively() {
        let f = setup().await;
        insert_blog(&f, "Alpha", "first", true).await;
        insert_blog(&f, "Beta", "second", true).await;
        insert_blog(&f, "Alpha Two", "third", true).await;

        let filter = BlogFilter::published().with_search(Some("alpha"));
        let mut found = titles(&f, &filter).await;
        found.sort();
        assert_eq!(found, vec!["Alpha", "Alpha Two"]);
        assert_eq!(f.repo.count(&filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_matches_content_and_author() {
        let f = setup().await;
        insert_blog(&f, "One", "talks about Ferris", true).await;
        insert_blog(&f, "Two", "nothing", true).await;

        let by_content = BlogFilter::published().with_search(Some("ferris"));
        assert_eq!(titles(&f, &by_content).await, vec!["One"]);

        let by_author = BlogFilter::published().with_search(Some("WRITER"));
        assert_eq!(f.repo.count(&by_author).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let f = setup().await;
        insert_blog(&f, "Plain", "no percent here", true).await;
        insert_blog(&f, "Sale", "50% off", true).await;

        let filter = BlogFilter::published().with_search(Some("%"));
        assert_eq!(titles(&f, &filter).await, vec!["Sale"]);
    }

    #[tokio::test]
    async fn test_drafts_excluded_from_published_listing() {
        let f = setup().await;
        insert_blog(&f, "Live", "c", true).await;
        insert_blog(&f, "Draft", "c", false).await;

        assert_eq!(titles(&f, &BlogFilter::published()).await, vec!["Live"]);
        let mine = BlogFilter::default().with_author(f.author_id);
        assert_eq!(f.repo.count(&mine).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_category_filter() {
        let f = setup().await;
        let category_id = sqlx::query("INSERT INTO categories (name, description) VALUES ('Rust', '')")
            .execute(f.pool.as_sqlite().unwrap())
            .await
            .unwrap()
            .last_insert_rowid();
        let mut blog = insert_blog(&f, "In Category", "c", true).await;
        blog.category_id = Some(category_id);
        f.repo.update(&blog).await.unwrap();
        insert_blog(&f, "Elsewhere", "c", true).await;

        let filter = BlogFilter::published().with_category(Some(category_id));
        assert_eq!(titles(&f, &filter).await, vec!["In Category"]);
        let found = f.repo.get_by_slug("in-category").await.unwrap().unwrap();
        assert_eq!(found.category_name.as_deref(), Some("Rust"));
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paged() {
        let f = setup().await;
        for i in 0..7 {
            insert_blog(&f, &format!("Post {}", i), "c", true).await;
        }

        let page = ListParams { page: 2, per_page: 5 };
        let items = f.repo.list(&BlogFilter::published(), &page).await.unwrap();
        let names: Vec<_> = items.into_iter().map(|b| b.blog.title).collect();
        assert_eq!(names, vec!["Post 1", "Post 0"]);
    }

    #[tokio::test]
    async fn test_increment_views_adds_one() {
        let f = setup().await;
        let blog = insert_blog(&f, "Counted", "c", true).await;
        f.repo.increment_views(blog.id).await.unwrap();
        f.repo.increment_views(blog.id).await.unwrap();

        let found = f.repo.get_by_slug("counted").await.unwrap().unwrap();
        assert_eq!(found.blog.views, 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let f = setup().await;
        let mut blog = insert_blog(&f, "Before", "c", true).await;
        blog.title = "After".to_string();
        blog.slug = "after".to_string();
        f.repo.update(&blog).await.unwrap();
        assert!(f.repo.get_by_slug("before").await.unwrap().is_none());
        assert_eq!(f.repo.get_by_slug("after").await.unwrap().unwrap().blog.title, "After");

        f.repo.delete(blog.id).await.unwrap();
        assert!(f.repo.get_by_slug("after").await.unwrap().is_none());
    }

    #[test]
    fn test_filter_clause_orders_arguments() {
        let filter = BlogFilter::published()
            .with_author(3)
            .with_category(Some(9))
            .with_search(Some("x"));
        let (clause, args) = filter_clause(&filter, DatabaseDriver::Mysql);
        assert!(clause.starts_with("WHERE b.is_published = 1 AND b.author_id = ?"));
        assert!(!clause.contains("ESCAPE"));
        assert_eq!(args[0], FilterArg::Int(3));
        assert_eq!(args[1], FilterArg::Int(9));
        assert_eq!(args.len(), 5);

        let (clause, args) = filter_clause(&BlogFilter::default(), DatabaseDriver::Sqlite);
        assert!(clause.is_empty());
        assert!(args.is_empty());
    }
}
