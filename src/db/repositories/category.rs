//! Category repository
//!
//! - `CategoryRepository` trait defining the interface for category data access
//! - `SqlxCategoryRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Category, CategoryWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, category: &Category) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by name
    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// All categories ordered by name
    async fn list(&self) -> Result<Vec<Category>>;

    /// All categories with their published-blog counts
    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCount>>;

    /// Delete a category. Returns false when it did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    /// Create a new SQLx category repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_CATEGORY: &str = "SELECT id, name, description, created_at FROM categories";

const SELECT_WITH_COUNTS: &str = r#"
    SELECT c.id, c.name, c.description, c.created_at,
           COUNT(b.id) AS blog_count
    FROM categories c
    LEFT JOIN blogs b ON b.category_id = c.id AND b.is_published = 1
    GROUP BY c.id, c.name, c.description, c.created_at
    ORDER BY c.name
"#;

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_category_sqlite(self.pool.as_sqlite().unwrap(), category).await
            }
            DatabaseDriver::Mysql => {
                create_category_mysql(self.pool.as_mysql().unwrap(), category).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("{} WHERE id = ?", SELECT_CATEGORY);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get category by ID")?;
                Ok(row.map(|r| row_to_category_sqlite(&r)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get category by ID")?;
                Ok(row.map(|r| row_to_category_mysql(&r)))
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        let sql = format!("{} WHERE LOWER(name) = LOWER(?)", SELECT_CATEGORY);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(name)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get category by name")?;
                Ok(row.map(|r| row_to_category_sqlite(&r)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(name)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get category by name")?;
                Ok(row.map(|r| row_to_category_mysql(&r)))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let sql = format!("{} ORDER BY name", SELECT_CATEGORY);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list categories")?;
                Ok(rows.iter().map(row_to_category_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list categories")?;
                Ok(rows.iter().map(row_to_category_mysql).collect())
            }
        }
    }

    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(SELECT_WITH_COUNTS)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list categories with counts")?;
                Ok(rows
                    .iter()
                    .map(|row| CategoryWithCount {
                        category: row_to_category_sqlite(row),
                        blog_count: row.get("blog_count"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(SELECT_WITH_COUNTS)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list categories with counts")?;
                Ok(rows
                    .iter()
                    .map(|row| CategoryWithCount {
                        category: row_to_category_mysql(row),
                        blog_count: row.get("blog_count"),
                    })
                    .collect())
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM categories WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|r| r.rows_affected()),
        };
        Ok(affected.context("Failed to delete category")? > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO categories (name, description, created_at) VALUES (?, ?, ?)")
        .bind(&category.name)
        .bind(&category.description)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        created_at: now,
        ..category.clone()
    })
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_category_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO categories (name, description, created_at) VALUES (?, ?, ?)")
        .bind(&category.name)
        .bind(&category.description)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..category.clone()
    })
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (DynDatabasePool, SqlxCategoryRepository) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxCategoryRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_lookup_category() {
        let (_pool, repo) = setup().await;
        let created = repo
            .create(&Category::new("Rust".to_string(), "Systems".to_string()))
            .await
            .unwrap();
        assert!(created.id > 0);

        assert_eq!(repo.get_by_id(created.id).await.unwrap().unwrap().name, "Rust");
        assert!(repo.get_by_name("rust").await.unwrap().is_some());
        assert!(repo.get_by_name("Go").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_name() {
        let (_pool, repo) = setup().await;
        for name in ["Zig", "Ada", "Rust"] {
            repo.create(&Category::new(name.to_string(), String::new())).await.unwrap();
        }
        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Ada", "Rust", "Zig"]);
    }

    #[tokio::test]
    async fn test_counts_only_published_blogs() {
        let (pool, repo) = setup().await;
        let sqlite = pool.as_sqlite().unwrap();
        let rust = repo.create(&Category::new("Rust".to_string(), String::new())).await.unwrap();
        repo.create(&Category::new("Empty".to_string(), String::new())).await.unwrap();
        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES ('ada', 'ada@example.com', 'h')",
        )
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        for (slug, published) in [("a", true), ("b", true), ("c", false)] {
            sqlx::query(
                "INSERT INTO blogs (title, slug, content, author_id, category_id, is_published) VALUES ('T', ?, 'c', ?, ?, ?)",
            )
            .bind(slug)
            .bind(user_id)
            .bind(rust.id)
            .bind(published)
            .execute(sqlite)
            .await
            .unwrap();
        }

        let counts = repo.list_with_counts().await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].category.name, "Empty");
        assert_eq!(counts[0].blog_count, 0);
        assert_eq!(counts[1].blog_count, 2);
    }

    #[tokio::test]
    async fn test_delete_category() {
        let (_pool, repo) = setup().await;
        let created = repo.create(&Category::new("Rust".to_string(), String::new())).await.unwrap();
        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}
