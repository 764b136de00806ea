//! User repository
//!
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Profile, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username (exact, case-sensitive)
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Save the account fields of a user together with their profile.
    /// Both rows change or neither does.
    async fn update_with_profile(&self, user: &User, profile: &Profile) -> Result<User>;

    /// Count total users
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, role, created_at, updated_at";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.as_sqlite().unwrap(), user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.as_mysql().unwrap(), user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get user by ID")?;
                row.map(|r| row_to_user_sqlite(&r)).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get user by ID")?;
                row.map(|r| row_to_user_mysql(&r)).transpose()
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_username_sqlite(self.pool.as_sqlite().unwrap(), username).await
            }
            DatabaseDriver::Mysql => {
                get_user_by_username_mysql(self.pool.as_mysql().unwrap(), username).await
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE LOWER(email) = LOWER(?)", USER_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get user by email")?;
                row.map(|r| row_to_user_sqlite(&r)).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get user by email")?;
                row.map(|r| row_to_user_mysql(&r)).transpose()
            }
        }
    }

    async fn update_with_profile(&self, user: &User, profile: &Profile) -> Result<User> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_user_and_profile_sqlite(self.pool.as_sqlite().unwrap(), user, profile, now)
                    .await?
            }
            DatabaseDriver::Mysql => {
                update_user_and_profile_mysql(self.pool.as_mysql().unwrap(), user, profile, now)
                    .await?
            }
        }
        Ok(User {
            updated_at: now,
            ..user.clone()
        })
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM users";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
            }
        };
        count.context("Failed to count users")
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const UPDATE_USER_SQL: &str = r#"
    UPDATE users
    SET username = ?, email = ?, first_name = ?, last_name = ?, updated_at = ?
    WHERE id = ?
"#;

const UPDATE_PROFILE_SQL: &str = r#"
    UPDATE profiles
    SET bio = ?, location = ?, birth_date = ?, avatar = ?, website = ?
    WHERE user_id = ?
"#;

async fn update_user_and_profile_sqlite(
    pool: &SqlitePool,
    user: &User,
    profile: &Profile,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(UPDATE_USER_SQL)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(now)
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update user")?;
    sqlx::query(UPDATE_PROFILE_SQL)
        .bind(&profile.bio)
        .bind(&profile.location)
        .bind(profile.birth_date)
        .bind(&profile.avatar)
        .bind(&profile.website)
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update profile")?;
    tx.commit().await?;
    Ok(())
}

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_username_sqlite(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    // SQLite's `=` is case-sensitive for TEXT by default.
    let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;
    row.map(|r| row_to_user_sqlite(&r)).transpose()
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        role,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn update_user_and_profile_mysql(
    pool: &MySqlPool,
    user: &User,
    profile: &Profile,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(UPDATE_USER_SQL)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(now)
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update user")?;
    sqlx::query(UPDATE_PROFILE_SQL)
        .bind(&profile.bio)
        .bind(&profile.location)
        .bind(profile.birth_date)
        .bind(&profile.avatar)
        .bind(&profile.website)
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update profile")?;
    tx.commit().await?;
    Ok(())
}

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_username_mysql(pool: &MySqlPool, username: &str) -> Result<Option<User>> {
    // The default MySQL collation is case-insensitive; BINARY keeps usernames exact.
    let sql = format!("SELECT {} FROM users WHERE username = BINARY ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;
    row.map(|r| row_to_user_mysql(&r)).transpose()
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        role,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn test_user(username: &str, email: &str) -> User {
        User::new(
            username.to_string(),
            email.to_string(),
            String::new(),
            String::new(),
            "hash".to_string(),
            UserRole::Author,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&test_user("ada", "ada@example.com"))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().expect("User not found");
        assert_eq!(found.username, "ada");
        assert_eq!(found.role, UserRole::Author);
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_username_lookup_is_case_sensitive() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("Ada", "ada@example.com")).await.unwrap();

        assert!(repo.get_by_username("Ada").await.unwrap().is_some());
        assert!(repo.get_by_username("ada").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_email_lookup_ignores_case() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("ada", "Ada@Example.com")).await.unwrap();

        assert!(repo.get_by_email("ada@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("ada", "a@example.com")).await.unwrap();

        let result = repo.create(&test_user("ada", "b@example.com")).await;
        assert!(result.is_err());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    async fn profile_for(repo: &SqlxUserRepository, user_id: i64) -> Profile {
        sqlx::query("INSERT INTO profiles (user_id) VALUES (?)")
            .bind(user_id)
            .execute(repo.pool.as_sqlite().unwrap())
            .await
            .unwrap();
        Profile {
            bio: "Analyst".to_string(),
            ..Profile::empty(user_id)
        }
    }

    #[tokio::test]
    async fn test_update_user_with_profile() {
        let repo = setup_test_repo().await;
        let mut user = repo.create(&test_user("ada", "ada@example.com")).await.unwrap();
        let profile = profile_for(&repo, user.id).await;
        user.first_name = "Ada".to_string();
        user.last_name = "Lovelace".to_string();
        user.username = "countess".to_string();
        repo.update_with_profile(&user, &profile).await.unwrap();

        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.username, "countess");
        assert_eq!(found.display_name(), "Ada Lovelace");
        let bio: String = sqlx::query_scalar("SELECT bio FROM profiles WHERE user_id = ?")
            .bind(user.id)
            .fetch_one(repo.pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(bio, "Analyst");
    }

    #[tokio::test]
    async fn test_failed_profile_write_keeps_account_unchanged() {
        let repo = setup_test_repo().await;
        let mut user = repo.create(&test_user("ada", "ada@example.com")).await.unwrap();
        let profile = profile_for(&repo, user.id).await;
        sqlx::query("DROP TABLE profiles")
            .execute(repo.pool.as_sqlite().unwrap())
            .await
            .unwrap();

        user.username = "countess".to_string();
        assert!(repo.update_with_profile(&user, &profile).await.is_err());

        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.username, "ada");
    }
}
