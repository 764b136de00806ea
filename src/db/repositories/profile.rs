//! Profile repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Profile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Profile repository trait
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Create the profile for a user; an existing one is left untouched
    async fn create_for_user(&self, user_id: i64) -> Result<()>;

    /// Get profile by its primary key
    async fn get_by_id(&self, id: i64) -> Result<Option<Profile>>;

    /// Get the profile of a user
    async fn get_by_user(&self, user_id: i64) -> Result<Option<Profile>>;
}

/// SQLx-based profile repository implementation
pub struct SqlxProfileRepository {
    pool: DynDatabasePool,
}

impl SqlxProfileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProfileRepository> {
        Arc::new(Self::new(pool))
    }
}

const PROFILE_COLUMNS: &str = "id, user_id, bio, location, birth_date, avatar, website";

#[async_trait]
impl ProfileRepository for SqlxProfileRepository {
    async fn create_for_user(&self, user_id: i64) -> Result<()> {
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("INSERT OR IGNORE INTO profiles (user_id) VALUES (?)")
                    .bind(user_id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .map(|_| ())
            }
            DatabaseDriver::Mysql => {
                sqlx::query("INSERT IGNORE INTO profiles (user_id) VALUES (?)")
                    .bind(user_id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .map(|_| ())
            }
        };
        result.context("Failed to create profile")?;
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Profile>> {
        let sql = format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_profile_sqlite(self.pool.as_sqlite().unwrap(), &sql, id).await,
            DatabaseDriver::Mysql => fetch_profile_mysql(self.pool.as_mysql().unwrap(), &sql, id).await,
        }
    }

    async fn get_by_user(&self, user_id: i64) -> Result<Option<Profile>> {
        let sql = format!("SELECT {} FROM profiles WHERE user_id = ?", PROFILE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                fetch_profile_sqlite(self.pool.as_sqlite().unwrap(), &sql, user_id).await
            }
            DatabaseDriver::Mysql => {
                fetch_profile_mysql(self.pool.as_mysql().unwrap(), &sql, user_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn fetch_profile_sqlite(pool: &SqlitePool, sql: &str, key: i64) -> Result<Option<Profile>> {
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get profile")?;

    Ok(row.map(|row| Profile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        bio: row.get("bio"),
        location: row.get("location"),
        birth_date: row.get("birth_date"),
        avatar: row.get("avatar"),
        website: row.get("website"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn fetch_profile_mysql(pool: &MySqlPool, sql: &str, key: i64) -> Result<Option<Profile>> {
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get profile")?;

    Ok(row.map(|row| Profile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        bio: row.get("bio"),
        location: row.get("location"),
        birth_date: row.get("birth_date"),
        avatar: row.get("avatar"),
        website: row.get("website"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (SqlxProfileRepository, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES ('ada', 'ada@example.com', 'h')",
        )
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap()
        .last_insert_rowid();
        (SqlxProfileRepository::new(pool), user_id)
    }

    #[tokio::test]
    async fn test_create_for_user_is_idempotent() {
        let (repo, user_id) = setup().await;
        repo.create_for_user(user_id).await.unwrap();
        repo.create_for_user(user_id).await.unwrap();

        let profile = repo.get_by_user(user_id).await.unwrap().expect("Profile not found");
        assert_eq!(profile, Profile { id: profile.id, ..Profile::empty(user_id) });
        assert_eq!(repo.get_by_id(profile.id).await.unwrap().unwrap().user_id, user_id);
    }
}
