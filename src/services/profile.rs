//! Profile service

use crate::db::repositories::{ProfileRepository, UserRepository};
use crate::models::{Profile, UpdateProfileInput, User};
use anyhow::Context;
use std::sync::Arc;

/// Maximum length of the bio and location fields
pub const MAX_PROFILE_TEXT_LENGTH: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ProfileServiceError {
    #[error("Profile not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ProfileService {
    profile_repo: Arc<dyn ProfileRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl ProfileService {
    pub fn new(profile_repo: Arc<dyn ProfileRepository>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self {
            profile_repo,
            user_repo,
        }
    }

    /// The user's profile, created on first access for accounts that lack one
    pub async fn get_or_create(&self, user_id: i64) -> Result<Profile, ProfileServiceError> {
        if let Some(profile) = self
            .profile_repo
            .get_by_user(user_id)
            .await
            .context("Failed to get profile")?
        {
            return Ok(profile);
        }

        tracing::info!("Creating missing profile for user {}", user_id);
        self.profile_repo
            .create_for_user(user_id)
            .await
            .context("Failed to create profile")?;
        self.profile_repo
            .get_by_user(user_id)
            .await
            .context("Failed to get profile")?
            .ok_or(ProfileServiceError::NotFound(user_id))
    }

    /// Profile by primary key, together with its owner
    pub async fn get_with_user(&self, id: i64) -> Result<(Profile, User), ProfileServiceError> {
        let profile = self
            .profile_repo
            .get_by_id(id)
            .await
            .context("Failed to get profile")?
            .ok_or(ProfileServiceError::NotFound(id))?;
        let user = self
            .user_repo
            .get_by_id(profile.user_id)
            .await
            .context("Failed to get profile owner")?
            .ok_or(ProfileServiceError::NotFound(id))?;
        Ok((profile, user))
    }

    /// Check the editable profile fields and merge them into the user's
    /// profile. Nothing is written; the account update saves both.
    pub async fn prepare_update(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
    ) -> Result<Profile, ProfileServiceError> {
        for (field, value) in [("bio", &input.bio), ("location", &input.location)] {
            if value.chars().count() > MAX_PROFILE_TEXT_LENGTH {
                return Err(ProfileServiceError::ValidationError(format!(
                    "{} cannot exceed {} characters",
                    field, MAX_PROFILE_TEXT_LENGTH
                )));
            }
        }

        let current = self.get_or_create(user_id).await?;
        Ok(Profile {
            bio: input.bio.trim().to_string(),
            location: input.location.trim().to_string(),
            birth_date: input.birth_date,
            avatar: input
                .avatar
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            website: input.website.trim().to_string(),
            ..current
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxProfileRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use chrono::NaiveDate;

    async fn setup() -> (DynDatabasePool, ProfileService, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES ('ada', 'ada@example.com', 'h')",
        )
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap()
        .last_insert_rowid();
        let service = ProfileService::new(
            SqlxProfileRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
        );
        (pool, service, user_id)
    }

    #[tokio::test]
    async fn test_get_or_create_backfills_missing_profile() {
        let (pool, service, user_id) = setup().await;
        let profile = service.get_or_create(user_id).await.unwrap();
        let again = service.get_or_create(user_id).await.unwrap();
        assert_eq!(profile.id, again.id);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_prepare_update_merges_without_writing() {
        let (_pool, service, user_id) = setup().await;
        let input = UpdateProfileInput {
            bio: " Mathematician ".to_string(),
            location: "London".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1815, 12, 10),
            avatar: Some("   ".to_string()),
            website: "https://example.com".to_string(),
        };
        let prepared = service.prepare_update(user_id, input).await.unwrap();
        assert_eq!(prepared.bio, "Mathematician");
        assert_eq!(prepared.avatar, None);
        assert_eq!(prepared.user_id, user_id);

        let (stored, user) = service.get_with_user(prepared.id).await.unwrap();
        assert_eq!(stored.bio, "");
        assert_eq!(user.username, "ada");
    }

    #[tokio::test]
    async fn test_update_rejects_long_bio() {
        let (_pool, service, user_id) = setup().await;
        let input = UpdateProfileInput {
            bio: "x".repeat(501),
            ..Default::default()
        };
        assert!(matches!(
            service.prepare_update(user_id, input).await,
            Err(ProfileServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_profile_is_not_found() {
        let (_pool, service, _user_id) = setup().await;
        assert!(matches!(
            service.get_with_user(42).await,
            Err(ProfileServiceError::NotFound(42))
        ));
    }
}
