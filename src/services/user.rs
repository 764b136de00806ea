//! User service
//!
//! Registration (the first account becomes admin), login and logout,
//! session validation and account updates.

use crate::db::repositories::{ProfileRepository, SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Profile, Session, UpdateAccountInput, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use std::sync::Arc;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Invalid input
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username or email already in use; `field` names which one
    #[error("{message}")]
    UserExists { field: &'static str, message: String },

    #[error("Session expired")]
    SessionExpired,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            profile_repo,
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
        }
    }

    /// Override how long new sessions last
    pub fn with_session_expiration(mut self, days: i64) -> Self {
        self.session_expiration_days = days;
        self
    }

    /// Register a new user and create their profile.
    ///
    /// The first account in an empty database becomes admin. A duplicate
    /// username or email is rejected before anything is written.
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        if username.is_empty() || email.is_empty() || input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username, email and password are required".to_string(),
            ));
        }

        self.ensure_available(&username, &email, None).await?;

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Author
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(username, email, String::new(), String::new(), password_hash, role);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;
        self.profile_repo
            .create_for_user(created.id)
            .await
            .context("Failed to create profile")?;

        tracing::info!("Registered user '{}' as {}", created.username, created.role);
        Ok(created)
    }

    /// Check credentials and open a new session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, UserServiceError> {
        let invalid = || {
            UserServiceError::AuthenticationError(
                "Please enter a correct username and password.".to_string(),
            )
        };

        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to look up user")?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash).context("Failed to verify password")? {
            tracing::warn!("Failed login for '{}'", username);
            return Err(invalid());
        }

        let session = Session::new(user.id, self.session_expiration_days);
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        tracing::info!("User '{}' logged in", user.username);
        Ok(session)
    }

    /// End a session
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user. Expired sessions are removed.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user")?)
    }

    /// Update username, email and names, saving `profile` in the same
    /// transaction. The new username and email must not belong to another
    /// account.
    pub async fn update_account(
        &self,
        user: &User,
        input: UpdateAccountInput,
        profile: &Profile,
    ) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        if username.is_empty() || email.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username and email are required".to_string(),
            ));
        }

        self.ensure_available(&username, &email, Some(user.id)).await?;

        let updated = User {
            username,
            email,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            ..user.clone()
        };
        Ok(self
            .user_repo
            .update_with_profile(&updated, profile)
            .await
            .context("Failed to update account")?)
    }

    /// Check if this is the first user (for auto-admin)
    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Purge expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    async fn ensure_available(
        &self,
        username: &str,
        email: &str,
        except_id: Option<i64>,
    ) -> Result<(), UserServiceError> {
        let taken_by_other = |found: Option<User>| found.is_some_and(|u| Some(u.id) != except_id);

        let by_username = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?;
        if taken_by_other(by_username) {
            return Err(UserServiceError::UserExists {
                field: "username",
                message: "A user with that username already exists.".to_string(),
            });
        }

        let by_email = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?;
        if taken_by_other(by_email) {
            return Err(UserServiceError::UserExists {
                field: "email",
                message: "A user with that email already exists.".to_string(),
            });
        }
        Ok(())
    }
}
