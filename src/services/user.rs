//! User service
//!
//! Registration (the first account becomes the administrator), login and
//! logout backed by database sessions, profile editing and the admin user
//! list.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{
    ListParams, PagedResult, Session, UpdateProfileInput, User, UserRole, MAX_USERNAME_LENGTH,
};
use crate::services::password::{hash_password, password_problem, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Default session lifetime in days
pub const DEFAULT_SESSION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_days(user_repo, session_repo, DEFAULT_SESSION_DAYS)
    }

    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days,
        }
    }

    /// Register a new user; the first one becomes admin
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        validate_username(&username)?;
        validate_email(&email)?;
        if let Some(problem) = password_problem(&input.password, &username) {
            return Err(UserServiceError::ValidationError(problem));
        }

        if self.username_taken(&username, None).await? {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Author
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let now = Utc::now();
        let user = User {
            id: 0,
            username,
            email,
            first_name: String::new(),
            last_name: String::new(),
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!("Registered user '{}' as {}", created.username, created.role);
        Ok(created)
    }

    /// Check credentials and open a session
    pub async fn login(&self, input: LoginInput) -> Result<(User, Session), UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .user_repo
            .get_by_username(input.username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or_else(invalid)?;

        let valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            tracing::debug!("Failed login for '{}'", user.username);
            return Err(invalid());
        }

        let session = Session::new(user.id, Duration::days(self.session_days));
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok((user, session))
    }

    /// Close a session; unknown tokens are ignored
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// The user behind a session token, if the session is still valid.
    ///
    /// Expired sessions are deleted on the way.
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
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
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
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?
            .ok_or_else(|| UserServiceError::NotFound(username.to_string()))
    }

    /// Change the user's own username, names and email
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(user_id.to_string()))?;

        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        validate_username(&username)?;
        validate_email(&email)?;

        if username != user.username && self.username_taken(&username, Some(user.id)).await? {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        user.username = username;
        user.email = email;
        user.first_name = input.first_name.trim().to_string();
        user.last_name = input.last_name.trim().to_string();
        user.updated_at = Utc::now();

        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;
        Ok(updated)
    }

    pub async fn list_users(&self, params: &ListParams) -> Result<PagedResult<User>, UserServiceError> {
        let users = self.user_repo.list(params).await.context("Failed to list users")?;
        Ok(users)
    }

    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Delete expired sessions; returns how many went
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    async fn username_taken(
        &self,
        username: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, UserServiceError> {
        let existing = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?;
        Ok(existing.is_some_and(|u| Some(u.id) != exclude_id))
    }
}

/// Letters, digits and `@ . + - _`, up to 150 characters
fn validate_username(username: &str) -> Result<(), UserServiceError> {
    if username.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Username cannot be empty".to_string(),
        ));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(UserServiceError::ValidationError(format!(
            "Username cannot exceed {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(UserServiceError::ValidationError(
            "Username may contain only letters, digits and @/./+/-/_".to_string(),
        ));
    }
    Ok(())
}

/// Email is optional; when given it needs an `@` between two non-empty parts
fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if email.is_empty() {
        return Ok(());
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        )),
    }
}
