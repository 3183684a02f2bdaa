//! User Directory: account records and public profile lookup.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryUserDirectory;
pub use postgres::PostgresUserDirectory;

/// A stored user account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub premium_until: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            role: "user".to_string(),
            avatar: None,
            created_at: Utc::now(),
            premium_until: None,
        }
    }

    /// Projection safe to return to clients (no password hash).
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            avatar: self.avatar.clone(),
            created_at: self.created_at,
            premium_until: self.premium_until,
        }
    }

    /// Display fields used to enrich chat messages.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            username: self.username.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub premium_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<DirectoryError> for crate::error::AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Duplicate("email") => {
                crate::error::AppError::Conflict("Email already registered".to_string())
            }
            DirectoryError::Duplicate(_) => {
                crate::error::AppError::Conflict("Username already taken".to_string())
            }
            DirectoryError::Database(e) => crate::error::AppError::Database(e),
        }
    }
}

/// Lookup and storage of user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn create(&self, user: User) -> Result<(), DirectoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, DirectoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError>;

    /// Resolve the current public profile of a user, if the user still exists.
    async fn lookup_profile(&self, id: &str) -> Result<Option<UserProfile>, DirectoryError> {
        Ok(self.find_by_id(id).await?.map(|u| u.profile()))
    }
}

/// Create a user directory backend from configuration.
///
/// With a PostgreSQL pool the directory is persistent; without one an
/// in-memory directory is used (development and tests).
pub fn create_user_directory(pool: Option<PgPool>) -> Arc<dyn UserDirectory> {
    match pool {
        Some(pool) => {
            tracing::info!("Using PostgreSQL user directory");
            Arc::new(PostgresUserDirectory::new(pool))
        }
        None => {
            tracing::info!("Using in-memory user directory");
            Arc::new(MemoryUserDirectory::new())
        }
    }
}
