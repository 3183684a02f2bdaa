//! In-memory user directory backend using DashMap.
//!
//! Accounts are lost on restart. Used in development and tests, and whenever
//! no database URL is configured.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{DirectoryError, User, UserDirectory};

pub struct MemoryUserDirectory {
    /// user id -> account
    users: DashMap<String, User>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }
}

impl Default for MemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn create(&self, user: User) -> Result<(), DirectoryError> {
        if self.users.iter().any(|u| u.email == user.email) {
            return Err(DirectoryError::Duplicate("email"));
        }
        if self.users.iter().any(|u| u.username == user.username) {
            return Err(DirectoryError::Duplicate("username"));
        }

        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.clone()))
    }
}
