//! PostgreSQL user directory backend.
//!
//! Table structure:
//! - `users` (id TEXT PK, username TEXT UNIQUE, email TEXT UNIQUE,
//!   password_hash TEXT, role TEXT, avatar TEXT NULL,
//!   created_at TIMESTAMPTZ, premium_until TIMESTAMPTZ NULL)

use async_trait::async_trait;
use sqlx::PgPool;

use super::{DirectoryError, User, UserDirectory};

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn create(&self, user: User) -> Result<(), DirectoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, avatar, created_at, premium_until)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(&user.avatar)
        .bind(user.created_at)
        .bind(user.premium_until)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                // Constraint name distinguishes which field collided
                let field = if e.constraint().is_some_and(|c| c.contains("email")) {
                    "email"
                } else {
                    "username"
                };
                Err(DirectoryError::Duplicate(field))
            }
            Err(e) => Err(DirectoryError::Database(e)),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, DirectoryError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }
}
