//! Account registration, login, and current-user endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, verify_password, Claims};
use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::users::{PublicUser, User};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: PublicUser,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>> {
    let username = req.username.trim();
    let email = req.email.trim();

    if username.is_empty() {
        return Err(AppError::Validation("Username cannot be empty".to_string()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    if req.password.is_empty() {
        return Err(AppError::Validation("Password cannot be empty".to_string()));
    }

    if state.user_directory.find_by_email(email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }
    if state
        .user_directory
        .find_by_username(username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let user = User::new(username.to_string(), email.to_string(), password_hash);
    state.user_directory.create(user.clone()).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    let access_token = state.jwt.issue(&user.id)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: user.public(),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    // One error for both unknown email and bad password
    let invalid = || AppError::Auth("Incorrect email or password".to_string());

    let user = state
        .user_directory
        .find_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(invalid());
    }

    tracing::info!(user_id = %user.id, "User logged in");

    let access_token = state.jwt.issue(&user.id)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: user.public(),
    }))
}

pub async fn me(State(state): State<AppState>, claims: Claims) -> Result<Json<PublicUser>> {
    let user = state
        .user_directory
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Auth("Could not validate credentials".to_string()))?;

    Ok(Json(user.public()))
}
