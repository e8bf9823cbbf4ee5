//! Local account creation for identities verified by the identity API.
//!
//! Usernames are the remote login (an email address), so they may contain
//! `@`, `.` and similar characters; only their length is constrained.

use argon2::{Argon2, PasswordHasher};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{NewAccount, Registration, User, UserProfile};

pub const USERNAME_MIN_LENGTH: usize = 2;
pub const USERNAME_MAX_LENGTH: usize = 30;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Username too short")]
    UsernameTooShort,

    #[error("Username cannot be more than {0} characters long")]
    UsernameTooLong(usize),

    #[error("A valid password is required")]
    PasswordRequired,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Database(e) => AppError::Database(e),
            AccountError::Hash(_) => AppError::InternalServerError,
            validation => AppError::BadRequest(validation.to_string()),
        }
    }
}

/// Input of [`create_account`].
#[derive(Debug, Clone)]
pub struct AccountRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub is_active: bool,
}

pub fn validate_username(username: &str) -> Result<(), AccountError> {
    let length = username.chars().count();
    if length < USERNAME_MIN_LENGTH {
        return Err(AccountError::UsernameTooShort);
    }
    if length > USERNAME_MAX_LENGTH {
        return Err(AccountError::UsernameTooLong(USERNAME_MAX_LENGTH));
    }
    Ok(())
}

/// Hash a password using argon2.
pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = argon2::password_hash::SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::Hash(e.to_string()))
}

/// Create the user, its profile and registration; activate it when requested.
pub async fn create_account(
    db: &SqlitePool,
    request: AccountRequest<'_>,
) -> Result<(User, UserProfile, Registration), AccountError> {
    validate_username(request.username)?;
    if request.password.is_empty() {
        return Err(AccountError::PasswordRequired);
    }

    let account = NewAccount {
        username: request.username.to_string(),
        email: request.username.to_string(),
        password_hash: hash_password(request.password)?,
        first_name: request.first_name.to_string(),
        last_name: request.last_name.to_string(),
        name: format!("{} {}", request.first_name, request.last_name),
    };

    let (mut user, profile, mut registration) = repository::create_account(db, account).await?;
    info!("created local account {} (id {})", user.username, user.id);

    if request.is_active && repository::activate_registration(db, user.id).await? {
        user.is_active = true;
        registration = repository::find_registration(db, user.id)
            .await?
            .unwrap_or(registration);
    }

    Ok((user, profile, registration))
}
