use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::forms::{FormErrors, REQUIRED};
use crate::error::AppError;

/// A registered author.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Validated input for inserting a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub csrf_token: String,
}

pub const MIN_PASSWORD_LENGTH: usize = 8;

impl User {
    /// Uses argon2 to verify the password hash against the provided password.
    pub fn verify_password(&self, password: &str) -> bool {
        let hash = match PasswordHash::new(&self.password_hash) {
            Ok(hash) => hash,
            Err(err) => {
                tracing::error!("failed to parse password hash for {}: {}", self.username, err);
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok()
    }

    /// Generates a new password hash using argon2.
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to hash password: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Usernames appear in profile URLs, so only URL-safe characters are allowed.
    pub fn validate_username(username: &str) -> Result<(), &'static str> {
        if username.is_empty() {
            return Err(REQUIRED);
        }

        if username.len() > 150 {
            return Err("Ensure this value has at most 150 characters.");
        }

        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c))
        {
            return Err("Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.");
        }

        Ok(())
    }
}

impl SignupForm {
    /// Checks the submission and returns the trimmed username and email.
    pub fn validate(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::new();

        let username = self.username.trim().to_string();
        if let Err(message) = User::validate_username(&username) {
            errors.add("username", message);
        }

        let email = self.email.trim().to_lowercase();
        if !email.is_empty() && !is_valid_email(&email) {
            errors.add("email", "Enter a valid email address.");
        }

        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        } else if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add(
                "password",
                format!("This password is too short. It must contain at least {} characters.", MIN_PASSWORD_LENGTH),
            );
        }

        if self.password != self.password_confirm {
            errors.add("password_confirm", "The two password fields didn't match.");
        }

        errors.into_result((username, email))
    }
}

/// Minimal shape check: one `@`, something before it, a dotted domain after it.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || local.len() > 64 || domain.is_empty() || domain.len() > 253 {
        return false;
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }

    local.chars().all(|c| c.is_alphanumeric() || ".-_+".contains(c))
        && domain.chars().all(|c| c.is_alphanumeric() || ".-".contains(c))
}
