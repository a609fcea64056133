use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::{ApiError, User};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AuthError::Validation("All fields are required".to_string()));
        }
        if !self.email.contains('@') {
            return Err(AuthError::Validation(format!("'{}' is not an email address", self.email)));
        }
        Ok(())
    }
}

/// `user` object of the login response; the token rides inside it.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginUser {
    #[serde(flatten)]
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub status: Option<String>,
    pub user: LoginUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}
