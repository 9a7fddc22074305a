use serde::{Deserialize, Serialize};

use crate::auth::is_valid_email;
use crate::error::ApiError;

/// Request body for registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for email verification.
#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public part of the user returned to clients.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_verified: bool,
}

impl From<crate::users::repo::User> for PublicUser {
    fn from(u: crate::users::repo::User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            is_verified: u.is_verified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.username.len() < 3 || self.username.len() > 255 {
            return Err(ApiError::Validation(
                "username must be between 3 and 255 characters".into(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(ApiError::Validation("email must be a valid address".into()));
        }
        if self.password.len() < 6 {
            return Err(ApiError::Validation(
                "password must be at least 6 characters".into(),
            ));
        }
        Ok(())
    }
}

impl VerifyEmailRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !is_valid_email(&self.email) {
            return Err(ApiError::Validation("email must be a valid address".into()));
        }
        if self.code.len() != 6 || !self.code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::Validation("code must be a 6-digit number".into()));
        }
        Ok(())
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !is_valid_email(&self.email) {
            return Err(ApiError::Validation("email must be a valid address".into()));
        }
        if self.password.is_empty() {
            return Err(ApiError::Validation("password is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn register_accepts_valid_payload() {
        assert!(register("alice", "a@b.com", "secret1").validate().is_ok());
    }

    #[test]
    fn register_rejects_short_username() {
        assert!(register("al", "a@b.com", "secret1").validate().is_err());
    }

    #[test]
    fn register_rejects_bad_email() {
        assert!(register("alice", "not-an-email", "secret1").validate().is_err());
    }

    #[test]
    fn register_rejects_short_password() {
        assert!(register("alice", "a@b.com", "short").validate().is_err());
    }

    #[test]
    fn verify_email_rejects_non_numeric_code() {
        let req = VerifyEmailRequest {
            email: "a@b.com".into(),
            code: "12a456".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn verify_email_rejects_wrong_length_code() {
        let req = VerifyEmailRequest {
            email: "a@b.com".into(),
            code: "12345".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn verify_email_accepts_six_digit_code() {
        let req = VerifyEmailRequest {
            email: "a@b.com".into(),
            code: "123456".into(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn login_requires_password() {
        let req = LoginRequest {
            email: "a@b.com".into(),
            password: "".into(),
        };
        assert!(req.validate().is_err());
    }
}
