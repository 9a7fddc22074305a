use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{hash_password, verify_password, AuthUser, JwtKeys},
    error::ApiError,
    messages,
    state::AppState,
    users::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, PublicUser, RegisterRequest,
            RegisterResponse, VerifyEmailRequest,
        },
        repo::User,
    },
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/verify-email", post(verify_email))
        .route("/users/login", post(login))
        .route("/users/profile", get(profile))
}

/// Registration doubles as "resend code": a second attempt against the same
/// unverified email overwrites the row in place instead of creating another.
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.validate()?;

    let existing = User::find_by_email(&state.db, &payload.email).await?;
    if existing.as_ref().is_some_and(|u| u.is_verified) {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict(messages::EMAIL_ALREADY_EXISTS.into()));
    }

    let hash = hash_password(&payload.password)?;

    let user = match existing {
        Some(_) => {
            // A username collision with another row surfaces from the unique
            // constraint as a generic internal error, matching the original
            // behavior rather than adding a distinct conflict here.
            User::update_unverified(&state.db, &payload.email, &payload.username, &hash)
                .await?
                .ok_or_else(|| anyhow::anyhow!("unverified user vanished during registration"))?
        }
        None => {
            if User::find_by_username(&state.db, &payload.username)
                .await?
                .is_some()
            {
                warn!(username = %payload.username, "username already taken");
                return Err(ApiError::Conflict(messages::USERNAME_TAKEN.into()));
            }
            User::create(&state.db, &payload.username, &payload.email, &hash).await?
        }
    };

    // The user row stays committed even if delivery fails; a repeat
    // registration is the only resend path.
    let code = user
        .verification_code
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("unverified user has no verification code"))?;
    if let Err(e) = state.mailer.send_verification_code(&user.email, code).await {
        error!(error = %e, email = %user.email, "failed to send verification email");
        return Err(ApiError::Internal(anyhow::anyhow!(
            messages::EMAIL_SEND_FAILED
        )));
    }

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: messages::REGISTER_SUCCESS.into(),
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.validate()?;

    let verified = User::verify_email(&state.db, &payload.email, &payload.code).await?;
    if !verified {
        return Err(ApiError::BusinessRule(messages::VERIFY_EMAIL_FAILED.into()));
    }

    Ok(Json(MessageResponse {
        message: messages::VERIFY_EMAIL_SUCCESS.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.validate()?;

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthorized(messages::INVALID_CREDENTIALS.into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = user.id, "login invalid password");
        return Err(ApiError::Unauthorized(messages::INVALID_CREDENTIALS.into()));
    }

    if !user.is_verified {
        warn!(email = %payload.email, user_id = user.id, "unverified email login attempt");
        return Err(ApiError::Forbidden(messages::EMAIL_UNVERIFIED.into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id, "profile for unknown user");
            ApiError::NotFound(messages::USER_NOT_FOUND.into())
        })?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use crate::users::dto::PublicUser;

    #[test]
    fn public_user_serialization() {
        let user = PublicUser {
            id: 7,
            username: "alice".into(),
            email: "alice@example.com".into(),
            is_verified: true,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"id\":7"));
        assert!(json.contains("alice@example.com"));
        assert!(json.contains("\"is_verified\":true"));
    }
}
