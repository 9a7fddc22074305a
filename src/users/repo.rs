use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

/// Minutes a freshly issued verification code stays valid.
const VERIFICATION_TTL_MINUTES: i64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    #[serde(skip_serializing)]
    pub verification_expiry: Option<OffsetDateTime>,
    pub is_verified: bool,
    pub created_at: OffsetDateTime,
}

/// A 6-digit numeric code plus its expiry timestamp.
pub fn fresh_verification() -> (String, OffsetDateTime) {
    let code = rand::thread_rng().gen_range(100_000..1_000_000).to_string();
    let expiry = OffsetDateTime::now_utc() + Duration::minutes(VERIFICATION_TTL_MINUTES);
    (code, expiry)
}

impl User {
    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, verification_code,
                   verification_expiry, is_verified, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, verification_code,
                   verification_expiry, is_verified, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, verification_code,
                   verification_expiry, is_verified, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Insert a new unverified user with a fresh code and expiry.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let (code, expiry) = fresh_verification();
        info!(%email, "creating user");
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, verification_code, verification_expiry)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, password_hash, verification_code,
                      verification_expiry, is_verified, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(&code)
        .bind(expiry)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Re-registration against an unverified email: overwrite credentials and
    /// issue a new code in place rather than creating a duplicate row.
    pub async fn update_unverified(
        db: &PgPool,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let (code, expiry) = fresh_verification();
        info!(%email, "re-issuing verification code for unverified user");
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = $2, password_hash = $3, verification_code = $4, verification_expiry = $5
            WHERE email = $1 AND is_verified = FALSE
            RETURNING id, username, email, password_hash, verification_code,
                      verification_expiry, is_verified, created_at
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(&code)
        .bind(expiry)
        .fetch_optional(db)
        .await?;
        if user.is_none() {
            warn!(%email, "no unverified user found to update");
        }
        Ok(user)
    }

    /// Flip `is_verified` and clear the code in one conditional statement.
    /// Returns false for any mismatch: unknown email, wrong code, expired
    /// code, already verified. The reasons are deliberately indistinguishable.
    pub async fn verify_email(db: &PgPool, email: &str, code: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_verified = TRUE, verification_code = NULL, verification_expiry = NULL
            WHERE email = $1
              AND verification_code = $2
              AND verification_expiry > now()
              AND is_verified = FALSE
            "#,
        )
        .bind(email)
        .bind(code)
        .execute(db)
        .await?;

        let verified = result.rows_affected() > 0;
        if verified {
            info!(%email, "email verified");
        } else {
            warn!(%email, "invalid or expired verification code");
        }
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_verification_is_six_digits() {
        for _ in 0..100 {
            let (code, _) = fresh_verification();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert!(!code.starts_with('0'));
        }
    }

    #[test]
    fn fresh_verification_expiry_is_in_the_future() {
        let (_, expiry) = fresh_verification();
        let now = OffsetDateTime::now_utc();
        assert!(expiry > now + Duration::minutes(14));
        assert!(expiry <= now + Duration::minutes(15));
    }

    #[test]
    fn user_serialization_hides_secrets() {
        let user = User {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            verification_code: Some("123456".into()),
            verification_expiry: Some(OffsetDateTime::now_utc()),
            is_verified: false,
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("123456"));
        assert!(json.contains("alice@example.com"));
    }
}
