//! Authentication primitives: password hashing, session tokens and the
//! request principal.
//!
//! Authorization decisions live in [`guard`]; HTTP handlers for login,
//! registration and password reset live in `api::auth`.

pub mod guard;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use axum_extra::extract::CookieJar;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

use crate::db::{Session, User};
use crate::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "skolportal_session";

/// Name of the transient flash-message cookie set on authorization failures.
pub const FLASH_COOKIE: &str = "skolportal_flash";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random session token
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// The authenticated identity attached to a request.
///
/// Role names are re-read from the store on every request, so a revoked
/// role stops working on the next request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub active: bool,
    pub roles: HashSet<String>,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| self.roles.contains(r.as_ref()))
    }
}

/// Create a session for a user and return the bearer token to place in
/// the session cookie. Only the SHA-256 hash is stored.
pub async fn create_session(
    pool: &sqlx::SqlitePool,
    user_id: &str,
    lifetime_days: i64,
) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::days(lifetime_days)).to_rfc3339();

    sqlx::query("INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&token_hash)
        .bind(&expires_at)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;

    Ok(token)
}

/// Delete the session matching a token. Used by logout.
pub async fn destroy_session(pool: &sqlx::SqlitePool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(())
}

/// Resolve a session token to a Principal, or None if the token is
/// unknown, expired, or belongs to a missing account.
pub async fn resolve_principal(
    pool: &sqlx::SqlitePool,
    token: &str,
) -> Result<Option<Principal>, sqlx::Error> {
    let token_hash = hash_token(token);
    let now = chrono::Utc::now().to_rfc3339();

    let session: Option<Session> =
        sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ? AND expires_at > ?")
            .bind(&token_hash)
            .bind(&now)
            .fetch_optional(pool)
            .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&session.user_id)
        .fetch_optional(pool)
        .await?;

    let Some(user) = user else {
        return Ok(None);
    };

    let roles = load_role_names(pool, &user.id).await?;

    Ok(Some(Principal {
        name: format!("{} {}", user.first_name, user.last_name),
        user_id: user.id,
        email: user.email,
        active: user.active,
        roles,
    }))
}

/// Role names held by a user.
pub async fn load_role_names(
    pool: &sqlx::SqlitePool,
    user_id: &str,
) -> Result<HashSet<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT r.name FROM roles r \
         JOIN user_roles ur ON ur.role_id = r.id \
         WHERE ur.user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Extract the session token from the cookie jar.
pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

/// Extractor for the current authenticated, active principal.
///
/// Rejects with 401 when there is no valid session. Role gating is done
/// separately by the guard middleware.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Principal {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = session_token(&jar).ok_or(StatusCode::UNAUTHORIZED)?;

        let principal = resolve_principal(&state.db, &token)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        if !principal.active {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn tokens_are_unique_and_hashed() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(hash_token(&a), a);
    }

    #[tokio::test]
    async fn session_round_trip() {
        let pool = crate::db::init_in_memory().await.unwrap();
        crate::db::seed_roles_and_admin(&pool, "admin@example.se", "pw12345678901")
            .await
            .unwrap();

        let (user_id,): (String,) = sqlx::query_as("SELECT id FROM users LIMIT 1")
            .fetch_one(&pool)
            .await
            .unwrap();

        let token = create_session(&pool, &user_id, 7).await.unwrap();
        let principal = resolve_principal(&pool, &token).await.unwrap().unwrap();
        assert_eq!(principal.user_id, user_id);
        assert!(principal.has_role("Admin"));

        destroy_session(&pool, &token).await.unwrap();
        assert!(resolve_principal(&pool, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let pool = crate::db::init_in_memory().await.unwrap();
        crate::db::seed_roles_and_admin(&pool, "admin@example.se", "pw12345678901")
            .await
            .unwrap();
        let (user_id,): (String,) = sqlx::query_as("SELECT id FROM users LIMIT 1")
            .fetch_one(&pool)
            .await
            .unwrap();

        let token = create_session(&pool, &user_id, -1).await.unwrap();
        assert!(resolve_principal(&pool, &token).await.unwrap().is_none());
    }
}
