//! Login, registration, email verification and password reset handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::validation;
use crate::auth::{self, SESSION_COOKIE};
use crate::confirm;
use crate::db::{CodePurpose, LoginRequest, LoginResponse, RegisterRequest, User, UserResponse};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PrincipalResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
}

/// Who am I: the current session's principal.
pub async fn me(principal: crate::auth::Principal) -> Json<PrincipalResponse> {
    let mut roles: Vec<String> = principal.roles.into_iter().collect();
    roles.sort();
    Json(PrincipalResponse {
        user_id: principal.user_id,
        email: principal.email,
        name: principal.name,
        roles,
    })
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Fel e-postadress eller lösenord"))?;

    // Accounts without a password hash cannot authenticate this way
    let Some(hash) = user.password_hash.as_deref() else {
        return Err(ApiError::unauthorized("Fel e-postadress eller lösenord"));
    };
    if !auth::verify_password(&request.password, hash) {
        return Err(ApiError::unauthorized("Fel e-postadress eller lösenord"));
    }
    if !user.active {
        return Err(ApiError::forbidden(
            "Kontot är inte aktiverat. Kontrollera din e-post.",
        ));
    }

    let lifetime = if request.remember_me {
        state.config.auth.remember_me_days
    } else {
        state.config.auth.session_days
    };
    let token = auth::create_session(&state.db, &user.id, lifetime).await?;
    let roles = auth::load_role_names(&state.db, &user.id).await?;

    tracing::info!(email = %user.email, "User logged in");

    let response = LoginResponse {
        user: UserResponse::from_user(user, roles.into_iter().collect()),
    };
    Ok((jar.add(session_cookie(token)), Json(response)))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    if let Some(token) = auth::session_token(&jar) {
        auth::destroy_session(&state.db, &token).await?;
    }
    let jar = jar.remove(Cookie::from(SESSION_COOKIE));
    Ok((jar, MessageResponse::new("Du är utloggad")))
}

/// Self-service registration. The account starts inactive; activation
/// happens through the emailed confirmation code.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("email", validation::validate_email(&request.email));
    errors.check("password", validation::validate_password(&request.password));
    errors.check(
        "first_name",
        validation::validate_required(&request.first_name, "Förnamn"),
    );
    errors.check(
        "last_name",
        validation::validate_required(&request.last_name, "Efternamn"),
    );
    errors.finish()?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("E-postadressen används redan"));
    }

    let password_hash = auth::hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, first_name, last_name, active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&request.email)
    .bind(&password_hash)
    .bind(&request.first_name)
    .bind(&request.last_name)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let code = confirm::issue(
        &state.db,
        &request.email,
        CodePurpose::UserRegistration,
        confirm::DEFAULT_TTL_HOURS,
    )
    .await?;

    let verify_url = format!(
        "{}/api/auth/verify-email?email={}&code={}",
        state.config.server.public_url, request.email, code.code
    );
    let mailer = state.mailer.clone();
    let email = request.email.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer
            .send_verification_email(&email, &code.code, &verify_url)
            .await
        {
            tracing::error!(error = %e, "Failed to send verification email to {}", email);
        }
    });

    tracing::info!(email = %request.email, "User registered, verification pending");
    Ok((
        StatusCode::CREATED,
        MessageResponse::new("Konto skapat. Kontrollera din e-post för att aktivera det."),
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailParams {
    pub email: String,
    pub code: String,
}

/// Redeem a verification code and activate the account. The emailed
/// link (GET) and manual form entry (POST) route here identically.
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyEmailParams>,
) -> Result<Json<MessageResponse>, ApiError> {
    verify_email_inner(&state, params).await
}

pub async fn verify_email_form(
    State(state): State<Arc<AppState>>,
    Json(params): Json<VerifyEmailParams>,
) -> Result<Json<MessageResponse>, ApiError> {
    verify_email_inner(&state, params).await
}

async fn verify_email_inner(
    state: &AppState,
    params: VerifyEmailParams,
) -> Result<Json<MessageResponse>, ApiError> {
    // Registration codes and plain re-verification codes both activate
    // the account; purposes stay isolated in the ledger.
    let redeemed = match confirm::redeem(
        &state.db,
        &params.email,
        &params.code,
        CodePurpose::UserRegistration,
    )
    .await?
    {
        Some(record) => Some(record),
        None => {
            confirm::redeem(
                &state.db,
                &params.email,
                &params.code,
                CodePurpose::EmailVerification,
            )
            .await?
        }
    };

    if redeemed.is_none() {
        return Err(ApiError::bad_request(
            "Ogiltig eller utgången bekräftelsekod",
        ));
    }

    sqlx::query("UPDATE users SET active = 1, updated_at = ? WHERE email = ?")
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&params.email)
        .execute(&state.db)
        .await?;

    tracing::info!(email = %params.email, "Email verified, account activated");
    Ok(MessageResponse::new("E-postadressen är bekräftad"))
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Issue a password-reset code. Responds identically whether or not the
/// account exists.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    if user.is_some() {
        let code = confirm::issue(
            &state.db,
            &request.email,
            CodePurpose::PasswordReset,
            confirm::DEFAULT_TTL_HOURS,
        )
        .await?;

        let reset_url = format!(
            "{}/reset-password?email={}&code={}",
            state.config.server.public_url, request.email, code.code
        );
        let mailer = state.mailer.clone();
        let email = request.email.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_password_reset_email(&email, &code.code, &reset_url)
                .await
            {
                tracing::error!(error = %e, "Failed to send password reset email to {}", email);
            }
        });
    } else {
        tracing::info!(email = %request.email, "Password reset requested for unknown email");
    }

    Ok(MessageResponse::new(
        "Om kontot finns har ett e-postmeddelande skickats",
    ))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(message) = validation::validate_password(&request.new_password) {
        return Err(ApiError::validation_field("new_password", message));
    }

    let redeemed = confirm::redeem(
        &state.db,
        &request.email,
        &request.code,
        CodePurpose::PasswordReset,
    )
    .await?;
    if redeemed.is_none() {
        return Err(ApiError::bad_request(
            "Ogiltig eller utgången bekräftelsekod",
        ));
    }

    let password_hash = auth::hash_password(&request.new_password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE email = ?")
        .bind(&password_hash)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&request.email)
        .execute(&state.db)
        .await?;

    // Invalidate existing sessions for the account
    sqlx::query("DELETE FROM sessions WHERE user_id IN (SELECT id FROM users WHERE email = ?)")
        .bind(&request.email)
        .execute(&state.db)
        .await?;

    tracing::info!(email = %request.email, "Password reset completed");
    Ok(MessageResponse::new("Lösenordet är uppdaterat"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::config::Config;
    use axum::extract::State;

    async fn test_state() -> Arc<AppState> {
        let pool = crate::db::init_in_memory().await.unwrap();
        let config = Config::load(std::path::Path::new("/nonexistent/skolportal.toml")).unwrap();
        Arc::new(AppState::new(config, pool).unwrap())
    }

    #[tokio::test]
    async fn login_rejects_account_without_password_hash() {
        let state = test_state().await;
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, active, created_at, updated_at) \
             VALUES (?, ?, NULL, 'Extern', 'Konto', 1, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind("extern@example.se")
        .bind(&now)
        .bind(&now)
        .execute(&state.db)
        .await
        .unwrap();

        // Active account, but no password hash: any password is refused
        let err = login(
            State(state),
            CookieJar::new(),
            Json(LoginRequest {
                email: "extern@example.se".to_string(),
                password: "whatever12345".to_string(),
                remember_me: false,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let state = test_state().await;
        crate::db::seed_roles_and_admin(&state.db, "admin@example.se", "correct-password-1")
            .await
            .unwrap();

        let err = login(
            State(state),
            CookieJar::new(),
            Json(LoginRequest {
                email: "admin@example.se".to_string(),
                password: "wrong-password-1".to_string(),
                remember_me: false,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }
}
