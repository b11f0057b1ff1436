//! Admin management of accounts and roles.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::validation;
use crate::auth;
use crate::db::{CreateRoleRequest, CreateUserRequest, Role, UpdateUserRequest, User, UserResponse};
use crate::AppState;

pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY first_name, last_name")
        .fetch_all(&state.db)
        .await?;

    let mut responses = Vec::with_capacity(users.len());
    for user in users {
        let roles = auth::load_role_names(&state.db, &user.id).await?;
        responses.push(UserResponse::from_user(user, roles.into_iter().collect()));
    }
    Ok(Json(responses))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;
    let roles = auth::load_role_names(&state.db, &user.id).await?;
    Ok(Json(UserResponse::from_user(user, roles.into_iter().collect())))
}

/// Create an account. Admin-created accounts are active immediately;
/// accounts without a password cannot use the password login flow.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("email", validation::validate_email(&request.email));
    errors.check(
        "first_name",
        validation::validate_required(&request.first_name, "Förnamn"),
    );
    if let Some(password) = &request.password {
        errors.check("password", validation::validate_password(password));
    }
    errors.finish()?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("E-postadressen används redan"));
    }

    let password_hash = match &request.password {
        Some(password) => Some(
            auth::hash_password(password)
                .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?,
        ),
        None => None,
    };

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, first_name, last_name, active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(&id)
    .bind(&request.email)
    .bind(&password_hash)
    .bind(&request.first_name)
    .bind(&request.last_name)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    for role_name in &request.roles {
        grant_role_by_name(&state.db, &id, role_name).await?;
    }

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    let roles = auth::load_role_names(&state.db, &id).await?;
    tracing::info!(email = %user.email, "User created by admin");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse::from_user(user, roles.into_iter().collect())),
    ))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("User not found"))?;

    sqlx::query(
        "UPDATE users SET first_name = ?, last_name = ?, active = ?, updated_at = ? WHERE id = ?",
    )
    .bind(request.first_name.unwrap_or(existing.first_name))
    .bind(request.last_name.unwrap_or(existing.last_name))
    .bind(request.active.unwrap_or(existing.active))
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    // Deactivation also revokes live sessions
    if request.active == Some(false) {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(&id)
            .execute(&state.db)
            .await?;
    }

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    let roles = auth::load_role_names(&state.db, &id).await?;
    Ok(Json(UserResponse::from_user(user, roles.into_iter().collect())))
}

async fn grant_role_by_name(
    pool: &sqlx::SqlitePool,
    user_id: &str,
    role_name: &str,
) -> Result<(), ApiError> {
    let role: Option<Role> = sqlx::query_as("SELECT * FROM roles WHERE name = ?")
        .bind(role_name)
        .fetch_optional(pool)
        .await?;
    let role = role.ok_or_else(|| ApiError::not_found(format!("Role '{}' not found", role_name)))?;

    sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(&role.id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn grant_role(
    State(state): State<Arc<AppState>>,
    Path((id, role_name)): Path<(String, String)>,
) -> Result<Json<UserResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;

    grant_role_by_name(&state.db, &id, &role_name).await?;
    tracing::info!(email = %user.email, role = %role_name, "Role granted");

    let roles = auth::load_role_names(&state.db, &id).await?;
    Ok(Json(UserResponse::from_user(user, roles.into_iter().collect())))
}

pub async fn revoke_role(
    State(state): State<Arc<AppState>>,
    Path((id, role_name)): Path<(String, String)>,
) -> Result<Json<UserResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;

    sqlx::query(
        "DELETE FROM user_roles WHERE user_id = ? \
         AND role_id IN (SELECT id FROM roles WHERE name = ?)",
    )
    .bind(&id)
    .bind(&role_name)
    .execute(&state.db)
    .await?;
    tracing::info!(email = %user.email, role = %role_name, "Role revoked");

    let roles = auth::load_role_names(&state.db, &id).await?;
    Ok(Json(UserResponse::from_user(user, roles.into_iter().collect())))
}

pub async fn list_roles(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Role>>, ApiError> {
    let roles: Vec<Role> = sqlx::query_as("SELECT * FROM roles ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(roles))
}

pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::validation_field("name", "Rollnamn krävs"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO roles (id, name, description) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(&request.name)
        .bind(&request.description)
        .execute(&state.db)
        .await?;

    let role: Role = sqlx::query_as("SELECT * FROM roles WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    tracing::info!(role = %role.name, "Role created");
    Ok((StatusCode::CREATED, Json(role)))
}

/// Delete a role. Refused while any account still holds it, so a role
/// can never disappear out from under its members. The membership check
/// and the delete are one conditional statement, the same pattern as a
/// confirmation-code redeem, so a concurrent grant cannot slip between
/// them.
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query(
        "DELETE FROM roles WHERE id = ? \
         AND NOT EXISTS (SELECT 1 FROM user_roles WHERE role_id = ?)",
    )
    .bind(&id)
    .bind(&id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM roles WHERE id = ?")
            .bind(&id)
            .fetch_optional(&state.db)
            .await?;
        return Err(match exists {
            Some(_) => ApiError::conflict(
                "Rollen kan inte tas bort medan den fortfarande är tilldelad användare",
            ),
            None => ApiError::not_found("Role not found"),
        });
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::config::Config;
    use axum::extract::{Path, State};

    async fn test_state() -> Arc<AppState> {
        let pool = crate::db::init_in_memory().await.unwrap();
        crate::db::seed_roles_and_admin(&pool, "admin@example.se", "pw12345678901")
            .await
            .unwrap();
        let config = Config::load(std::path::Path::new("/nonexistent/skolportal.toml")).unwrap();
        Arc::new(crate::AppState::new(config, pool).unwrap())
    }

    #[tokio::test]
    async fn role_with_members_cannot_be_deleted() {
        let state = test_state().await;

        let (_, Json(role)) = create_role(
            State(state.clone()),
            Json(CreateRoleRequest {
                name: "choir_leader".to_string(),
                description: None,
            }),
        )
        .await
        .unwrap();

        let (user_id,): (String,) = sqlx::query_as("SELECT id FROM users LIMIT 1")
            .fetch_one(&state.db)
            .await
            .unwrap();
        grant_role(
            State(state.clone()),
            Path((user_id.clone(), "choir_leader".to_string())),
        )
        .await
        .unwrap();

        let err = delete_role(State(state.clone()), Path(role.id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);

        // The role survives the refused delete
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM roles WHERE id = ?")
            .bind(&role.id)
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count, 1);

        // Once the grant is revoked the delete goes through
        revoke_role(
            State(state.clone()),
            Path((user_id, "choir_leader".to_string())),
        )
        .await
        .unwrap();
        let status = delete_role(State(state), Path(role.id)).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn deleting_unknown_role_is_not_found() {
        let state = test_state().await;
        let err = delete_role(State(state), Path("missing-role-id".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
