//! Contact form submission and admin inbox.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::validation;
use crate::db::{ContactMessage, SubmitContactRequest};
use crate::AppState;

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitContactRequest>,
) -> Result<(StatusCode, Json<ContactMessage>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validation::validate_required(&request.name, "Namn"));
    errors.check("email", validation::validate_email(&request.email));
    errors.check(
        "subject",
        validation::validate_required(&request.subject, "Ämne"),
    );
    errors.check(
        "subject",
        validation::validate_max_len(&request.subject, 200, "Ämne"),
    );
    errors.check(
        "message",
        validation::validate_required(&request.message, "Meddelande"),
    );
    errors.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO contact_messages (id, name, email, phone, subject, message, created_at, is_read) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
    )
    .bind(&id)
    .bind(&request.name)
    .bind(&request.email)
    .bind(&request.phone)
    .bind(&request.subject)
    .bind(&request.message)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    let message: ContactMessage = sqlx::query_as("SELECT * FROM contact_messages WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    tracing::info!(contact_id = %id, "Contact message received");
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ContactMessage>>, ApiError> {
    let messages: Vec<ContactMessage> =
        sqlx::query_as("SELECT * FROM contact_messages ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(messages))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ContactMessage>, ApiError> {
    let result = sqlx::query("UPDATE contact_messages SET is_read = 1 WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Contact message not found"));
    }
    let message: ContactMessage = sqlx::query_as("SELECT * FROM contact_messages WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(message))
}
