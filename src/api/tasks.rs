//! Task management for admins, event managers and parents.
//!
//! Managers see and edit everything; parents only see tasks assigned to
//! them and may mark those as done.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::validation;
use crate::auth::Principal;
use crate::db::{CreateTaskRequest, Task, UpdateTaskRequest, TASK_STATUSES};
use crate::AppState;

fn can_manage(principal: &Principal) -> bool {
    principal.has_any_role(&["Admin", "event_manager"])
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks: Vec<Task> = if can_manage(&principal) {
        sqlx::query_as("SELECT * FROM tasks ORDER BY due_date IS NULL, due_date ASC")
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as(
            "SELECT * FROM tasks WHERE assigned_user_id = ? ORDER BY due_date IS NULL, due_date ASC",
        )
        .bind(&principal.user_id)
        .fetch_all(&state.db)
        .await?
    };
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("title", validation::validate_required(&request.title, "Titel"));
    errors.check("title", validation::validate_max_len(&request.title, 200, "Titel"));
    errors.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO tasks (id, title, description, assigned_user_id, status, due_date, created_at) \
         VALUES (?, ?, ?, ?, 'open', ?, ?)",
    )
    .bind(&id)
    .bind(&request.title)
    .bind(&request.description)
    .bind(&request.assigned_user_id)
    .bind(&request.due_date)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    let task: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    tracing::info!(task_id = %id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    if let Some(status) = &request.status {
        if !TASK_STATUSES.contains(&status.as_str()) {
            return Err(ApiError::validation_field(
                "status",
                format!("Ogiltig status, måste vara en av: {}", TASK_STATUSES.join(", ")),
            ));
        }
    }

    let existing: Option<Task> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("Task not found"))?;

    sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, assigned_user_id = ?, status = ?, due_date = ? \
         WHERE id = ?",
    )
    .bind(request.title.unwrap_or(existing.title))
    .bind(request.description.or(existing.description))
    .bind(request.assigned_user_id.or(existing.assigned_user_id))
    .bind(request.status.unwrap_or(existing.status))
    .bind(request.due_date.or(existing.due_date))
    .bind(&id)
    .execute(&state.db)
    .await?;

    let task: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(task))
}

/// Mark a task done. Parents may only complete tasks assigned to them.
pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let task: Option<Task> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let task = task.ok_or_else(|| ApiError::not_found("Task not found"))?;

    if !can_manage(&principal) && task.assigned_user_id.as_deref() != Some(&principal.user_id) {
        return Err(ApiError::forbidden(
            "Du kan bara slutföra uppgifter som är tilldelade dig",
        ));
    }

    sqlx::query("UPDATE tasks SET status = 'done' WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    let task: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    tracing::info!(task_id = %id, user = %principal.email, "Task completed");
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Task not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
