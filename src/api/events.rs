//! Public event listing and admin event management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::validation;
use crate::db::{CreateEventRequest, Event, UpdateEventRequest};
use crate::AppState;

/// Active upcoming events, soonest first. Public.
pub async fn list_upcoming(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let now = chrono::Utc::now().to_rfc3339();
    let events: Vec<Event> = sqlx::query_as(
        "SELECT * FROM events WHERE is_active = 1 AND event_date > ? ORDER BY event_date ASC",
    )
    .bind(&now)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(events))
}

pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    let event: Option<Event> = sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    event
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Event not found"))
}

/// All events including inactive and past ones. Admin view.
pub async fn list_all(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Event>>, ApiError> {
    let events: Vec<Event> = sqlx::query_as("SELECT * FROM events ORDER BY event_date DESC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("title", validation::validate_required(&request.title, "Titel"));
    errors.check("title", validation::validate_max_len(&request.title, 200, "Titel"));
    errors.check(
        "event_date",
        validation::validate_required(&request.event_date, "Datum"),
    );
    errors.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO events (id, title, description, event_date, location, ticket_url, is_active, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(&id)
    .bind(&request.title)
    .bind(&request.description)
    .bind(&request.event_date)
    .bind(&request.location)
    .bind(&request.ticket_url)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    let event: Event = sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(event_id = %id, title = %event.title, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    let existing: Option<Event> = sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("Event not found"))?;

    sqlx::query(
        "UPDATE events SET title = ?, description = ?, event_date = ?, location = ?, \
         ticket_url = ?, is_active = ? WHERE id = ?",
    )
    .bind(request.title.unwrap_or(existing.title))
    .bind(request.description.or(existing.description))
    .bind(request.event_date.unwrap_or(existing.event_date))
    .bind(request.location.or(existing.location))
    .bind(request.ticket_url.or(existing.ticket_url))
    .bind(request.is_active.unwrap_or(existing.is_active))
    .bind(&id)
    .execute(&state.db)
    .await?;

    let event: Event = sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Event not found"));
    }
    tracing::info!(event_id = %id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}
