//! News posts: public feed and admin management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::validation;
use crate::db::{CreateNewsPostRequest, NewsPost, UpdateNewsPostRequest};
use crate::AppState;

/// Published posts, featured first, newest first. Public.
pub async fn list_published(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NewsPost>>, ApiError> {
    let posts: Vec<NewsPost> = sqlx::query_as(
        "SELECT * FROM news_posts WHERE is_published = 1 \
         ORDER BY featured DESC, published_date DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(posts))
}

pub async fn list_all(State(state): State<Arc<AppState>>) -> Result<Json<Vec<NewsPost>>, ApiError> {
    let posts: Vec<NewsPost> =
        sqlx::query_as("SELECT * FROM news_posts ORDER BY published_date DESC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateNewsPostRequest>,
) -> Result<(StatusCode, Json<NewsPost>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("title", validation::validate_required(&request.title, "Titel"));
    errors.check("title", validation::validate_max_len(&request.title, 200, "Titel"));
    errors.check(
        "content",
        validation::validate_required(&request.content, "Innehåll"),
    );
    errors.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO news_posts (id, title, content, author, published_date, is_published, featured) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.title)
    .bind(&request.content)
    .bind(&request.author)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(request.is_published)
    .bind(request.featured)
    .execute(&state.db)
    .await?;

    let post: NewsPost = sqlx::query_as("SELECT * FROM news_posts WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    tracing::info!(post_id = %id, "News post created");
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateNewsPostRequest>,
) -> Result<Json<NewsPost>, ApiError> {
    let existing: Option<NewsPost> = sqlx::query_as("SELECT * FROM news_posts WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("News post not found"))?;

    sqlx::query(
        "UPDATE news_posts SET title = ?, content = ?, author = ?, is_published = ?, featured = ? \
         WHERE id = ?",
    )
    .bind(request.title.unwrap_or(existing.title))
    .bind(request.content.unwrap_or(existing.content))
    .bind(request.author.or(existing.author))
    .bind(request.is_published.unwrap_or(existing.is_published))
    .bind(request.featured.unwrap_or(existing.featured))
    .bind(&id)
    .execute(&state.db)
    .await?;

    let post: NewsPost = sqlx::query_as("SELECT * FROM news_posts WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM news_posts WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("News post not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
