//! Student applications: public submission and admissions management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Datelike;
use std::sync::Arc;

use crate::api::error::{ApiError, ValidationErrorBuilder};
use crate::api::validation;
use crate::db::{
    Application, SubmitApplicationRequest, UpdateApplicationStatusRequest, APPLICATION_STATUSES,
};
use crate::AppState;

/// School year applications are currently accepted for: the year
/// starting this autumn.
fn current_application_year() -> String {
    let now = chrono::Utc::now();
    format!("{}/{}", now.year(), now.year() + 1)
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitApplicationRequest>,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check(
        "student_name",
        validation::validate_required(&request.student_name, "Elevens namn"),
    );
    errors.check(
        "student_personnummer",
        validation::validate_personnummer(&request.student_personnummer),
    );
    errors.check(
        "parent_name",
        validation::validate_required(&request.parent_name, "Vårdnadshavares namn"),
    );
    errors.check("parent_email", validation::validate_email(&request.parent_email));
    errors.check(
        "parent_phone",
        validation::validate_required(&request.parent_phone, "Telefonnummer"),
    );
    errors.check(
        "address",
        validation::validate_required(&request.address, "Adress"),
    );
    errors.check(
        "postal_code",
        validation::validate_postal_code(&request.postal_code),
    );
    errors.check("city", validation::validate_required(&request.city, "Ort"));
    errors.check(
        "grade_applying_for",
        validation::validate_required(&request.grade_applying_for, "Årskurs"),
    );
    errors.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    let application_year = current_application_year();

    sqlx::query(
        "INSERT INTO applications \
         (id, student_name, student_personnummer, parent_name, parent_email, parent_phone, \
          address, postal_code, city, current_school, musical_experience, motivation, \
          grade_applying_for, has_transportation, additional_info, application_year, status, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'submitted', ?)",
    )
    .bind(&id)
    .bind(&request.student_name)
    .bind(&request.student_personnummer)
    .bind(&request.parent_name)
    .bind(&request.parent_email)
    .bind(&request.parent_phone)
    .bind(&request.address)
    .bind(&request.postal_code)
    .bind(&request.city)
    .bind(&request.current_school)
    .bind(&request.musical_experience)
    .bind(&request.motivation)
    .bind(&request.grade_applying_for)
    .bind(request.has_transportation)
    .bind(&request.additional_info)
    .bind(&application_year)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    // Receipt email is fire-and-forget; a send failure never fails the
    // submission
    let mailer = state.mailer.clone();
    let to = request.parent_email.clone();
    let student = request.student_name.clone();
    let grade = request.grade_applying_for.clone();
    let year = application_year.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer
            .send_application_receipt(&to, &student, &grade, &year)
            .await
        {
            tracing::error!(error = %e, "Failed to send application receipt to {}", to);
        }
    });

    let application: Application = sqlx::query_as("SELECT * FROM applications WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    tracing::info!(application_id = %id, year = %application_year, "Application submitted");
    Ok((StatusCode::CREATED, Json(application)))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Application>>, ApiError> {
    let applications: Vec<Application> =
        sqlx::query_as("SELECT * FROM applications ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(applications))
}

pub async fn get_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Application>, ApiError> {
    let application: Option<Application> =
        sqlx::query_as("SELECT * FROM applications WHERE id = ?")
            .bind(&id)
            .fetch_optional(&state.db)
            .await?;
    application
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Application not found"))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateApplicationStatusRequest>,
) -> Result<Json<Application>, ApiError> {
    if !APPLICATION_STATUSES.contains(&request.status.as_str()) {
        return Err(ApiError::validation_field(
            "status",
            format!(
                "Ogiltig status, måste vara en av: {}",
                APPLICATION_STATUSES.join(", ")
            ),
        ));
    }

    let result = sqlx::query("UPDATE applications SET status = ? WHERE id = ?")
        .bind(&request.status)
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Application not found"));
    }

    let application: Application = sqlx::query_as("SELECT * FROM applications WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;
    tracing::info!(application_id = %id, status = %request.status, "Application status updated");
    Ok(Json(application))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_year_spans_two_calendar_years() {
        let year = current_application_year();
        let parts: Vec<&str> = year.split('/').collect();
        assert_eq!(parts.len(), 2);
        let first: i32 = parts[0].parse().unwrap();
        let second: i32 = parts[1].parse().unwrap();
        assert_eq!(second, first + 1);
    }
}
