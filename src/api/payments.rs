//! Swish payment endpoints: admin management plus the public gateway
//! callback.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::db::{CreatePaymentRequest, SwishCallback, SwishPayment};
use crate::swish;
use crate::AppState;

/// Create a payment request against the gateway. The response always
/// carries the stored record; a gateway rejection shows up as status
/// ERROR rather than an HTTP error.
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<SwishPayment>), ApiError> {
    // Normalize the payer number before it reaches the gateway
    if let Some(raw) = &request.payer_alias {
        match swish::normalize_payer_alias(raw) {
            Some(normalized) => request.payer_alias = Some(normalized),
            None => {
                return Err(ApiError::validation_field(
                    "payer_alias",
                    "Ogiltigt mobilnummer för Swish",
                ))
            }
        }
    }

    let payment = state.swish.create_payment(&state.db, request).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn list_payments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SwishPayment>>, ApiError> {
    let payments: Vec<SwishPayment> =
        sqlx::query_as("SELECT * FROM swish_payments ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(payments))
}

pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SwishPayment>, ApiError> {
    let payment: Option<SwishPayment> = sqlx::query_as("SELECT * FROM swish_payments WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    payment
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Payment not found"))
}

/// Poll the gateway for the live status. Diagnostic only; the local
/// record is updated by the callback path.
pub async fn get_remote_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.swish.get_status(&id).await {
        Some(status) => Ok(Json(status)),
        None => Err(ApiError::gateway("Could not fetch payment status")),
    }
}

pub async fn cancel_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SwishPayment>, ApiError> {
    let payment = state.swish.cancel(&state.db, &id).await?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub identifier: Option<String>,
}

/// Asynchronous status callback from the gateway. Public endpoint,
/// authenticated by the per-payment callback identifier (payload field
/// or `identifier` query parameter).
pub async fn swish_callback(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<String>,
    Query(params): Query<CallbackParams>,
    Json(callback): Json<SwishCallback>,
) -> Result<StatusCode, ApiError> {
    let identifier = callback
        .callback_identifier
        .clone()
        .or(params.identifier)
        .ok_or_else(|| ApiError::forbidden("Invalid callback"))?;

    state
        .swish
        .process_callback(&state.db, &payment_id, &callback, &identifier)
        .await?;

    Ok(StatusCode::OK)
}
