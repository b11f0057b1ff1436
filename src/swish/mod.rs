//! Swish m-commerce gateway adapter.
//!
//! Payments are created against the Swish commerce API and reconciled by
//! an asynchronous status callback. The local row is written before any
//! network call so a crash mid-request still leaves an auditable record,
//! and every status transition is a conditional UPDATE that cannot move
//! a payment out of a terminal state.
//!
//! All gateway calls are single-attempt; a failed create ends in a
//! terminal ERROR row that an admin re-drives by creating a new payment.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::SwishConfig;
use crate::db::{CreatePaymentRequest, PaymentStatus, SwishCallback, SwishPayment};

const BASE_URL_TEST: &str = "https://mss.cpc.getswish.net/swish-cpcapi/api";
const BASE_URL_PROD: &str = "https://cpc.getswish.net/swish-cpcapi/api";

/// Swish message field limit.
const MAX_MESSAGE_LEN: usize = 50;

/// Error messages are truncated to fit the storage column.
const MAX_ERROR_LEN: usize = 950;

/// Tagged adapter error. Gateway rejections do not surface here; they
/// end up as an ERROR payment row that the caller inspects.
#[derive(Debug, Error)]
pub enum SwishError {
    #[error("validation failed for {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("payment not found: {0}")]
    NotFound(String),

    #[error("callback identifier mismatch for payment {0}")]
    IdentifierMismatch(String),

    #[error("gateway call failed: {0}")]
    Gateway(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of classifying the gateway's response to a create call.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CreateOutcome {
    Accepted,
    Rejected { code: String, message: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayError {
    error_code: Option<String>,
    error_message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRequestBody<'a> {
    payee_payment_reference: &'a str,
    callback_url: &'a str,
    payee_alias: &'a str,
    amount: String,
    currency: &'a str,
    message: &'a str,
    callback_identifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer_alias: Option<&'a str>,
}

pub struct SwishClient {
    client: reqwest::Client,
    base_url: String,
    payee_alias: String,
    /// Externally reachable base for per-payment callback URLs
    callback_base: String,
}

impl SwishClient {
    pub fn new(config: SwishConfig, public_url: &str) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs));

        // Swish requires mutual TLS with a merchant certificate
        if let (Some(cert_path), Some(password)) = (&config.cert_path, &config.cert_password) {
            let der = std::fs::read(cert_path)?;
            let identity = reqwest::Identity::from_pkcs12_der(&der, password)?;
            builder = builder.identity(identity);
        }
        if let Some(ca_path) = &config.ca_cert_path {
            let pem = std::fs::read(ca_path)?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        let base_url = config.base_url.clone().unwrap_or_else(|| {
            if config.test_mode {
                BASE_URL_TEST.to_string()
            } else {
                BASE_URL_PROD.to_string()
            }
        });

        Ok(Self {
            client: builder.build()?,
            base_url,
            payee_alias: config.payee_alias,
            callback_base: public_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a payment request.
    ///
    /// The CREATED row is persisted before the gateway is called. The
    /// returned record reflects the outcome: PENDING when the gateway
    /// acknowledged the request, ERROR otherwise. Callers must inspect
    /// `status` rather than assume success.
    pub async fn create_payment(
        &self,
        pool: &SqlitePool,
        req: CreatePaymentRequest,
    ) -> Result<SwishPayment, SwishError> {
        if req.amount <= 0.0 {
            return Err(SwishError::Validation {
                field: "amount",
                message: "Amount must be positive".to_string(),
            });
        }
        if req.message.chars().count() > MAX_MESSAGE_LEN {
            return Err(SwishError::Validation {
                field: "message",
                message: format!("Message must be at most {} characters", MAX_MESSAGE_LEN),
            });
        }

        let payment_id = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
        let callback_identifier = uuid::Uuid::new_v4().simple().to_string();
        let reference = req.reference.clone().unwrap_or_else(|| {
            format!(
                "BMK-{}-{}",
                chrono::Utc::now().format("%Y%m%d"),
                &payment_id[..8]
            )
        });
        let payee_alias = req
            .payee_alias
            .clone()
            .unwrap_or_else(|| self.payee_alias.clone());
        let callback_url = format!("{}/webhooks/swish/{}", self.callback_base, payment_id);
        let now = chrono::Utc::now().to_rfc3339();

        // Local row first, gateway call second
        sqlx::query(
            "INSERT INTO swish_payments \
             (id, payee_payment_reference, payer_alias, payee_alias, amount, currency, message, \
              callback_url, callback_identifier, status, user_id, application_id, event_id, created_at) \
             VALUES (?, ?, ?, ?, ?, 'SEK', ?, ?, ?, 'CREATED', ?, ?, ?, ?)",
        )
        .bind(&payment_id)
        .bind(&reference)
        .bind(&req.payer_alias)
        .bind(&payee_alias)
        .bind(req.amount)
        .bind(&req.message)
        .bind(&callback_url)
        .bind(&callback_identifier)
        .bind(&req.user_id)
        .bind(&req.application_id)
        .bind(&req.event_id)
        .bind(&now)
        .execute(pool)
        .await?;

        let body = PaymentRequestBody {
            payee_payment_reference: &reference,
            callback_url: &callback_url,
            payee_alias: &payee_alias,
            amount: format_amount(req.amount),
            currency: "SEK",
            message: &req.message,
            callback_identifier: &callback_identifier,
            payer_alias: req.payer_alias.as_deref(),
        };

        let url = format!("{}/v2/paymentrequests/{}", self.base_url, payment_id);
        let outcome = match self.client.put(&url).json(&body).send().await {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                classify_create_response(status, &text)
            }
            Err(e) => CreateOutcome::Rejected {
                code: "TRANSPORT_ERROR".to_string(),
                message: truncate_error(&e.to_string()),
            },
        };

        match outcome {
            CreateOutcome::Accepted => {
                sqlx::query(
                    "UPDATE swish_payments SET status = 'PENDING' WHERE id = ? AND status = 'CREATED'",
                )
                .bind(&payment_id)
                .execute(pool)
                .await?;
                tracing::info!(payment_id = %payment_id, "Swish payment request created");
            }
            CreateOutcome::Rejected { code, message } => {
                sqlx::query(
                    "UPDATE swish_payments SET status = 'ERROR', error_code = ?, error_message = ? \
                     WHERE id = ? AND status = 'CREATED'",
                )
                .bind(&code)
                .bind(&message)
                .bind(&payment_id)
                .execute(pool)
                .await?;
                tracing::error!(payment_id = %payment_id, code = %code, "Swish payment request failed: {}", message);
            }
        }

        let payment: SwishPayment = sqlx::query_as("SELECT * FROM swish_payments WHERE id = ?")
            .bind(&payment_id)
            .fetch_one(pool)
            .await?;
        Ok(payment)
    }

    /// Poll the gateway for the remote status of a payment.
    ///
    /// Read-through only: local state is never mutated here, the
    /// callback path is the authoritative status source.
    pub async fn get_status(&self, payment_id: &str) -> Option<serde_json::Value> {
        let url = format!("{}/v1/paymentrequests/{}", self.base_url, payment_id);
        match self.client.get(&url).send().await {
            Ok(response) if response.status() == StatusCode::OK => response.json().await.ok(),
            Ok(response) => {
                tracing::error!(
                    payment_id = %payment_id,
                    status = %response.status(),
                    "Failed to get Swish payment status"
                );
                None
            }
            Err(e) => {
                tracing::error!(payment_id = %payment_id, error = %e, "Error getting Swish payment status");
                None
            }
        }
    }

    /// Cancel a pending payment request.
    ///
    /// The gateway is authoritative: the local record is only moved to
    /// CANCELLED after the gateway accepts the patch. On failure local
    /// state is untouched and the error is reported.
    pub async fn cancel(
        &self,
        pool: &SqlitePool,
        payment_id: &str,
    ) -> Result<SwishPayment, SwishError> {
        let existing: Option<SwishPayment> =
            sqlx::query_as("SELECT * FROM swish_payments WHERE id = ?")
                .bind(payment_id)
                .fetch_optional(pool)
                .await?;
        if existing.is_none() {
            return Err(SwishError::NotFound(payment_id.to_string()));
        }

        let patch = serde_json::json!([
            {"op": "replace", "path": "/status", "value": "cancelled"}
        ]);
        let url = format!("{}/v1/paymentrequests/{}", self.base_url, payment_id);
        let response = self
            .client
            .patch(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json-patch+json")
            .body(patch.to_string())
            .send()
            .await
            .map_err(|e| SwishError::Gateway(truncate_error(&e.to_string())))?;

        if response.status() != StatusCode::OK {
            tracing::error!(
                payment_id = %payment_id,
                status = %response.status(),
                "Failed to cancel Swish payment"
            );
            return Err(SwishError::Gateway(format!(
                "Cancel rejected with HTTP {}",
                response.status()
            )));
        }

        sqlx::query(
            "UPDATE swish_payments SET status = 'CANCELLED', date_cancelled = ? \
             WHERE id = ? AND status NOT IN ('PAID', 'DECLINED', 'ERROR', 'CANCELLED')",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(payment_id)
        .execute(pool)
        .await?;

        tracing::info!(payment_id = %payment_id, "Swish payment cancelled");

        let payment: SwishPayment = sqlx::query_as("SELECT * FROM swish_payments WHERE id = ?")
            .bind(payment_id)
            .fetch_one(pool)
            .await?;
        Ok(payment)
    }

    /// Apply an asynchronous status callback from the gateway.
    ///
    /// Fails closed when the payment is unknown or the presented
    /// identifier does not match the secret issued at creation. The
    /// update is conditional on the row not already being terminal, so
    /// replays of the same callback are accepted without changing state.
    pub async fn process_callback(
        &self,
        pool: &SqlitePool,
        payment_id: &str,
        callback: &SwishCallback,
        callback_identifier: &str,
    ) -> Result<SwishPayment, SwishError> {
        let payment: Option<SwishPayment> =
            sqlx::query_as("SELECT * FROM swish_payments WHERE id = ?")
                .bind(payment_id)
                .fetch_optional(pool)
                .await?;
        let Some(payment) = payment else {
            tracing::error!(payment_id = %payment_id, "Callback for unknown payment");
            return Err(SwishError::NotFound(payment_id.to_string()));
        };

        if !identifier_matches(&payment.callback_identifier, callback_identifier) {
            tracing::error!(payment_id = %payment_id, "Invalid callback identifier");
            return Err(SwishError::IdentifierMismatch(payment_id.to_string()));
        }

        let Some(new_status) = PaymentStatus::parse(&callback.status) else {
            return Err(SwishError::Gateway(format!(
                "Unknown callback status '{}'",
                callback.status
            )));
        };

        let now = chrono::Utc::now().to_rfc3339();
        let updated = match new_status {
            PaymentStatus::Paid => {
                sqlx::query(
                    "UPDATE swish_payments SET status = 'PAID', payment_reference = ?, date_paid = ? \
                     WHERE id = ? AND status NOT IN ('PAID', 'DECLINED', 'ERROR', 'CANCELLED')",
                )
                .bind(&callback.payment_reference)
                .bind(&now)
                .bind(payment_id)
                .execute(pool)
                .await?
            }
            PaymentStatus::Declined | PaymentStatus::Error | PaymentStatus::Cancelled => {
                sqlx::query(
                    "UPDATE swish_payments SET status = ?, error_code = ?, error_message = ? \
                     WHERE id = ? AND status NOT IN ('PAID', 'DECLINED', 'ERROR', 'CANCELLED')",
                )
                .bind(new_status.as_str())
                .bind(&callback.error_code)
                .bind(callback.error_message.as_deref().unwrap_or(""))
                .bind(payment_id)
                .execute(pool)
                .await?
            }
            PaymentStatus::Created | PaymentStatus::Pending => {
                // The gateway never reports these over the callback path
                return Err(SwishError::Gateway(format!(
                    "Unexpected callback status '{}'",
                    callback.status
                )));
            }
        };

        if updated.rows_affected() == 0 {
            // Already terminal: a replayed callback is a no-op success
            tracing::info!(
                payment_id = %payment_id,
                status = %payment.status,
                "Callback ignored, payment already in a terminal state"
            );
        } else {
            tracing::info!(payment_id = %payment_id, status = %new_status, "Swish payment updated");
        }

        let payment: SwishPayment = sqlx::query_as("SELECT * FROM swish_payments WHERE id = ?")
            .bind(payment_id)
            .fetch_one(pool)
            .await?;
        Ok(payment)
    }
}

/// Constant-time comparison of callback identifiers.
fn identifier_matches(expected: &str, presented: &str) -> bool {
    expected.len() == presented.len()
        && expected
            .as_bytes()
            .ct_eq(presented.as_bytes())
            .into()
}

fn classify_create_response(status: StatusCode, body: &str) -> CreateOutcome {
    match status {
        StatusCode::CREATED => CreateOutcome::Accepted,
        StatusCode::UNPROCESSABLE_ENTITY => {
            let errors: Vec<GatewayError> = serde_json::from_str(body).unwrap_or_default();
            match errors.into_iter().next() {
                Some(e) => CreateOutcome::Rejected {
                    code: e.error_code.unwrap_or_else(|| "UNKNOWN".to_string()),
                    message: truncate_error(
                        &e.error_message.unwrap_or_else(|| "Validation error".to_string()),
                    ),
                },
                None => CreateOutcome::Rejected {
                    code: "UNKNOWN".to_string(),
                    message: "Validation error".to_string(),
                },
            }
        }
        other => CreateOutcome::Rejected {
            code: other.as_u16().to_string(),
            message: format!(
                "HTTP {}: {}",
                other.as_u16(),
                other.canonical_reason().unwrap_or("unexpected response")
            ),
        },
    }
}

fn truncate_error(message: &str) -> String {
    if message.len() > MAX_ERROR_LEN {
        let cut: String = message.chars().take(MAX_ERROR_LEN).collect();
        format!("{}...[truncated]", cut)
    } else {
        message.to_string()
    }
}

/// Format an amount for the gateway: fixed two fraction digits.
pub fn format_amount(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// Normalize a Swedish mobile number to the international digit-only
/// form Swish requires (e.g. 46701234567). Returns None for anything
/// that is not a valid mobile alias.
pub fn normalize_payer_alias(input: &str) -> Option<String> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with("46") {
        // Already in international form
        if (11..=13).contains(&digits.len()) {
            return Some(digits);
        }
    } else if digits.starts_with("07") && digits.len() == 10 {
        // Domestic form with trunk zero
        return Some(format!("46{}", &digits[1..]));
    } else if digits.len() == 9 && digits.starts_with('7') {
        // Mobile number without trunk zero
        return Some(format!("46{}", digits));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwishConfig;
    use crate::db::init_in_memory;

    fn test_client() -> SwishClient {
        // Unroutable base URL: create calls fail at the transport layer
        SwishClient::new(
            SwishConfig {
                payee_alias: "1234679304".to_string(),
                base_url: Some("http://127.0.0.1:1/swish".to_string()),
                timeout_secs: 1,
                ..SwishConfig::default()
            },
            "https://portal.example.se",
        )
        .unwrap()
    }

    fn payment_request(amount: f64, message: &str) -> CreatePaymentRequest {
        CreatePaymentRequest {
            amount,
            message: message.to_string(),
            payer_alias: Some("46701234567".to_string()),
            payee_alias: None,
            reference: None,
            user_id: None,
            application_id: None,
            event_id: None,
        }
    }

    #[test]
    fn amount_formatting() {
        assert_eq!(format_amount(100.0), "100.00");
        assert_eq!(format_amount(99.5), "99.50");
        assert_eq!(format_amount(0.1), "0.10");
        assert_eq!(format_amount(1234.56), "1234.56");
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(
            normalize_payer_alias("0701234567").as_deref(),
            Some("46701234567")
        );
        assert_eq!(
            normalize_payer_alias("701234567").as_deref(),
            Some("46701234567")
        );
        assert_eq!(
            normalize_payer_alias("46701234567").as_deref(),
            Some("46701234567")
        );
        // Formatting characters are stripped
        assert_eq!(
            normalize_payer_alias("070-123 45 67").as_deref(),
            Some("46701234567")
        );
        // Landline, empty and garbage are invalid
        assert_eq!(normalize_payer_alias("08123456"), None);
        assert_eq!(normalize_payer_alias(""), None);
        assert_eq!(normalize_payer_alias("not a number"), None);
        assert_eq!(normalize_payer_alias("4670"), None);
    }

    #[test]
    fn create_response_classification() {
        assert_eq!(
            classify_create_response(StatusCode::CREATED, ""),
            CreateOutcome::Accepted
        );

        let rejected = classify_create_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"[{"errorCode":"AM03","errorMessage":"Invalid or missing Currency."}]"#,
        );
        assert_eq!(
            rejected,
            CreateOutcome::Rejected {
                code: "AM03".to_string(),
                message: "Invalid or missing Currency.".to_string(),
            }
        );

        // 422 with an unparsable body still produces a tagged rejection
        let fallback = classify_create_response(StatusCode::UNPROCESSABLE_ENTITY, "oops");
        assert_eq!(
            fallback,
            CreateOutcome::Rejected {
                code: "UNKNOWN".to_string(),
                message: "Validation error".to_string(),
            }
        );

        match classify_create_response(StatusCode::INTERNAL_SERVER_ERROR, "") {
            CreateOutcome::Rejected { code, .. } => assert_eq!(code, "500"),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn error_truncation() {
        let long = "x".repeat(2000);
        let truncated = truncate_error(&long);
        assert!(truncated.ends_with("...[truncated]"));
        assert!(truncated.len() < 1000);
        assert_eq!(truncate_error("short"), "short");
    }

    #[test]
    fn identifier_comparison() {
        assert!(identifier_matches("abc123", "abc123"));
        assert!(!identifier_matches("abc123", "abc124"));
        assert!(!identifier_matches("abc123", "abc12"));
    }

    #[tokio::test]
    async fn validation_rejects_before_persistence() {
        let pool = init_in_memory().await.unwrap();
        let client = test_client();

        let err = client
            .create_payment(&pool, payment_request(-5.0, "Medlemsavgift"))
            .await
            .unwrap_err();
        assert!(matches!(err, SwishError::Validation { field: "amount", .. }));

        let err = client
            .create_payment(&pool, payment_request(100.0, &"x".repeat(51)))
            .await
            .unwrap_err();
        assert!(matches!(err, SwishError::Validation { field: "message", .. }));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM swish_payments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn failed_create_leaves_terminal_error_row() {
        let pool = init_in_memory().await.unwrap();
        let client = test_client();

        let payment = client
            .create_payment(&pool, payment_request(100.0, "Medlemsavgift"))
            .await
            .unwrap();

        // Gateway unreachable: the row exists and is terminal ERROR,
        // never PENDING
        assert_eq!(payment.status, "ERROR");
        assert_eq!(payment.error_code.as_deref(), Some("TRANSPORT_ERROR"));
        assert!(payment.error_message.is_some());
        assert_eq!(payment.currency, "SEK");
        assert!(payment.payee_payment_reference.starts_with("BMK-"));
        assert_eq!(payment.id.len(), 32);
        assert_eq!(payment.callback_identifier.len(), 32);
        assert_eq!(
            payment.callback_url,
            format!("https://portal.example.se/webhooks/swish/{}", payment.id)
        );
    }

    async fn insert_pending_payment(pool: &SqlitePool, id: &str, identifier: &str) {
        sqlx::query(
            "INSERT INTO swish_payments \
             (id, payee_payment_reference, payee_alias, amount, currency, message, \
              callback_url, callback_identifier, status, created_at) \
             VALUES (?, ?, '1234679304', 100.0, 'SEK', 'Avgift', ?, ?, 'PENDING', ?)",
        )
        .bind(id)
        .bind(format!("BMK-20250101-{}", &id[..8]))
        .bind(format!("https://portal.example.se/webhooks/swish/{}", id))
        .bind(identifier)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .unwrap();
    }

    fn paid_callback() -> SwishCallback {
        SwishCallback {
            status: "PAID".to_string(),
            payment_reference: Some("652ED6A2BCDE4BA8AD11D7334E9567B7".to_string()),
            error_code: None,
            error_message: None,
            callback_identifier: None,
        }
    }

    #[tokio::test]
    async fn callback_with_wrong_identifier_mutates_nothing() {
        let pool = init_in_memory().await.unwrap();
        let client = test_client();
        let id = "AB23D7406ECE4542A80152D8FBFD1C34";
        insert_pending_payment(&pool, id, "secret-identifier").await;

        let err = client
            .process_callback(&pool, id, &paid_callback(), "wrong-identifier!")
            .await
            .unwrap_err();
        assert!(matches!(err, SwishError::IdentifierMismatch(_)));

        let payment: SwishPayment = sqlx::query_as("SELECT * FROM swish_payments WHERE id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(payment.status, "PENDING");
        assert!(payment.payment_reference.is_none());
    }

    #[tokio::test]
    async fn callback_for_unknown_payment_fails_closed() {
        let pool = init_in_memory().await.unwrap();
        let client = test_client();
        let err = client
            .process_callback(&pool, "DOESNOTEXIST", &paid_callback(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, SwishError::NotFound(_)));
    }

    #[tokio::test]
    async fn paid_callback_records_reference_and_timestamp() {
        let pool = init_in_memory().await.unwrap();
        let client = test_client();
        let id = "AB23D7406ECE4542A80152D8FBFD1C34";
        insert_pending_payment(&pool, id, "secret-identifier").await;

        let payment = client
            .process_callback(&pool, id, &paid_callback(), "secret-identifier")
            .await
            .unwrap();
        assert_eq!(payment.status, "PAID");
        assert_eq!(
            payment.payment_reference.as_deref(),
            Some("652ED6A2BCDE4BA8AD11D7334E9567B7")
        );
        assert!(payment.date_paid.is_some());
    }

    #[tokio::test]
    async fn replayed_callback_is_idempotent() {
        let pool = init_in_memory().await.unwrap();
        let client = test_client();
        let id = "AB23D7406ECE4542A80152D8FBFD1C34";
        insert_pending_payment(&pool, id, "secret-identifier").await;

        let first = client
            .process_callback(&pool, id, &paid_callback(), "secret-identifier")
            .await
            .unwrap();
        let second = client
            .process_callback(&pool, id, &paid_callback(), "secret-identifier")
            .await
            .unwrap();

        assert_eq!(first.status, "PAID");
        assert_eq!(second.status, "PAID");
        assert_eq!(first.payment_reference, second.payment_reference);
        assert_eq!(first.date_paid, second.date_paid);
    }

    #[tokio::test]
    async fn declined_callback_records_error_details() {
        let pool = init_in_memory().await.unwrap();
        let client = test_client();
        let id = "CD23D7406ECE4542A80152D8FBFD1C34";
        insert_pending_payment(&pool, id, "secret-identifier").await;

        let callback = SwishCallback {
            status: "DECLINED".to_string(),
            payment_reference: None,
            error_code: Some("RF07".to_string()),
            error_message: Some("Transaction declined".to_string()),
            callback_identifier: None,
        };
        let payment = client
            .process_callback(&pool, id, &callback, "secret-identifier")
            .await
            .unwrap();
        assert_eq!(payment.status, "DECLINED");
        assert_eq!(payment.error_code.as_deref(), Some("RF07"));
        assert_eq!(payment.error_message.as_deref(), Some("Transaction declined"));
    }

    #[tokio::test]
    async fn callback_cannot_regress_terminal_state() {
        let pool = init_in_memory().await.unwrap();
        let client = test_client();
        let id = "EF23D7406ECE4542A80152D8FBFD1C34";
        insert_pending_payment(&pool, id, "secret-identifier").await;

        client
            .process_callback(&pool, id, &paid_callback(), "secret-identifier")
            .await
            .unwrap();

        // A late DECLINED callback cannot overwrite PAID
        let late = SwishCallback {
            status: "DECLINED".to_string(),
            payment_reference: None,
            error_code: Some("RF07".to_string()),
            error_message: None,
            callback_identifier: None,
        };
        let payment = client
            .process_callback(&pool, id, &late, "secret-identifier")
            .await
            .unwrap();
        assert_eq!(payment.status, "PAID");
    }

    #[tokio::test]
    async fn callback_with_pending_status_is_rejected() {
        let pool = init_in_memory().await.unwrap();
        let client = test_client();
        let id = "0123D7406ECE4542A80152D8FBFD1C34";
        insert_pending_payment(&pool, id, "secret-identifier").await;

        let callback = SwishCallback {
            status: "PENDING".to_string(),
            payment_reference: None,
            error_code: None,
            error_message: None,
            callback_identifier: None,
        };
        let err = client
            .process_callback(&pool, id, &callback, "secret-identifier")
            .await
            .unwrap_err();
        assert!(matches!(err, SwishError::Gateway(_)));
    }
}
