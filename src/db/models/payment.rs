//! Swish payment request model and status machine.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Payment request lifecycle.
///
/// `Created` is the local pre-submission state; `Pending` is entered only
/// once the gateway has acknowledged the request. The four remaining
/// states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Created,
    Pending,
    Paid,
    Declined,
    Error,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "CREATED",
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Declined => "DECLINED",
            PaymentStatus::Error => "ERROR",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(PaymentStatus::Created),
            "PENDING" => Some(PaymentStatus::Pending),
            "PAID" => Some(PaymentStatus::Paid),
            "DECLINED" => Some(PaymentStatus::Declined),
            "ERROR" => Some(PaymentStatus::Error),
            "CANCELLED" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Paid
                | PaymentStatus::Declined
                | PaymentStatus::Error
                | PaymentStatus::Cancelled
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SwishPayment {
    /// Swish payment request id: 32 uppercase hex characters
    pub id: String,
    pub payee_payment_reference: String,
    pub payer_alias: Option<String>,
    pub payee_alias: String,
    pub amount: f64,
    pub currency: String,
    pub message: String,
    pub callback_url: String,
    /// Per-request secret embedded in the callback URL; an inbound
    /// callback must present it to be accepted.
    pub callback_identifier: String,
    pub status: String,
    pub payment_reference: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub user_id: Option<String>,
    pub application_id: Option<String>,
    pub event_id: Option<String>,
    pub created_at: String,
    pub date_paid: Option<String>,
    pub date_cancelled: Option<String>,
}

impl SwishPayment {
    pub fn status(&self) -> Option<PaymentStatus> {
        PaymentStatus::parse(&self.status)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount: f64,
    pub message: String,
    pub payer_alias: Option<String>,
    pub payee_alias: Option<String>,
    pub reference: Option<String>,
    pub user_id: Option<String>,
    pub application_id: Option<String>,
    pub event_id: Option<String>,
}

/// Asynchronous status callback payload posted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwishCallback {
    pub status: String,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Secret issued at creation, echoed back by the gateway.
    #[serde(default)]
    pub callback_identifier: Option<String>,
}
