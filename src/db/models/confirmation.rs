//! Single-use confirmation codes for email verification and password reset.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Workflow a confirmation code is valid for. Codes issued for one
/// purpose never redeem a request for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    EmailVerification,
    PasswordReset,
    UserRegistration,
}

impl CodePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::EmailVerification => "email_verification",
            CodePurpose::PasswordReset => "password_reset",
            CodePurpose::UserRegistration => "user_registration",
        }
    }
}

impl std::fmt::Display for CodePurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConfirmationCode {
    pub id: String,
    pub code: String,
    pub email: String,
    pub purpose: String,
    pub used: bool,
    pub used_at: Option<String>,
    pub created_at: String,
    pub expires_at: String,
}
