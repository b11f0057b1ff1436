//! Student application models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: String,
    pub student_name: String,
    pub student_personnummer: String,
    pub parent_name: String,
    pub parent_email: String,
    pub parent_phone: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub current_school: Option<String>,
    pub musical_experience: Option<String>,
    pub motivation: Option<String>,
    pub grade_applying_for: String,
    pub has_transportation: bool,
    pub additional_info: Option<String>,
    /// School year applied for, e.g. "2025/2026"
    pub application_year: String,
    /// submitted, reviewed, accepted, rejected
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitApplicationRequest {
    pub student_name: String,
    pub student_personnummer: String,
    pub parent_name: String,
    pub parent_email: String,
    pub parent_phone: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub current_school: Option<String>,
    pub musical_experience: Option<String>,
    pub motivation: Option<String>,
    pub grade_applying_for: String,
    #[serde(default)]
    pub has_transportation: bool,
    pub additional_info: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApplicationStatusRequest {
    pub status: String,
}

pub const APPLICATION_STATUSES: &[&str] = &["submitted", "reviewed", "accepted", "rejected"];
