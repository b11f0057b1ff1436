//! News post models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NewsPost {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub published_date: String,
    pub is_published: bool,
    pub featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateNewsPostRequest {
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    #[serde(default = "default_published")]
    pub is_published: bool,
    #[serde(default)]
    pub featured: bool,
}

fn default_published() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateNewsPostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub is_published: Option<bool>,
    pub featured: Option<bool>,
}
