//! Review models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Approved review joined with its author
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub id: i64,
    pub rating: i64,
    pub comment: String,
    pub created_at: String,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAuthor {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub id: i64,
    pub rating: i64,
    pub comment: String,
    pub created_at: String,
    pub user: ReviewAuthor,
}

impl From<ReviewRow> for ReviewResponse {
    fn from(row: ReviewRow) -> Self {
        let name = format!("{} {}", row.first_name, row.last_name)
            .trim()
            .to_string();
        Self {
            id: row.id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
            user: ReviewAuthor { id: row.user_id, name },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewStats {
    pub average_rating: f64,
    pub total_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewListResponse {
    pub reviews: Vec<ReviewResponse>,
    pub stats: ReviewStats,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateReviewRequest {
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub rating: Option<i64>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateReviewResponse {
    pub id: i64,
    pub created_at: String,
    pub message: String,
}
