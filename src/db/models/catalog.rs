//! Bookable resources: baths and masters.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bath {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub price_per_hour: i64,
    pub rating: f64,
    pub reviews_count: i64,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Master {
    pub id: i64,
    pub name: String,
    pub specialization: Option<String>,
    pub price_per_hour: i64,
    pub rating: f64,
    pub reviews_count: i64,
    pub is_active: bool,
    pub created_at: String,
}
