//! Booking models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of bookable resource; also the `entity_type` of a review
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Bath,
    Master,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bath => "bath",
            Self::Master => "master",
        }
    }

    /// Catalog table holding resources of this type
    pub fn table(&self) -> &'static str {
        match self {
            Self::Bath => "baths",
            Self::Master => "masters",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bath" => Ok(Self::Bath),
            "master" => Ok(Self::Master),
            _ => Err(format!("Unknown resource type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }

    /// Active bookings hold their slot
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Canceled)
                | (Self::Confirmed, Self::Completed)
                | (Self::Confirmed, Self::Canceled)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            _ => Err(format!("Unknown booking status: {}", s)),
        }
    }
}

impl From<String> for BookingStatus {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub booking_type: String,
    pub entity_id: i64,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
    pub guests_count: i64,
    pub total_price: i64,
    pub status: String,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
    pub canceled_at: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl Booking {
    pub fn status_enum(&self) -> BookingStatus {
        BookingStatus::from(self.status.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateBookingRequest {
    pub booking_type: Option<String>,
    pub entity_id: Option<i64>,
    pub booking_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub guests_count: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBookingResponse {
    pub id: i64,
    pub total_price: i64,
    pub created_at: String,
    pub message: String,
}

/// PUT body: either a status change or field edits
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBookingRequest {
    pub booking_id: Option<i64>,
    pub status: Option<String>,
    pub guests_count: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingListQuery {
    /// Single booking lookup on GET, target booking on PUT
    pub id: Option<i64>,
    pub booking_id: Option<i64>,
    pub status: Option<String>,
    #[serde(rename = "type", alias = "booking_type")]
    pub booking_type: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingListResponse {
    pub items: Vec<Booking>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub booking_type: Option<String>,
    pub entity_id: Option<i64>,
    #[serde(alias = "booking_date")]
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}
