//! Bath and master reservations.

pub mod availability;
pub mod lifecycle;
pub mod pricing;

pub use availability::{is_available, TimeRange};
pub use lifecycle::{BookingEdit, BookingFilter, NewBooking};

use thiserror::Error;

use crate::db::BookingStatus;

/// Trigger message raised by the overlap guard in the schema
pub(crate) const SLOT_CONFLICT_MARKER: &str = "booking_slot_conflict";

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),
    #[error("the selected time slot is already taken")]
    SlotConflict,
    #[error("resource not found")]
    ResourceNotFound,
    /// Unknown booking or one owned by another user
    #[error("booking not found")]
    NotFound,
    #[error("cannot change booking status from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },
    #[error("booking is already canceled")]
    AlreadyCanceled,
    #[error("a {0} booking can no longer be edited")]
    NotEditable(BookingStatus),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.message().contains(SLOT_CONFLICT_MARKER) => {
                BookingError::SlotConflict
            }
            _ => BookingError::Database(err),
        }
    }
}
