//! `/bookings` endpoints. All require an authenticated user.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde_json::json;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::error::ApiError;
use super::{metrics, parse_json};
use crate::booking::{lifecycle, BookingEdit, BookingError, BookingFilter, NewBooking};
use crate::db::{
    BookingListQuery, BookingListResponse, BookingStatus, CancelBookingRequest,
    CreateBookingRequest, CreateBookingResponse, UpdateBookingRequest,
};
use crate::AppState;

fn target_id(query: &BookingListQuery) -> Result<i64, ApiError> {
    query
        .booking_id
        .or(query.id)
        .ok_or_else(|| ApiError::bad_request("booking id is required"))
}

/// GET /bookings - one booking with `?id=`, otherwise a filtered page
pub async fn list_or_get(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<BookingListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;

    if let Some(id) = query.id.or(query.booking_id) {
        let booking = lifecycle::get(&state.db, id, user.id).await?;
        return Ok(Json(booking).into_response());
    }

    let filter = BookingFilter::from_query(&query)?;
    let (items, total) = lifecycle::list(&state.db, user.id, &filter).await?;
    Ok(Json(BookingListResponse {
        items,
        total,
        limit: filter.limit,
        offset: filter.offset,
    })
    .into_response())
}

/// POST /bookings
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateBookingResponse>), ApiError> {
    let req: CreateBookingRequest = parse_json(&body)?;
    let new_booking = NewBooking::from_request(req, Local::now().date_naive())?;
    let booking_type = new_booking.resource_type.as_str();

    let booking = match lifecycle::create(&state.db, user.id, new_booking).await {
        Ok(booking) => booking,
        Err(BookingError::SlotConflict) => {
            metrics::record_booking_conflict();
            return Err(BookingError::SlotConflict.into());
        }
        Err(e) => return Err(e.into()),
    };
    metrics::record_booking_created(booking_type);

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            id: booking.id,
            total_price: booking.total_price,
            created_at: booking.created_at,
            message: "Booking created".to_string(),
        }),
    ))
}

/// PUT /bookings?id= - a status change or an edit of guests/notes
pub async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<BookingListQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let req: UpdateBookingRequest = parse_json(&body)?;
    // Older clients send the id in the body
    let booking_id = match target_id(&query) {
        Ok(id) => id,
        Err(e) => req.booking_id.ok_or(e)?,
    };

    let booking = match req.status.as_deref() {
        Some(status) => {
            let next: BookingStatus = status.parse().map_err(|msg: String| {
                ApiError::validation_field("status", msg)
            })?;
            let booking = lifecycle::update_status(&state.db, booking_id, user.id, next).await?;
            if next == BookingStatus::Canceled {
                metrics::record_booking_canceled();
            }
            booking
        }
        None => {
            let edit = BookingEdit {
                guests_count: req.guests_count,
                notes: req.notes,
            };
            lifecycle::update_fields(&state.db, booking_id, user.id, edit).await?
        }
    };

    Ok(Json(json!({ "message": "Booking updated", "booking": booking })).into_response())
}

/// DELETE /bookings?booking_id= - cancel with an optional `{reason}` body
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<BookingListQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let booking_id = target_id(&query)?;
    let req: CancelBookingRequest = parse_json(&body)?;

    lifecycle::cancel(&state.db, booking_id, user.id, req.reason).await?;
    metrics::record_booking_canceled();

    Ok(Json(json!({ "message": "Booking canceled" })).into_response())
}
