use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use std::sync::Arc;

use super::error::ApiError;
use crate::booking::availability::{is_available, parse_date};
use crate::booking::TimeRange;
use crate::db::{AvailabilityQuery, AvailabilityResponse, ResourceType};
use crate::AppState;

/// GET /availability - public slot lookup
pub async fn check(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let Query(query) = query?;

    let (Some(booking_type), Some(entity_id), Some(date), Some(start), Some(end)) = (
        query.booking_type,
        query.entity_id,
        query.date,
        query.start_time,
        query.end_time,
    ) else {
        return Err(ApiError::bad_request(
            "booking_type, entity_id, date, start_time and end_time are required",
        ));
    };

    let resource_type: ResourceType = booking_type
        .parse()
        .map_err(|msg: String| ApiError::validation_field("booking_type", msg))?;
    let date = parse_date(&date)?;
    let range = TimeRange::parse(&start, &end)?;

    let available = is_available(&state.db, resource_type, entity_id, date, &range, None).await?;
    Ok(Json(AvailabilityResponse { available }))
}
