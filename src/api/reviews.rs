use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::error::ApiError;
use super::parse_json;
use crate::db::{CreateReviewRequest, CreateReviewResponse, ReviewListResponse, ReviewQuery};
use crate::reviews::{self, NewReview};
use crate::AppState;

/// GET /reviews?entity_type=&entity_id=
pub async fn list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReviewQuery>, QueryRejection>,
) -> Result<Json<ReviewListResponse>, ApiError> {
    let Query(query) = query?;
    let (Some(entity_type), Some(entity_id)) = (query.entity_type, query.entity_id) else {
        return Err(ApiError::bad_request("entity_type and entity_id are required"));
    };
    let entity_type = reviews::parse_entity_type(&entity_type)?;

    Ok(Json(reviews::list(&state.db, entity_type, entity_id).await?))
}

/// POST /reviews
pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateReviewResponse>), ApiError> {
    let req: CreateReviewRequest = parse_json(&body)?;
    let review = NewReview::from_request(req)?;
    let (id, created_at) = reviews::create(&state.db, user.id, review).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateReviewResponse {
            id,
            created_at,
            message: "Review created".to_string(),
        }),
    ))
}
