//! Ratings and comments for baths and masters.

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::db::{
    timestamp, CreateReviewRequest, DbPool, ResourceType, ReviewListResponse, ReviewResponse,
    ReviewRow, ReviewStats,
};

const MIN_COMMENT_CHARS: usize = 10;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(ResourceType),
    #[error("you have already reviewed this {0}")]
    Conflict(ResourceType),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub entity_type: ResourceType,
    pub entity_id: i64,
    pub rating: i64,
    pub comment: String,
}

impl NewReview {
    pub fn from_request(req: CreateReviewRequest) -> Result<Self, ReviewError> {
        let (Some(entity_type), Some(entity_id)) = (req.entity_type, req.entity_id) else {
            return Err(ReviewError::Validation(
                "entity_type and entity_id are required".to_string(),
            ));
        };
        let entity_type = parse_entity_type(&entity_type)?;

        let rating = req.rating.unwrap_or(0);
        if !(1..=5).contains(&rating) {
            return Err(ReviewError::Validation("rating must be between 1 and 5".to_string()));
        }

        let comment = req.comment.trim().to_string();
        if comment.chars().count() < MIN_COMMENT_CHARS {
            return Err(ReviewError::Validation(format!(
                "comment must be at least {} characters",
                MIN_COMMENT_CHARS
            )));
        }

        Ok(Self {
            entity_type,
            entity_id,
            rating,
            comment,
        })
    }
}

pub fn parse_entity_type(value: &str) -> Result<ResourceType, ReviewError> {
    value
        .parse()
        .map_err(|_| ReviewError::Validation("entity_type must be 'bath' or 'master'".to_string()))
}

/// Store a review and refresh the resource's cached rating.
///
/// Returns the new review id and its creation timestamp.
pub async fn create(db: &DbPool, user_id: i64, review: NewReview) -> Result<(i64, String), ReviewError> {
    let table = review.entity_type.table();
    let mut tx = crate::db::begin_immediate(db).await?;

    let exists: Option<i64> = sqlx::query_scalar(&format!("SELECT id FROM {} WHERE id = ?", table))
        .bind(review.entity_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(ReviewError::NotFound(review.entity_type));
    }

    let created_at = timestamp(Utc::now());
    let inserted: Result<i64, sqlx::Error> = sqlx::query_scalar(
        r#"
        INSERT INTO reviews (user_id, entity_type, entity_id, rating, comment, is_approved, created_at)
        VALUES (?, ?, ?, ?, ?, 1, ?)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(review.entity_type.as_str())
    .bind(review.entity_id)
    .bind(review.rating)
    .bind(&review.comment)
    .bind(&created_at)
    .fetch_one(&mut *tx)
    .await;

    let id = match inserted {
        Ok(id) => id,
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE constraint failed") => {
            return Err(ReviewError::Conflict(review.entity_type));
        }
        Err(e) => return Err(e.into()),
    };

    sqlx::query(&format!(
        r#"
        UPDATE {}
        SET rating = (
                SELECT COALESCE(ROUND(AVG(rating), 1), 0) FROM reviews
                WHERE entity_type = ?1 AND entity_id = ?2 AND is_approved = 1
            ),
            reviews_count = (
                SELECT COUNT(*) FROM reviews
                WHERE entity_type = ?1 AND entity_id = ?2 AND is_approved = 1
            )
        WHERE id = ?2
        "#,
        table
    ))
    .bind(review.entity_type.as_str())
    .bind(review.entity_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(review_id = id, user_id, entity_type = %review.entity_type, entity_id = review.entity_id, "Review created");
    Ok((id, created_at))
}

/// Approved reviews for a resource, newest first
pub async fn list(
    db: &DbPool,
    entity_type: ResourceType,
    entity_id: i64,
) -> Result<ReviewListResponse, ReviewError> {
    let rows: Vec<ReviewRow> = sqlx::query_as(
        r#"
        SELECT r.id, r.rating, r.comment, r.created_at, u.id AS user_id, u.first_name, u.last_name
        FROM reviews r
        JOIN users u ON u.id = r.user_id
        WHERE r.entity_type = ? AND r.entity_id = ? AND r.is_approved = 1
        ORDER BY r.created_at DESC, r.id DESC
        "#,
    )
    .bind(entity_type.as_str())
    .bind(entity_id)
    .fetch_all(db)
    .await?;

    let (average_rating, total_count): (f64, i64) = sqlx::query_as(
        r#"
        SELECT CAST(COALESCE(ROUND(AVG(rating), 1), 0) AS REAL), COUNT(*)
        FROM reviews
        WHERE entity_type = ? AND entity_id = ? AND is_approved = 1
        "#,
    )
    .bind(entity_type.as_str())
    .bind(entity_id)
    .fetch_one(db)
    .await?;

    Ok(ReviewListResponse {
        reviews: rows.into_iter().map(ReviewResponse::from).collect(),
        stats: ReviewStats {
            average_rating,
            total_count,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;
    use crate::test_utils::{insert_bath, insert_user};

    fn request(entity_id: i64, rating: i64, comment: &str) -> CreateReviewRequest {
        CreateReviewRequest {
            entity_type: Some("bath".to_string()),
            entity_id: Some(entity_id),
            rating: Some(rating),
            comment: comment.to_string(),
        }
    }

    #[test]
    fn test_validation() {
        assert!(NewReview::from_request(request(1, 0, "long enough comment")).is_err());
        assert!(NewReview::from_request(request(1, 6, "long enough comment")).is_err());
        assert!(NewReview::from_request(request(1, 5, "  short   ")).is_err());

        let mut event = request(1, 5, "long enough comment");
        event.entity_type = Some("event".to_string());
        assert!(NewReview::from_request(event).is_err());

        let ok = NewReview::from_request(request(1, 4, " Great steam room ")).unwrap();
        assert_eq!(ok.comment, "Great steam room");
    }

    #[tokio::test]
    async fn test_create_updates_rating_and_rejects_duplicates() {
        let db = init_memory().await.unwrap();
        let bath_id = insert_bath(&db, "Cedar Banya", 1000).await;
        let first = insert_user(&db, "a@example.com", "secret1").await;
        let second = insert_user(&db, "b@example.com", "secret1").await;

        create(&db, first, NewReview::from_request(request(bath_id, 5, "Wonderful venik")).unwrap())
            .await
            .unwrap();
        create(&db, second, NewReview::from_request(request(bath_id, 4, "Nice but crowded")).unwrap())
            .await
            .unwrap();

        assert!(matches!(
            create(&db, first, NewReview::from_request(request(bath_id, 1, "Changed my mind")).unwrap())
                .await,
            Err(ReviewError::Conflict(ResourceType::Bath))
        ));

        let (rating, count): (f64, i64) =
            sqlx::query_as("SELECT rating, reviews_count FROM baths WHERE id = ?")
                .bind(bath_id)
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(count, 2);
        assert!((rating - 4.5).abs() < f64::EPSILON);

        let listed = list(&db, ResourceType::Bath, bath_id).await.unwrap();
        assert_eq!(listed.stats.total_count, 2);
        assert!((listed.stats.average_rating - 4.5).abs() < f64::EPSILON);
        assert_eq!(listed.reviews.len(), 2);
        assert_eq!(listed.reviews[0].user.name, "Test User");
    }

    #[tokio::test]
    async fn test_missing_entity_and_empty_listing() {
        let db = init_memory().await.unwrap();
        let user = insert_user(&db, "a@example.com", "secret1").await;

        assert!(matches!(
            create(&db, user, NewReview::from_request(request(42, 5, "Wonderful venik")).unwrap()).await,
            Err(ReviewError::NotFound(ResourceType::Bath))
        ));

        let listed = list(&db, ResourceType::Master, 42).await.unwrap();
        assert!(listed.reviews.is_empty());
        assert_eq!(listed.stats.total_count, 0);
        assert_eq!(listed.stats.average_rating, 0.0);
    }
}
