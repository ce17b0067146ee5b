//! Creating, listing and moving bookings through their statuses.
//!
//! Every operation is scoped to the requesting user. A booking owned by
//! someone else is reported exactly like a missing one.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use super::availability::{self, parse_date, TimeRange, DATE_FORMAT};
use super::{pricing, BookingError};
use crate::db::{
    begin_immediate, timestamp, Booking, BookingListQuery, BookingStatus, CreateBookingRequest, DbPool,
    ResourceType,
};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Validated booking request
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub resource_type: ResourceType,
    pub entity_id: i64,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub guests_count: i64,
    pub notes: String,
}

impl NewBooking {
    /// Validate a raw request; `today` is the earliest bookable date
    pub fn from_request(req: CreateBookingRequest, today: NaiveDate) -> Result<Self, BookingError> {
        let (Some(booking_type), Some(entity_id), Some(date), Some(start), Some(end)) = (
            req.booking_type,
            req.entity_id,
            req.booking_date,
            req.start_time,
            req.end_time,
        ) else {
            return Err(BookingError::Validation(
                "booking_type, entity_id, booking_date, start_time and end_time are required"
                    .to_string(),
            ));
        };

        let resource_type: ResourceType = booking_type
            .parse()
            .map_err(|_| BookingError::Validation("booking_type must be 'bath' or 'master'".to_string()))?;

        if entity_id <= 0 {
            return Err(BookingError::Validation("entity_id must be positive".to_string()));
        }

        let date = parse_date(&date)?;
        if date < today {
            return Err(BookingError::Validation(
                "booking_date cannot be in the past".to_string(),
            ));
        }

        let range = TimeRange::parse(&start, &end)?;

        let guests_count = req.guests_count.unwrap_or(1);
        if guests_count < 1 {
            return Err(BookingError::Validation("guests_count must be at least 1".to_string()));
        }

        Ok(Self {
            resource_type,
            entity_id,
            date,
            range,
            guests_count,
            notes: req.notes.unwrap_or_default(),
        })
    }
}

/// Editable fields of an existing booking
#[derive(Debug, Clone, Default)]
pub struct BookingEdit {
    pub guests_count: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub resource_type: Option<ResourceType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: i64,
    pub offset: i64,
}

impl BookingFilter {
    pub fn from_query(query: &BookingListQuery) -> Result<Self, BookingError> {
        let status = query
            .status
            .as_deref()
            .map(str::parse::<BookingStatus>)
            .transpose()
            .map_err(BookingError::Validation)?;
        let resource_type = query
            .booking_type
            .as_deref()
            .map(str::parse::<ResourceType>)
            .transpose()
            .map_err(BookingError::Validation)?;
        let date_from = query.date_from.as_deref().map(parse_date).transpose()?;
        let date_to = query.date_to.as_deref().map(parse_date).transpose()?;

        Ok(Self {
            status,
            resource_type,
            date_from,
            date_to,
            limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: query.offset.unwrap_or(0).max(0),
        })
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Sqlite>, user_id: i64) {
        query.push(" WHERE user_id = ");
        query.push_bind(user_id);

        if let Some(status) = self.status {
            query.push(" AND status = ");
            query.push_bind(status.as_str());
        }
        if let Some(resource_type) = self.resource_type {
            query.push(" AND booking_type = ");
            query.push_bind(resource_type.as_str());
        }
        if let Some(from) = self.date_from {
            query.push(" AND booking_date >= ");
            query.push_bind(from.format(DATE_FORMAT).to_string());
        }
        if let Some(to) = self.date_to {
            query.push(" AND booking_date <= ");
            query.push_bind(to.format(DATE_FORMAT).to_string());
        }
    }
}

/// Reserve a slot.
///
/// The availability check, the price lookup and the insert share one
/// write-locked transaction, so concurrent requests for the same slot are
/// serialized and every loser sees the winner's row. The schema's overlap
/// trigger backs the check for writers outside this module.
pub async fn create(db: &DbPool, user_id: i64, booking: NewBooking) -> Result<Booking, BookingError> {
    create_at(db, user_id, booking, Utc::now()).await
}

pub async fn create_at(
    db: &DbPool,
    user_id: i64,
    booking: NewBooking,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    let mut tx = begin_immediate(db).await?;

    let free = availability::is_available(
        &mut *tx,
        booking.resource_type,
        booking.entity_id,
        booking.date,
        &booking.range,
        None,
    )
    .await?;
    if !free {
        return Err(BookingError::SlotConflict);
    }

    let rate_sql = format!(
        "SELECT price_per_hour FROM {} WHERE id = ? AND is_active = 1",
        booking.resource_type.table()
    );
    let rate: Option<i64> = sqlx::query_scalar(&rate_sql)
        .bind(booking.entity_id)
        .fetch_optional(&mut *tx)
        .await?;
    let rate = rate.ok_or(BookingError::ResourceNotFound)?;

    let total_price = pricing::total_price(rate, &booking.range);
    let now = timestamp(now);

    let created: Booking = sqlx::query_as(
        r#"
        INSERT INTO bookings (user_id, booking_type, entity_id, booking_date, start_time, end_time,
                              guests_count, total_price, status, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(booking.resource_type.as_str())
    .bind(booking.entity_id)
    .bind(booking.date.format(DATE_FORMAT).to_string())
    .bind(booking.range.start_str())
    .bind(booking.range.end_str())
    .bind(booking.guests_count)
    .bind(total_price)
    .bind(&booking.notes)
    .bind(&now)
    .bind(&now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        booking_id = created.id,
        user_id,
        booking_type = %booking.resource_type,
        entity_id = booking.entity_id,
        total_price,
        "Booking created"
    );

    Ok(created)
}

pub async fn get(db: &DbPool, booking_id: i64, user_id: i64) -> Result<Booking, BookingError> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ? AND user_id = ?")
        .bind(booking_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(BookingError::NotFound)
}

/// A page of the user's bookings, newest date first, plus the total match count
pub async fn list(
    db: &DbPool,
    user_id: i64,
    filter: &BookingFilter,
) -> Result<(Vec<Booking>, i64), BookingError> {
    let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM bookings");
    filter.push_conditions(&mut count_query, user_id);
    let total: (i64,) = count_query.build_query_as().fetch_one(db).await?;

    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM bookings");
    filter.push_conditions(&mut query, user_id);
    query.push(" ORDER BY booking_date DESC, start_time DESC LIMIT ");
    query.push_bind(filter.limit);
    query.push(" OFFSET ");
    query.push_bind(filter.offset);

    let items = query.build_query_as::<Booking>().fetch_all(db).await?;
    Ok((items, total.0))
}

/// Move a booking to `next`; canceling goes through [`cancel`]
pub async fn update_status(
    db: &DbPool,
    booking_id: i64,
    user_id: i64,
    next: BookingStatus,
) -> Result<Booking, BookingError> {
    update_status_at(db, booking_id, user_id, next, Utc::now()).await
}

pub async fn update_status_at(
    db: &DbPool,
    booking_id: i64,
    user_id: i64,
    next: BookingStatus,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    if next == BookingStatus::Canceled {
        return cancel_at(db, booking_id, user_id, None, now).await;
    }

    let mut tx = begin_immediate(db).await?;

    let current: Booking = sqlx::query_as("SELECT * FROM bookings WHERE id = ? AND user_id = ?")
        .bind(booking_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BookingError::NotFound)?;

    let from = current.status_enum();
    if !from.can_transition_to(next) {
        return Err(BookingError::InvalidTransition { from, to: next });
    }

    let updated: Booking = sqlx::query_as(
        "UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(next.as_str())
    .bind(timestamp(now))
    .bind(booking_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    debug!(booking_id, %from, to = %next, "Booking status changed");
    Ok(updated)
}

/// Cancel a booking, freeing its slot.
///
/// A second cancel fails with `AlreadyCanceled`.
pub async fn cancel(
    db: &DbPool,
    booking_id: i64,
    user_id: i64,
    reason: Option<String>,
) -> Result<Booking, BookingError> {
    cancel_at(db, booking_id, user_id, reason, Utc::now()).await
}

pub async fn cancel_at(
    db: &DbPool,
    booking_id: i64,
    user_id: i64,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    let mut tx = begin_immediate(db).await?;

    let current: Booking = sqlx::query_as("SELECT * FROM bookings WHERE id = ? AND user_id = ?")
        .bind(booking_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BookingError::NotFound)?;

    let from = current.status_enum();
    if from == BookingStatus::Canceled {
        return Err(BookingError::AlreadyCanceled);
    }
    if from.is_terminal() {
        return Err(BookingError::InvalidTransition {
            from,
            to: BookingStatus::Canceled,
        });
    }

    let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    let now = timestamp(now);

    let canceled: Booking = sqlx::query_as(
        r#"
        UPDATE bookings
        SET status = 'canceled', canceled_at = ?1, cancellation_reason = ?2, updated_at = ?1
        WHERE id = ?3
        RETURNING *
        "#,
    )
    .bind(&now)
    .bind(&reason)
    .bind(booking_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(booking_id, user_id, "Booking canceled");
    Ok(canceled)
}

/// Change guest count or notes of an active booking.
///
/// The time range and price are fixed once created; moving a booking means
/// canceling it and booking again.
pub async fn update_fields(
    db: &DbPool,
    booking_id: i64,
    user_id: i64,
    edit: BookingEdit,
) -> Result<Booking, BookingError> {
    if edit.guests_count.is_none() && edit.notes.is_none() {
        return Err(BookingError::Validation(
            "nothing to update: provide guests_count or notes".to_string(),
        ));
    }
    if matches!(edit.guests_count, Some(n) if n < 1) {
        return Err(BookingError::Validation("guests_count must be at least 1".to_string()));
    }

    let mut tx = begin_immediate(db).await?;

    let current: Booking = sqlx::query_as("SELECT * FROM bookings WHERE id = ? AND user_id = ?")
        .bind(booking_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BookingError::NotFound)?;

    let status = current.status_enum();
    if !status.is_active() {
        return Err(BookingError::NotEditable(status));
    }

    let updated: Booking = sqlx::query_as(
        r#"
        UPDATE bookings
        SET guests_count = ?, notes = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(edit.guests_count.unwrap_or(current.guests_count))
    .bind(edit.notes.unwrap_or(current.notes))
    .bind(timestamp(Utc::now()))
    .bind(booking_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;
    use crate::test_utils::{file_db, insert_bath, insert_master, insert_user};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn request(entity_id: i64, date: &str, start: &str, end: &str) -> CreateBookingRequest {
        CreateBookingRequest {
            booking_type: Some("bath".to_string()),
            entity_id: Some(entity_id),
            booking_date: Some(date.to_string()),
            start_time: Some(start.to_string()),
            end_time: Some(end.to_string()),
            guests_count: None,
            notes: None,
        }
    }

    fn new_bath(entity_id: i64, start: &str, end: &str) -> NewBooking {
        NewBooking::from_request(request(entity_id, "2024-06-01", start, end), today()).unwrap()
    }

    async fn setup() -> (DbPool, i64, i64) {
        let db = init_memory().await.unwrap();
        let user_id = insert_user(&db, "guest@example.com", "secret1").await;
        let bath_id = insert_bath(&db, "Cedar Banya", 1000).await;
        (db, user_id, bath_id)
    }

    #[test]
    fn test_request_validation() {
        let missing = CreateBookingRequest::default();
        assert!(matches!(
            NewBooking::from_request(missing, today()),
            Err(BookingError::Validation(_))
        ));

        let mut bad_type = request(1, "2024-06-01", "10:00", "11:00");
        bad_type.booking_type = Some("event".to_string());
        assert!(NewBooking::from_request(bad_type, today()).is_err());

        let past = request(1, "2024-04-30", "10:00", "11:00");
        assert!(NewBooking::from_request(past, today()).is_err());

        let inverted = request(1, "2024-06-01", "11:00", "10:00");
        assert!(NewBooking::from_request(inverted, today()).is_err());

        let mut no_guests = request(1, "2024-06-01", "10:00", "11:00");
        no_guests.guests_count = Some(0);
        assert!(NewBooking::from_request(no_guests, today()).is_err());

        let ok = NewBooking::from_request(request(1, "2024-05-01", "10:00", "11:00"), today()).unwrap();
        assert_eq!(ok.guests_count, 1);
        assert_eq!(ok.notes, "");
    }

    #[tokio::test]
    async fn test_overlapping_request_is_rejected() {
        let (db, user_id, bath_id) = setup().await;

        let first = create(&db, user_id, new_bath(bath_id, "14:00", "16:00")).await.unwrap();
        assert_eq!(first.total_price, 2000);
        assert_eq!(first.status, "pending");
        assert_eq!(first.start_time, "14:00");

        assert!(matches!(
            create(&db, user_id, new_bath(bath_id, "15:00", "17:00")).await,
            Err(BookingError::SlotConflict)
        ));
    }

    #[tokio::test]
    async fn test_touching_slots_both_succeed() {
        let (db, user_id, bath_id) = setup().await;
        create(&db, user_id, new_bath(bath_id, "14:00", "16:00")).await.unwrap();

        assert!(create(&db, user_id, new_bath(bath_id, "16:00", "18:00")).await.is_ok());
        assert!(create(&db, user_id, new_bath(bath_id, "12:00", "14:00")).await.is_ok());
        assert!(matches!(
            create(&db, user_id, new_bath(bath_id, "13:00", "14:30")).await,
            Err(BookingError::SlotConflict)
        ));
    }

    #[tokio::test]
    async fn test_slots_are_per_resource_type_and_date() {
        let (db, user_id, bath_id) = setup().await;
        let master_id = insert_master(&db, "Ivan Petrov", 2000).await;
        create(&db, user_id, new_bath(bath_id, "14:00", "16:00")).await.unwrap();

        let other_day =
            NewBooking::from_request(request(bath_id, "2024-06-02", "14:00", "16:00"), today()).unwrap();
        assert!(create(&db, user_id, other_day).await.is_ok());

        let mut master_req = request(master_id, "2024-06-01", "14:00", "15:30");
        master_req.booking_type = Some("master".to_string());
        let master = create(&db, user_id, NewBooking::from_request(master_req, today()).unwrap())
            .await
            .unwrap();
        assert_eq!(master.total_price, 3000);
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_resource() {
        let (db, user_id, bath_id) = setup().await;
        assert!(matches!(
            create(&db, user_id, new_bath(bath_id + 100, "10:00", "11:00")).await,
            Err(BookingError::ResourceNotFound)
        ));

        sqlx::query("UPDATE baths SET is_active = 0 WHERE id = ?")
            .bind(bath_id)
            .execute(&db)
            .await
            .unwrap();
        assert!(matches!(
            create(&db, user_id, new_bath(bath_id, "10:00", "11:00")).await,
            Err(BookingError::ResourceNotFound)
        ));
    }

    #[tokio::test]
    async fn test_trigger_guards_direct_inserts() {
        let (db, user_id, bath_id) = setup().await;
        create(&db, user_id, new_bath(bath_id, "14:00", "16:00")).await.unwrap();

        let err = sqlx::query(
            r#"
            INSERT INTO bookings (user_id, booking_type, entity_id, booking_date, start_time, end_time,
                                  total_price, created_at, updated_at)
            VALUES (?, 'bath', ?, '2024-06-01', '15:00', '17:00', 2000, 'x', 'x')
            "#,
        )
        .bind(user_id)
        .bind(bath_id)
        .execute(&db)
        .await
        .unwrap_err();
        assert!(matches!(BookingError::from(err), BookingError::SlotConflict));
    }

    #[tokio::test]
    async fn test_cancel_frees_slot_and_is_not_repeatable() {
        let (db, user_id, bath_id) = setup().await;
        let booking = create(&db, user_id, new_bath(bath_id, "14:00", "16:00")).await.unwrap();

        let canceled = cancel(&db, booking.id, user_id, Some("  plans changed ".to_string()))
            .await
            .unwrap();
        assert_eq!(canceled.status, "canceled");
        assert!(canceled.canceled_at.is_some());
        assert_eq!(canceled.cancellation_reason.as_deref(), Some("plans changed"));

        assert!(matches!(
            cancel(&db, booking.id, user_id, None).await,
            Err(BookingError::AlreadyCanceled)
        ));

        assert!(create(&db, user_id, new_bath(bath_id, "15:00", "17:00")).await.is_ok());
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (db, user_id, bath_id) = setup().await;
        let booking = create(&db, user_id, new_bath(bath_id, "10:00", "11:00")).await.unwrap();

        assert!(matches!(
            update_status(&db, booking.id, user_id, BookingStatus::Completed).await,
            Err(BookingError::InvalidTransition { .. })
        ));

        let confirmed = update_status(&db, booking.id, user_id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, "confirmed");

        let completed = update_status(&db, booking.id, user_id, BookingStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status, "completed");

        assert!(matches!(
            cancel(&db, booking.id, user_id, None).await,
            Err(BookingError::InvalidTransition { .. })
        ));
        assert!(matches!(
            update_status(&db, booking.id, user_id, BookingStatus::Pending).await,
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_status_cancel_goes_through_cancel_path() {
        let (db, user_id, bath_id) = setup().await;
        let booking = create(&db, user_id, new_bath(bath_id, "10:00", "11:00")).await.unwrap();

        let canceled = update_status(&db, booking.id, user_id, BookingStatus::Canceled)
            .await
            .unwrap();
        assert!(canceled.canceled_at.is_some());
        assert!(matches!(
            update_status(&db, booking.id, user_id, BookingStatus::Confirmed).await,
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_other_users_bookings_look_missing() {
        let (db, user_id, bath_id) = setup().await;
        let stranger = insert_user(&db, "stranger@example.com", "secret1").await;
        let booking = create(&db, user_id, new_bath(bath_id, "10:00", "11:00")).await.unwrap();

        assert!(matches!(get(&db, booking.id, stranger).await, Err(BookingError::NotFound)));
        assert!(matches!(
            cancel(&db, booking.id, stranger, None).await,
            Err(BookingError::NotFound)
        ));
        assert!(matches!(
            update_status(&db, booking.id, stranger, BookingStatus::Confirmed).await,
            Err(BookingError::NotFound)
        ));
        let edit = BookingEdit {
            notes: Some("mine now".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            update_fields(&db, booking.id, stranger, edit).await,
            Err(BookingError::NotFound)
        ));
        assert!(matches!(get(&db, 9999, user_id).await, Err(BookingError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_fields_keeps_slot_and_price() {
        let (db, user_id, bath_id) = setup().await;
        let booking = create(&db, user_id, new_bath(bath_id, "10:00", "11:30")).await.unwrap();
        assert_eq!(booking.total_price, 1500);

        let edit = BookingEdit {
            guests_count: Some(4),
            notes: None,
        };
        let updated = update_fields(&db, booking.id, user_id, edit).await.unwrap();
        assert_eq!(updated.guests_count, 4);
        assert_eq!(updated.start_time, "10:00");
        assert_eq!(updated.end_time, "11:30");
        assert_eq!(updated.total_price, 1500);

        assert!(matches!(
            update_fields(&db, booking.id, user_id, BookingEdit::default()).await,
            Err(BookingError::Validation(_))
        ));

        cancel(&db, booking.id, user_id, None).await.unwrap();
        let edit = BookingEdit {
            notes: Some("late".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            update_fields(&db, booking.id, user_id, edit).await,
            Err(BookingError::NotEditable(BookingStatus::Canceled))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let (db, user_id, bath_id) = setup().await;
        let other = insert_user(&db, "other@example.com", "secret1").await;

        let first = create(&db, user_id, new_bath(bath_id, "10:00", "11:00")).await.unwrap();
        create(&db, user_id, new_bath(bath_id, "12:00", "13:00")).await.unwrap();
        let later =
            NewBooking::from_request(request(bath_id, "2024-06-03", "10:00", "11:00"), today()).unwrap();
        create(&db, user_id, later).await.unwrap();
        create(&db, other, new_bath(bath_id, "15:00", "16:00")).await.unwrap();
        cancel(&db, first.id, user_id, None).await.unwrap();

        let all = BookingFilter::from_query(&BookingListQuery::default()).unwrap();
        let (items, total) = list(&db, user_id, &all).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(items[0].booking_date, "2024-06-03");
        assert_eq!(items[1].start_time, "12:00");

        let pending = BookingFilter::from_query(&BookingListQuery {
            status: Some("pending".to_string()),
            date_to: Some("2024-06-01".to_string()),
            ..Default::default()
        })
        .unwrap();
        let (items, total) = list(&db, user_id, &pending).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].start_time, "12:00");

        let page = BookingFilter::from_query(&BookingListQuery {
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        })
        .unwrap();
        let (items, total) = list(&db, user_id, &page).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(items.len(), 1);

        assert!(BookingFilter::from_query(&BookingListQuery {
            status: Some("archived".to_string()),
            ..Default::default()
        })
        .is_err());
    }

    #[tokio::test]
    async fn test_booking_until_midnight() {
        let (db, user_id, bath_id) = setup().await;
        let late = create(&db, user_id, new_bath(bath_id, "22:00", "24:00")).await.unwrap();
        assert_eq!(late.end_time, "24:00");
        assert_eq!(late.total_price, 2000);

        assert!(matches!(
            create(&db, user_id, new_bath(bath_id, "23:30", "24:00")).await,
            Err(BookingError::SlotConflict)
        ));
        assert!(create(&db, user_id, new_bath(bath_id, "20:00", "22:00")).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_creates() {
        let (_dir, db) = file_db().await;
        let user_id = insert_user(&db, "guest@example.com", "secret1").await;
        let bath_id = insert_bath(&db, "Cedar Banya", 1000).await;

        for day in 1..=10 {
            let date = format!("2024-06-{:02}", day);
            let attempts: Vec<_> = (0..4)
                .map(|i| {
                    let db = db.clone();
                    let (start, end) = if i % 2 == 0 { ("10:00", "12:00") } else { ("11:00", "13:00") };
                    let booking =
                        NewBooking::from_request(request(bath_id, &date, start, end), today()).unwrap();
                    tokio::spawn(async move { create(&db, user_id, booking).await })
                })
                .collect();

            let (mut created, mut conflicts) = (0, 0);
            for attempt in attempts {
                match attempt.await.unwrap() {
                    Ok(_) => created += 1,
                    Err(BookingError::SlotConflict) => conflicts += 1,
                    Err(e) => panic!("unexpected error on {}: {:?}", date, e),
                }
            }
            assert_eq!((created, conflicts), (1, 3), "day {}", date);
        }

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(rows, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cancels_report_already_canceled() {
        let (_dir, db) = file_db().await;
        let user_id = insert_user(&db, "guest@example.com", "secret1").await;
        let bath_id = insert_bath(&db, "Cedar Banya", 1000).await;
        let booking_id = create(&db, user_id, new_bath(bath_id, "10:00", "11:00")).await.unwrap().id;

        let attempts: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { cancel(&db, booking_id, user_id, None).await })
            })
            .collect();

        let (mut canceled, mut repeated) = (0, 0);
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => canceled += 1,
                Err(BookingError::AlreadyCanceled) => repeated += 1,
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }
        assert_eq!((canceled, repeated), (1, 3));
    }

    #[test]
    fn test_page_size_is_capped() {
        let filter = BookingFilter::from_query(&BookingListQuery {
            limit: Some(1000),
            offset: Some(-5),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.offset, 0);
    }
}
