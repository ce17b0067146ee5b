//! Slot availability for bookable resources.

use chrono::NaiveDate;
use sqlx::{Executor, Sqlite};

use super::BookingError;
use crate::db::ResourceType;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Half-open interval `[start, end)` within one day, in minutes since
/// midnight. `end` may be `24:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: u32,
    pub end: u32,
}

impl TimeRange {
    /// Build a range, rejecting empty and inverted intervals
    pub fn new(start: u32, end: u32) -> Result<Self, BookingError> {
        if start >= MINUTES_PER_DAY {
            return Err(BookingError::Validation(
                "start_time must be before 24:00".to_string(),
            ));
        }
        if end <= start {
            return Err(BookingError::Validation(
                "end_time must be after start_time".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Parse `HH:MM` bounds
    pub fn parse(start: &str, end: &str) -> Result<Self, BookingError> {
        Self::new(parse_time(start)?, parse_time(end)?)
    }

    pub fn minutes(&self) -> i64 {
        i64::from(self.end - self.start)
    }

    /// Touching intervals do not overlap
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn start_str(&self) -> String {
        format_time(self.start)
    }

    pub fn end_str(&self) -> String {
        format_time(self.end)
    }
}

/// Minutes since midnight for `HH:MM`; `24:00` is the end of the day
pub fn parse_time(value: &str) -> Result<u32, BookingError> {
    let invalid = || BookingError::Validation(format!("Invalid time '{}', expected HH:MM", value));

    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    let field = |part: &str| -> Option<u32> {
        if (1..=2).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit()) {
            part.parse().ok()
        } else {
            None
        }
    };
    let (hours, minutes) = match (field(hours), field(minutes)) {
        (Some(h), Some(m)) if h < 24 && m < 60 => (h, m),
        (Some(24), Some(0)) => (24, 0),
        _ => return Err(invalid()),
    };
    Ok(hours * 60 + minutes)
}

fn format_time(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn parse_date(value: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        BookingError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", value))
    })
}

/// Whether `range` is free on the resource for `date`.
///
/// Only pending and confirmed bookings hold a slot. `exclude` skips the
/// booking being edited. Times are stored zero-padded, so the SQL string
/// comparison is a time comparison.
pub async fn is_available<'e, E>(
    executor: E,
    resource_type: ResourceType,
    entity_id: i64,
    date: NaiveDate,
    range: &TimeRange,
    exclude: Option<i64>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let conflicts: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM bookings
        WHERE booking_type = ?1
          AND entity_id = ?2
          AND booking_date = ?3
          AND status IN ('pending', 'confirmed')
          AND start_time < ?5
          AND ?4 < end_time
          AND (?6 IS NULL OR id != ?6)
        "#,
    )
    .bind(resource_type.as_str())
    .bind(entity_id)
    .bind(date.format(DATE_FORMAT).to_string())
    .bind(range.start_str())
    .bind(range.end_str())
    .bind(exclude)
    .fetch_one(executor)
    .await?;

    Ok(conflicts == 0)
}
