use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Reservation;
use crate::services::sweeper;

/// Longest booking accepted in one request.
pub const MAX_HOURS: f64 = 720.0;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn starting_at(start: DateTime<Utc>, hours: f64) -> Result<Self, AppError> {
        let millis = (hours * 3_600_000.0).round() as i64;
        Self::new(start, start + Duration::milliseconds(millis))
            .ok_or_else(|| AppError::InvalidInput("hours must be greater than zero".to_string()))
    }

    pub fn of(reservation: &Reservation) -> Self {
        Self {
            start: reservation.start_time,
            end: reservation.end_time,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// `[a,b)` and `[c,d)` overlap iff `a < d && c < b`; touching ends do not.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

pub fn validate_hours(hours: Option<f64>) -> Result<f64, AppError> {
    match hours {
        None => Err(AppError::InvalidInput("hours is required".to_string())),
        Some(h) if !h.is_finite() || h <= 0.0 => Err(AppError::InvalidInput(
            "hours must be greater than zero".to_string(),
        )),
        Some(h) if h > MAX_HOURS => Err(AppError::InvalidInput(format!(
            "hours must not exceed {MAX_HOURS}"
        ))),
        Some(h) => Ok(h),
    }
}

pub fn quote_amount(price_per_hour: f64, hours: f64) -> f64 {
    price_per_hour.max(0.0) * hours.max(0.0)
}

/// Fails with `Conflict` unless `window` is free on `slot_id`.
///
/// Must run inside the caller's write transaction. Lapsed holds and finished
/// bookings on the slot are reclaimed first, so their capacity is back before
/// the caller claims any.
pub fn ensure_window_free(
    conn: &Connection,
    slot_id: &str,
    window: &TimeWindow,
    now: &DateTime<Utc>,
) -> Result<(), AppError> {
    let reclaimed = sweeper::expire_due(conn, now, Some(slot_id))?;
    if !reclaimed.is_empty() {
        tracing::debug!(
            slot_id = %slot_id,
            expired_holds = reclaimed.expired_holds,
            finished_bookings = reclaimed.finished_bookings,
            "reclaimed due reservations before reserving"
        );
    }

    let clash = queries::list_active_ending_after(conn, slot_id, &window.start)?
        .into_iter()
        .find(|r| window.overlaps(&TimeWindow::of(r)));
    if let Some(clash) = clash {
        tracing::info!(
            slot_id = %slot_id,
            clashing_id = %clash.id,
            "slot not available for requested window"
        );
        return Err(slot_taken());
    }
    Ok(())
}

/// Inserts a reservation whose window was checked in the same transaction.
/// The `reservations_no_overlap_insert` trigger backs the check up at the storage layer.
pub fn insert_checked(conn: &Connection, candidate: &Reservation) -> Result<(), AppError> {
    queries::insert_reservation(conn, candidate).map_err(|e| {
        if is_overlap_violation(&e) {
            slot_taken()
        } else {
            AppError::Database(e)
        }
    })
}

/// Inserts `candidate` if no active reservation on its slot overlaps its window.
pub fn reserve_window(
    conn: &Connection,
    candidate: &Reservation,
    now: &DateTime<Utc>,
) -> Result<(), AppError> {
    ensure_window_free(conn, &candidate.slot_id, &TimeWindow::of(candidate), now)?;
    insert_checked(conn, candidate)
}

fn slot_taken() -> AppError {
    AppError::Conflict("slot not available for selected time".to_string())
}

fn is_overlap_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, Some(msg)) => {
            err.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("overlaps an active reservation")
        }
        _ => false,
    }
}
