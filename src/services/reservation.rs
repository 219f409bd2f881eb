//! Reservation lifecycle: hold, confirm, direct booking, cancellation and reads.
//!
//! Every write runs in an IMMEDIATE transaction, so the overlap check and the
//! insert it guards cannot interleave with another writer, and capacity moves
//! together with the status change that causes it.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::queries::{self, ConfirmUpdate};
use crate::errors::AppError;
use crate::models::{Payment, Reservation, ReservationStatus, SlotInfo, Spot, User, Vehicle};
use crate::services::overlap::{self, TimeWindow};
use crate::services::spots::{self, CapacityClaim};
use crate::services::{sweeper, vehicles};

const CONFIRMATION_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub user_id: String,
    pub slot_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub hours: Option<f64>,
}

pub type DirectBookRequest = HoldRequest;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldCreated {
    pub reservation_id: String,
    pub amount: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub hold_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booked {
    pub reservation_id: String,
    pub amount: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub confirmation_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSummary {
    pub id: String,
    pub name: String,
    pub address: String,
    pub price: f64,
}

impl From<Spot> for SlotSummary {
    fn from(spot: Spot) -> Self {
        Self {
            id: spot.id,
            name: spot.name,
            address: spot.address,
            price: spot.price,
        }
    }
}

/// Ticket view with references resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    pub reservation_id: String,
    pub status: ReservationStatus,
    pub confirmation_code: Option<String>,
    pub user: Option<User>,
    pub vehicle: Option<Vehicle>,
    pub slot: Option<SlotSummary>,
    pub amount: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub spot_number: Option<String>,
    pub payment: Option<Payment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationSummary {
    pub reservation_id: String,
    pub status: ReservationStatus,
    pub amount: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub confirmation_code: Option<String>,
    pub slot: Option<SlotSummary>,
}

/// Validated slot, window and price shared by both creation paths.
struct Quote {
    slot: SlotInfo,
    vehicle: Vehicle,
    window: TimeWindow,
    amount: f64,
}

fn quote(conn: &Connection, req: &HoldRequest, now: DateTime<Utc>) -> Result<Quote, AppError> {
    let slot_id = required(&req.slot_id, "slotId")?;
    let vehicle_id = required(&req.vehicle_id, "vehicleId")?;
    let hours = overlap::validate_hours(req.hours)?;

    let slot = spots::get_slot(conn, slot_id)?
        .filter(|s| !s.archived)
        .ok_or_else(|| AppError::NotFound("parking slot not found".to_string()))?;
    let vehicle = vehicles::get_vehicle(conn, vehicle_id, &req.user_id)?
        .ok_or_else(|| AppError::NotFound("add or select a valid vehicle".to_string()))?;

    let window = TimeWindow::starting_at(now, hours)?;
    let amount = overlap::quote_amount(slot.price, hours);

    Ok(Quote {
        slot,
        vehicle,
        window,
        amount,
    })
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("{field} is required")))
}

fn new_reservation(
    req: &HoldRequest,
    q: &Quote,
    status: ReservationStatus,
    now: DateTime<Utc>,
) -> Reservation {
    Reservation {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: req.user_id.clone(),
        vehicle_id: q.vehicle.id.clone(),
        slot_id: q.slot.id.clone(),
        status,
        start_time: q.window.start(),
        end_time: q.window.end(),
        amount: q.amount,
        hold_expires_at: None,
        confirmation_code: None,
        payment: None,
        spot_number: None,
        capacity_claimed: false,
        created_at: now,
        updated_at: now,
    }
}

pub fn create_hold(
    conn: &mut Connection,
    req: &HoldRequest,
    hold_duration: Duration,
    now: DateTime<Utc>,
) -> Result<HoldCreated, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let q = quote(&tx, req, now)?;
    let mut hold = new_reservation(req, &q, ReservationStatus::Held, now);
    hold.hold_expires_at = Some(now + hold_duration);

    overlap::reserve_window(&tx, &hold, &now)?;
    tx.commit()?;

    tracing::info!(
        reservation_id = %hold.id,
        slot_id = %hold.slot_id,
        user_id = %hold.user_id,
        amount = hold.amount,
        "hold created"
    );

    Ok(HoldCreated {
        reservation_id: hold.id,
        amount: hold.amount,
        start_time: hold.start_time,
        end_time: hold.end_time,
        hold_expires_at: now + hold_duration,
    })
}

pub fn confirm_hold(
    conn: &mut Connection,
    reservation_id: &str,
    user_id: &str,
    payment_status: Option<String>,
    now: DateTime<Utc>,
) -> Result<ReservationView, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let reservation = queries::get_reservation_for_user(&tx, reservation_id, user_id)?
        .ok_or_else(|| AppError::NotFound("reservation not found".to_string()))?;

    match reservation.status {
        ReservationStatus::Held if reservation.hold_lapsed(&now) => {
            // Reap it now rather than leaving it for the next sweep.
            sweeper::expire_one(&tx, &reservation, &now)?;
            tx.commit()?;
            return Err(hold_expired());
        }
        ReservationStatus::Held => {}
        ReservationStatus::Expired if reservation.confirmation_code.is_none() => {
            return Err(hold_expired());
        }
        _ => {
            return Err(AppError::Conflict(
                "reservation not in held state".to_string(),
            ))
        }
    }

    let slot = spots::get_slot(&tx, &reservation.slot_id)?
        .ok_or_else(|| AppError::NotFound("parking slot not found".to_string()))?;
    sweeper::expire_due(&tx, &now, Some(slot.id.as_str()))?;

    let payment = Payment::offline(payment_status);
    let code = issue_confirmation_code(&tx)?;
    let claim = spots::claim_capacity(&tx, &slot)?;

    let update = ConfirmUpdate {
        payment: &payment,
        confirmation_code: &code,
        spot_number: claim.spot_number.as_deref(),
        capacity_claimed: claim.counter_claimed,
    };
    if !queries::mark_confirmed(&tx, &reservation.id, &update, &now)? {
        return Err(AppError::Conflict(
            "reservation not in held state".to_string(),
        ));
    }

    let view = load_view(&tx, &reservation.id)?;
    tx.commit()?;

    tracing::info!(
        reservation_id = %reservation.id,
        slot_id = %reservation.slot_id,
        payment_status = %payment.status,
        "hold confirmed"
    );
    Ok(view)
}

fn hold_expired() -> AppError {
    AppError::Expired("hold expired, place a new hold".to_string())
}

pub fn direct_book(
    conn: &mut Connection,
    req: &DirectBookRequest,
    now: DateTime<Utc>,
) -> Result<Booked, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let q = quote(&tx, req, now)?;
    // Reclaim first so capacity held by finished bookings is back before the claim.
    overlap::ensure_window_free(&tx, &q.slot.id, &q.window, &now)?;

    let code = issue_confirmation_code(&tx)?;
    let claim = spots::claim_capacity(&tx, &q.slot)?;

    let mut booking = new_reservation(req, &q, ReservationStatus::Confirmed, now);
    booking.confirmation_code = Some(code.clone());
    booking.payment = Some(Payment::cash());
    booking.spot_number = claim.spot_number;
    booking.capacity_claimed = claim.counter_claimed;

    overlap::insert_checked(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(
        reservation_id = %booking.id,
        slot_id = %booking.slot_id,
        user_id = %booking.user_id,
        amount = booking.amount,
        "reservation booked"
    );

    Ok(Booked {
        reservation_id: booking.id,
        amount: booking.amount,
        start_time: booking.start_time,
        end_time: booking.end_time,
        confirmation_code: code,
    })
}

pub fn cancel(
    conn: &mut Connection,
    reservation_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<ReservationView, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let reservation = queries::get_reservation_for_user(&tx, reservation_id, user_id)?
        .ok_or_else(|| AppError::NotFound("reservation not found".to_string()))?;

    if !reservation.status.is_active()
        || !queries::transition_status(
            &tx,
            &reservation.id,
            reservation.status,
            ReservationStatus::Cancelled,
            &now,
        )?
    {
        return Err(AppError::Conflict(format!(
            "reservation already {}",
            reservation.status.as_str()
        )));
    }

    if reservation.status == ReservationStatus::Confirmed {
        let claim = CapacityClaim {
            counter_claimed: reservation.capacity_claimed,
            spot_number: reservation.spot_number.clone(),
        };
        spots::release_capacity(&tx, &reservation.slot_id, &claim)?;
    }

    let view = load_view(&tx, &reservation.id)?;
    tx.commit()?;

    tracing::info!(reservation_id = %reservation.id, "reservation cancelled");
    Ok(view)
}

pub fn get_one(
    conn: &Connection,
    reservation_id: &str,
    user_id: &str,
) -> Result<ReservationView, AppError> {
    let reservation = queries::get_reservation_for_user(conn, reservation_id, user_id)?
        .ok_or_else(|| AppError::NotFound("reservation not found".to_string()))?;
    build_view(conn, reservation)
}

pub fn list_mine(conn: &Connection, user_id: &str) -> Result<Vec<ReservationSummary>, AppError> {
    let reservations = queries::list_reservations_for_user(conn, user_id)?;

    let mut summaries = Vec::with_capacity(reservations.len());
    for r in reservations {
        let slot = queries::get_spot(conn, &r.slot_id)?.map(SlotSummary::from);
        summaries.push(ReservationSummary {
            reservation_id: r.id,
            status: r.status,
            amount: r.amount,
            start_time: r.start_time,
            end_time: r.end_time,
            confirmation_code: r.confirmation_code,
            slot,
        });
    }
    Ok(summaries)
}

fn load_view(conn: &Connection, reservation_id: &str) -> Result<ReservationView, AppError> {
    let reservation = queries::get_reservation(conn, reservation_id)?
        .ok_or_else(|| AppError::NotFound("reservation not found".to_string()))?;
    build_view(conn, reservation)
}

fn build_view(conn: &Connection, r: Reservation) -> Result<ReservationView, AppError> {
    let user = queries::get_user(conn, &r.user_id)?;
    let vehicle = queries::get_vehicle_for_user(conn, &r.vehicle_id, &r.user_id)?;
    let slot = queries::get_spot(conn, &r.slot_id)?.map(SlotSummary::from);

    Ok(ReservationView {
        reservation_id: r.id,
        status: r.status,
        confirmation_code: r.confirmation_code,
        user,
        vehicle,
        slot,
        amount: r.amount,
        start_time: r.start_time,
        end_time: r.end_time,
        hold_expires_at: r.hold_expires_at,
        spot_number: r.spot_number,
        payment: r.payment,
    })
}

/// 4 random bytes as 8 upper-case hex characters.
pub fn generate_confirmation_code() -> String {
    let bytes: [u8; 4] = rand::random();
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn issue_confirmation_code(conn: &Connection) -> Result<String, AppError> {
    for _ in 0..CONFIRMATION_CODE_ATTEMPTS {
        let code = generate_confirmation_code();
        if !queries::confirmation_code_taken(conn, &code)? {
            return Ok(code);
        }
        tracing::warn!("confirmation code collision, retrying");
    }
    Err(AppError::Internal(anyhow::anyhow!(
        "could not issue a unique confirmation code"
    )))
}
