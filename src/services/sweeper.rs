//! Reclaims lapsed holds and finished bookings.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Reservation, ReservationStatus};
use crate::services::spots::{self, CapacityClaim};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub expired_holds: usize,
    pub finished_bookings: usize,
    pub released_slots: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_holds == 0 && self.finished_bookings == 0
    }

    fn absorb(&mut self, other: SweepReport) {
        self.expired_holds += other.expired_holds;
        self.finished_bookings += other.finished_bookings;
        self.released_slots += other.released_slots;
    }
}

/// One sweep pass as a single write transaction.
pub fn sweep_once(conn: &mut Connection, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let report = expire_due(&tx, &now, None)?;
    tx.commit()?;
    Ok(report)
}

/// Expires every due reservation, or only those on `slot_id`. Caller owns the transaction.
pub(crate) fn expire_due(
    conn: &Connection,
    now: &DateTime<Utc>,
    slot_id: Option<&str>,
) -> Result<SweepReport, AppError> {
    let mut report = SweepReport::default();
    for reservation in queries::list_expirable(conn, now, slot_id)? {
        report.absorb(expire_one(conn, &reservation, now)?);
    }
    Ok(report)
}

/// Moves one active reservation to `expired` and gives back any capacity it held.
/// A reservation that already left its active state is skipped.
pub(crate) fn expire_one(
    conn: &Connection,
    reservation: &Reservation,
    now: &DateTime<Utc>,
) -> Result<SweepReport, AppError> {
    let mut report = SweepReport::default();
    if !reservation.status.is_active()
        || !queries::transition_status(
            conn,
            &reservation.id,
            reservation.status,
            ReservationStatus::Expired,
            now,
        )?
    {
        return Ok(report);
    }

    match reservation.status {
        ReservationStatus::Held => report.expired_holds += 1,
        _ => report.finished_bookings += 1,
    }

    if reservation.status == ReservationStatus::Confirmed {
        let claim = CapacityClaim {
            counter_claimed: reservation.capacity_claimed,
            spot_number: reservation.spot_number.clone(),
        };
        if spots::release_capacity(conn, &reservation.slot_id, &claim)? {
            report.released_slots += 1;
        }
    }

    tracing::debug!(
        reservation_id = %reservation.id,
        from = reservation.status.as_str(),
        "reservation expired"
    );
    Ok(report)
}

/// Background task that runs [`sweep_once`] on a fixed interval until shut down.
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    pub fn spawn(db: Arc<Mutex<Connection>>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(db, interval, shutdown_rx));
        tracing::info!(interval_secs = interval.as_secs(), "expiry sweeper started");
        Self {
            shutdown_tx,
            handle,
        }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "expiry sweeper task failed");
        }
        tracing::info!("expiry sweeper stopped");
    }
}

async fn run(db: Arc<Mutex<Connection>>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => run_pass(&db),
        }
    }
}

fn run_pass(db: &Mutex<Connection>) {
    let result = match db.lock() {
        Ok(mut conn) => sweep_once(&mut conn, Utc::now()),
        Err(_) => Err(AppError::Internal(anyhow::anyhow!("database mutex poisoned"))),
    };

    match result {
        Ok(report) if report.is_empty() => tracing::trace!("expiry sweep found nothing due"),
        Ok(report) => tracing::info!(
            expired_holds = report.expired_holds,
            finished_bookings = report.finished_bookings,
            released_slots = report.released_slots,
            "expiry sweep completed"
        ),
        Err(e) => tracing::error!(error = %e, "expiry sweep failed, retrying next cycle"),
    }
}
