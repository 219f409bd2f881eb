use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{CapacityModel, SlotEntry, SlotInfo, SlotStatus, Spot};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSpot {
    pub name: Option<String>,
    pub address: Option<String>,
    pub price: Option<f64>,
    #[serde(default)]
    pub total_slots: i64,
    pub available_slots: Option<i64>,
    #[serde(default)]
    pub per_slot: bool,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub price: Option<f64>,
    pub archived: Option<bool>,
    pub total_slots: Option<i64>,
    pub available_slots: Option<i64>,
}

/// Capacity taken from a spot on behalf of one reservation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapacityClaim {
    pub counter_claimed: bool,
    pub spot_number: Option<String>,
}

pub fn create_spot(conn: &Connection, new: NewSpot) -> Result<Spot, AppError> {
    let name = new
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::InvalidInput("name is required".to_string()))?;
    let price = new
        .price
        .ok_or_else(|| AppError::InvalidInput("price is required".to_string()))
        .and_then(checked_price)?;

    let total = new.total_slots.max(0);
    let available = new.available_slots.unwrap_or(total).clamp(0, total);
    let spots = if new.per_slot {
        numbered_entries(total)
    } else {
        vec![]
    };

    let spot = Spot {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        address: address_or_default(new.address),
        price,
        archived: false,
        total_slots: total,
        available_slots: available,
        spots,
    };
    queries::insert_spot(conn, &spot)?;

    tracing::info!(spot_id = %spot.id, total_slots = total, "spot created");
    Ok(spot)
}

fn checked_price(price: f64) -> Result<f64, AppError> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(AppError::InvalidInput(
            "price must be a non-negative number".to_string(),
        ))
    }
}

fn address_or_default(address: Option<String>) -> String {
    address
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| "N/A".to_string())
}

fn numbered_entries(count: i64) -> Vec<SlotEntry> {
    numbered_range(1, count)
}

fn numbered_range(first: i64, last: i64) -> Vec<SlotEntry> {
    (first..=last)
        .map(|i| SlotEntry {
            spot_number: format!("P{i}"),
            pillar: "P".to_string(),
            status: SlotStatus::Available,
        })
        .collect()
}

pub fn update_spot(conn: &mut Connection, id: &str, update: SpotUpdate) -> Result<Spot, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut spot = get_spot(&tx, id)?;

    if let Some(name) = update.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidInput("name must not be blank".to_string()));
        }
        spot.name = name;
    }
    if update.address.is_some() {
        spot.address = address_or_default(update.address);
    }
    if let Some(price) = update.price {
        spot.price = checked_price(price)?;
    }
    if let Some(archived) = update.archived {
        spot.archived = archived;
    }
    if let Some(total) = update.total_slots {
        resize(&tx, &mut spot, total.max(0))?;
    }
    if let Some(available) = update.available_slots {
        spot.available_slots = available.clamp(0, spot.total_slots);
    }

    queries::update_spot(&tx, &spot)?;
    let spot = get_spot(&tx, id)?;
    tx.commit()?;

    tracing::info!(
        spot_id = %spot.id,
        archived = spot.archived,
        total_slots = spot.total_slots,
        available_slots = spot.available_slots,
        "spot updated"
    );
    Ok(spot)
}

/// Hides a spot from browsing and new reservations. Existing reservations keep their reference.
pub fn archive_spot(conn: &mut Connection, id: &str) -> Result<Spot, AppError> {
    update_spot(
        conn,
        id,
        SpotUpdate {
            archived: Some(true),
            ..SpotUpdate::default()
        },
    )
}

/// Grows or trims a spot to `total` units. Counters move by the same delta, clamped.
fn resize(conn: &Connection, spot: &mut Spot, total: i64) -> Result<(), AppError> {
    if !spot.spots.is_empty() {
        let current = spot.spots.len() as i64;
        if total > current {
            let added = numbered_range(current + 1, total);
            queries::insert_slot_entries(conn, &spot.id, current, &added)?;
        } else if total < current {
            let dropped = &spot.spots[total as usize..];
            if dropped.iter().any(|e| e.status == SlotStatus::Booked) {
                return Err(AppError::Conflict(
                    "cannot remove slot entries that are booked".to_string(),
                ));
            }
            queries::delete_slot_entries_from(conn, &spot.id, total)?;
        }
    }

    let delta = total - spot.total_slots;
    spot.total_slots = total;
    spot.available_slots = (spot.available_slots + delta).clamp(0, total);
    Ok(())
}

pub fn get_spot(conn: &Connection, id: &str) -> Result<Spot, AppError> {
    queries::get_spot(conn, id)?.ok_or_else(|| AppError::NotFound("spot not found".to_string()))
}

pub fn list_spots(conn: &Connection) -> Result<Vec<Spot>, AppError> {
    Ok(queries::list_spots(conn, false)?)
}

/// Every spot, archived ones included.
pub fn list_all_spots(conn: &Connection) -> Result<Vec<Spot>, AppError> {
    Ok(queries::list_spots(conn, true)?)
}

pub fn get_slot(conn: &Connection, slot_id: &str) -> Result<Option<SlotInfo>, AppError> {
    Ok(queries::get_slot_info(conn, slot_id)?)
}

pub fn mark_slot_status(
    conn: &Connection,
    slot_id: &str,
    spot_number: &str,
    status: SlotStatus,
) -> Result<(), AppError> {
    if queries::set_slot_entry_status(conn, slot_id, spot_number, status)? {
        Ok(())
    } else {
        Err(AppError::NotFound(format!(
            "slot entry {spot_number} not found"
        )))
    }
}

/// Takes one unit of the spot's counter and, for per-slot spots, the first free entry.
/// Runs in the same transaction as the status change that owns the claim.
pub fn claim_capacity(conn: &Connection, slot: &SlotInfo) -> Result<CapacityClaim, AppError> {
    let counter_claimed = queries::decrement_available(conn, &slot.id)?;
    if !counter_claimed {
        tracing::warn!(slot_id = %slot.id, "available slot counter already at zero");
    }

    let spot_number = match slot.capacity_model {
        CapacityModel::Counter => None,
        CapacityModel::PerSlot => match queries::first_available_entry(conn, &slot.id)? {
            Some(number) => {
                mark_slot_status(conn, &slot.id, &number, SlotStatus::Booked)?;
                Some(number)
            }
            None => {
                tracing::warn!(slot_id = %slot.id, "no free slot entry left to book");
                None
            }
        },
    };

    Ok(CapacityClaim {
        counter_claimed,
        spot_number,
    })
}

/// Returns whatever `claim` took. Returns true if anything was given back.
pub fn release_capacity(
    conn: &Connection,
    slot_id: &str,
    claim: &CapacityClaim,
) -> Result<bool, AppError> {
    let mut released = false;
    if claim.counter_claimed {
        released |= queries::increment_available(conn, slot_id)?;
    }
    if let Some(number) = &claim.spot_number {
        released |= queries::release_slot_entry(conn, slot_id, number)?;
    }
    Ok(released)
}
