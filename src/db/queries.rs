use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::{format_ts, parse_ts};
use crate::models::{
    CapacityModel, Payment, Reservation, ReservationStatus, SlotEntry, SlotInfo, SlotStatus, Spot,
    User, Vehicle,
};

// ── Users ──

pub fn insert_user(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email) VALUES (?1, ?2, ?3)",
        params![user.id, user.name, user.email],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    let result = conn.query_row(
        "SELECT id, name, email FROM users WHERE id = ?1",
        params![id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
            })
        },
    );

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

// ── Spots ──

pub fn insert_spot(conn: &Connection, spot: &Spot) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO spots (id, name, address, price, archived, total_slots, available_slots)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            spot.id,
            spot.name,
            spot.address,
            spot.price,
            spot.archived as i32,
            spot.total_slots,
            spot.available_slots,
        ],
    )?;

    insert_slot_entries(conn, &spot.id, 0, &spot.spots)
}

pub fn update_spot(conn: &Connection, spot: &Spot) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE spots SET name = ?1, address = ?2, price = ?3, archived = ?4,
                total_slots = ?5, available_slots = ?6
         WHERE id = ?7",
        params![
            spot.name,
            spot.address,
            spot.price,
            spot.archived as i32,
            spot.total_slots,
            spot.available_slots,
            spot.id,
        ],
    )?;
    Ok(count > 0)
}

/// Appends entries to a spot, numbering their positions from `first_position`.
pub fn insert_slot_entries(
    conn: &Connection,
    spot_id: &str,
    first_position: i64,
    entries: &[SlotEntry],
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO spot_slots (spot_id, spot_number, pillar, status, position)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (offset, entry) in entries.iter().enumerate() {
        stmt.execute(params![
            spot_id,
            entry.spot_number,
            entry.pillar,
            entry.status.as_str(),
            first_position + offset as i64,
        ])?;
    }
    Ok(())
}

/// Drops every entry at or after `position`.
pub fn delete_slot_entries_from(
    conn: &Connection,
    spot_id: &str,
    position: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM spot_slots WHERE spot_id = ?1 AND position >= ?2",
        params![spot_id, position],
    )
}

pub fn get_spot(conn: &Connection, id: &str) -> rusqlite::Result<Option<Spot>> {
    let result = conn.query_row(
        "SELECT id, name, address, price, archived, total_slots, available_slots
         FROM spots WHERE id = ?1",
        params![id],
        parse_spot_row,
    );

    match result {
        Ok(mut spot) => {
            spot.spots = get_slot_entries(conn, &spot.id)?;
            Ok(Some(spot))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn list_spots(conn: &Connection, include_archived: bool) -> rusqlite::Result<Vec<Spot>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, address, price, archived, total_slots, available_slots
         FROM spots WHERE archived = 0 OR ?1 ORDER BY created_at DESC, name ASC",
    )?;

    let rows = stmt.query_map(params![include_archived as i32], parse_spot_row)?;

    let mut spots = vec![];
    for row in rows {
        let mut spot = row?;
        spot.spots = get_slot_entries(conn, &spot.id)?;
        spots.push(spot);
    }
    Ok(spots)
}

fn get_slot_entries(conn: &Connection, spot_id: &str) -> rusqlite::Result<Vec<SlotEntry>> {
    let mut stmt = conn.prepare(
        "SELECT spot_number, pillar, status FROM spot_slots
         WHERE spot_id = ?1 ORDER BY position ASC",
    )?;

    let rows = stmt.query_map(params![spot_id], |row| {
        let status: String = row.get(2)?;
        Ok(SlotEntry {
            spot_number: row.get(0)?,
            pillar: row.get(1)?,
            status: SlotStatus::parse(&status),
        })
    })?;

    let mut entries = vec![];
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn parse_spot_row(row: &rusqlite::Row) -> rusqlite::Result<Spot> {
    Ok(Spot {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        price: row.get(3)?,
        archived: row.get::<_, i32>(4)? != 0,
        total_slots: row.get(5)?,
        available_slots: row.get(6)?,
        spots: vec![],
    })
}

pub fn get_slot_info(conn: &Connection, id: &str) -> rusqlite::Result<Option<SlotInfo>> {
    let result = conn.query_row(
        "SELECT s.id, s.price, s.archived,
                (SELECT COUNT(*) FROM spot_slots ss WHERE ss.spot_id = s.id)
         FROM spots s WHERE s.id = ?1",
        params![id],
        |row| {
            let entries: i64 = row.get(3)?;
            Ok(SlotInfo {
                id: row.get(0)?,
                price: row.get(1)?,
                archived: row.get::<_, i32>(2)? != 0,
                capacity_model: if entries > 0 {
                    CapacityModel::PerSlot
                } else {
                    CapacityModel::Counter
                },
            })
        },
    );

    match result {
        Ok(info) => Ok(Some(info)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn set_slot_entry_status(
    conn: &Connection,
    spot_id: &str,
    spot_number: &str,
    status: SlotStatus,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE spot_slots SET status = ?1 WHERE spot_id = ?2 AND spot_number = ?3",
        params![status.as_str(), spot_id, spot_number],
    )?;
    Ok(count > 0)
}

/// Frees a booked entry. Entries switched off in the meantime stay off.
pub fn release_slot_entry(
    conn: &Connection,
    spot_id: &str,
    spot_number: &str,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE spot_slots SET status = 'available'
         WHERE spot_id = ?1 AND spot_number = ?2 AND status = 'booked'",
        params![spot_id, spot_number],
    )?;
    Ok(count > 0)
}

pub fn first_available_entry(conn: &Connection, spot_id: &str) -> rusqlite::Result<Option<String>> {
    let result = conn.query_row(
        "SELECT spot_number FROM spot_slots
         WHERE spot_id = ?1 AND status = 'available'
         ORDER BY position ASC LIMIT 1",
        params![spot_id],
        |row| row.get(0),
    );

    match result {
        Ok(number) => Ok(Some(number)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Takes one unit of counter capacity. Returns false when none is left.
pub fn decrement_available(conn: &Connection, spot_id: &str) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE spots SET available_slots = available_slots - 1
         WHERE id = ?1 AND available_slots > 0",
        params![spot_id],
    )?;
    Ok(count > 0)
}

/// Gives back one unit of counter capacity, never past `total_slots`.
pub fn increment_available(conn: &Connection, spot_id: &str) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE spots SET available_slots = available_slots + 1
         WHERE id = ?1 AND available_slots < total_slots",
        params![spot_id],
    )?;
    Ok(count > 0)
}

// ── Vehicles ──

pub fn insert_vehicle(conn: &Connection, vehicle: &Vehicle) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO vehicles (id, user_id, make, model, plate) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            vehicle.id,
            vehicle.user_id,
            vehicle.make,
            vehicle.model,
            vehicle.plate,
        ],
    )?;
    Ok(())
}

pub fn get_vehicle_for_user(
    conn: &Connection,
    vehicle_id: &str,
    user_id: &str,
) -> rusqlite::Result<Option<Vehicle>> {
    let result = conn.query_row(
        "SELECT id, user_id, make, model, plate FROM vehicles WHERE id = ?1 AND user_id = ?2",
        params![vehicle_id, user_id],
        parse_vehicle_row,
    );

    match result {
        Ok(vehicle) => Ok(Some(vehicle)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn list_vehicles(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Vehicle>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, make, model, plate FROM vehicles
         WHERE user_id = ?1 ORDER BY created_at ASC, plate ASC",
    )?;

    let rows = stmt.query_map(params![user_id], parse_vehicle_row)?;

    let mut vehicles = vec![];
    for row in rows {
        vehicles.push(row?);
    }
    Ok(vehicles)
}

fn parse_vehicle_row(row: &rusqlite::Row) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: row.get(0)?,
        user_id: row.get(1)?,
        make: row.get(2)?,
        model: row.get(3)?,
        plate: row.get(4)?,
    })
}

// ── Reservations ──

const RESERVATION_COLUMNS: &str = "id, user_id, vehicle_id, slot_id, status, start_time, end_time, amount, \
     hold_expires_at, confirmation_code, payment_provider, payment_intent_id, payment_status, \
     spot_number, capacity_claimed, created_at, updated_at";

pub fn insert_reservation(conn: &Connection, r: &Reservation) -> rusqlite::Result<()> {
    let payment = r.payment.as_ref();
    conn.execute(
        &format!(
            "INSERT INTO reservations ({RESERVATION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            r.id,
            r.user_id,
            r.vehicle_id,
            r.slot_id,
            r.status.as_str(),
            format_ts(&r.start_time),
            format_ts(&r.end_time),
            r.amount,
            r.hold_expires_at.as_ref().map(format_ts),
            r.confirmation_code,
            payment.map(|p| p.provider.as_str()),
            payment.and_then(|p| p.intent_id.as_deref()),
            payment.map(|p| p.status.as_str()),
            r.spot_number,
            r.capacity_claimed as i32,
            format_ts(&r.created_at),
            format_ts(&r.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_reservation(conn: &Connection, id: &str) -> rusqlite::Result<Option<Reservation>> {
    let result = conn.query_row(
        &format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1"),
        params![id],
        parse_reservation_row,
    );

    match result {
        Ok(r) => Ok(Some(r)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn get_reservation_for_user(
    conn: &Connection,
    id: &str,
    user_id: &str,
) -> rusqlite::Result<Option<Reservation>> {
    let result = conn.query_row(
        &format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1 AND user_id = ?2"),
        params![id, user_id],
        parse_reservation_row,
    );

    match result {
        Ok(r) => Ok(Some(r)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn list_reservations_for_user(
    conn: &Connection,
    user_id: &str,
) -> rusqlite::Result<Vec<Reservation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations
         WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
    ))?;

    let rows = stmt.query_map(params![user_id], parse_reservation_row)?;

    let mut reservations = vec![];
    for row in rows {
        reservations.push(row?);
    }
    Ok(reservations)
}

/// Active reservations on `slot_id` that have not ended by `after`, earliest first.
pub fn list_active_ending_after(
    conn: &Connection,
    slot_id: &str,
    after: &DateTime<Utc>,
) -> rusqlite::Result<Vec<Reservation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations
         WHERE slot_id = ?1 AND status IN ('held', 'confirmed') AND end_time > ?2
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(params![slot_id, format_ts(after)], parse_reservation_row)?;

    let mut reservations = vec![];
    for row in rows {
        reservations.push(row?);
    }
    Ok(reservations)
}

/// Holds whose fuse has burnt down and bookings that have ended by `now`, optionally for one slot.
pub fn list_expirable(
    conn: &Connection,
    now: &DateTime<Utc>,
    slot_id: Option<&str>,
) -> rusqlite::Result<Vec<Reservation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations
         WHERE ((status = 'held' AND hold_expires_at IS NOT NULL AND hold_expires_at <= ?1)
             OR (status = 'confirmed' AND end_time <= ?1))
           AND (?2 IS NULL OR slot_id = ?2)
         ORDER BY created_at ASC"
    ))?;

    let rows = stmt.query_map(params![format_ts(now), slot_id], parse_reservation_row)?;

    let mut reservations = vec![];
    for row in rows {
        reservations.push(row?);
    }
    Ok(reservations)
}

/// Moves a reservation from `from` to `to`. Returns false if it was no longer in `from`.
pub fn transition_status(
    conn: &Connection,
    id: &str,
    from: ReservationStatus,
    to: ReservationStatus,
    now: &DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE reservations SET status = ?1, capacity_claimed = 0, updated_at = ?2
         WHERE id = ?3 AND status = ?4",
        params![to.as_str(), format_ts(now), id, from.as_str()],
    )?;
    Ok(count > 0)
}

pub struct ConfirmUpdate<'a> {
    pub payment: &'a Payment,
    pub confirmation_code: &'a str,
    pub spot_number: Option<&'a str>,
    pub capacity_claimed: bool,
}

/// Marks a held reservation confirmed. Returns false if it was no longer held.
pub fn mark_confirmed(
    conn: &Connection,
    id: &str,
    update: &ConfirmUpdate<'_>,
    now: &DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE reservations SET
           status = 'confirmed',
           confirmation_code = ?1,
           payment_provider = ?2,
           payment_intent_id = ?3,
           payment_status = ?4,
           spot_number = ?5,
           capacity_claimed = ?6,
           updated_at = ?7
         WHERE id = ?8 AND status = 'held'",
        params![
            update.confirmation_code,
            update.payment.provider,
            update.payment.intent_id,
            update.payment.status,
            update.spot_number,
            update.capacity_claimed as i32,
            format_ts(now),
            id,
        ],
    )?;
    Ok(count > 0)
}

pub fn confirmation_code_taken(conn: &Connection, code: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reservations WHERE confirmation_code = ?1",
        params![code],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn parse_reservation_row(row: &rusqlite::Row) -> rusqlite::Result<Reservation> {
    let status_str: String = row.get(4)?;
    let status = ReservationStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown reservation status: {status_str}").into(),
        )
    })?;

    let start_time: String = row.get(5)?;
    let end_time: String = row.get(6)?;
    let hold_expires_at: Option<String> = row.get(8)?;
    let provider: Option<String> = row.get(10)?;
    let intent_id: Option<String> = row.get(11)?;
    let payment_status: Option<String> = row.get(12)?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;

    let payment = provider.map(|provider| Payment {
        provider,
        intent_id,
        status: payment_status.unwrap_or_default(),
    });

    Ok(Reservation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        vehicle_id: row.get(2)?,
        slot_id: row.get(3)?,
        status,
        start_time: parse_ts(&start_time)?,
        end_time: parse_ts(&end_time)?,
        amount: row.get(7)?,
        hold_expires_at: hold_expires_at.as_deref().map(parse_ts).transpose()?,
        confirmation_code: row.get(9)?,
        payment,
        spot_number: row.get(13)?,
        capacity_claimed: row.get::<_, i32>(14)? != 0,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}
