use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Vehicle;

#[derive(Debug, Clone, Deserialize)]
pub struct NewVehicle {
    pub make: Option<String>,
    pub model: Option<String>,
    pub plate: Option<String>,
}

pub fn get_vehicle(
    conn: &Connection,
    vehicle_id: &str,
    user_id: &str,
) -> Result<Option<Vehicle>, AppError> {
    Ok(queries::get_vehicle_for_user(conn, vehicle_id, user_id)?)
}

pub fn add_vehicle(conn: &Connection, user_id: &str, new: NewVehicle) -> Result<Vehicle, AppError> {
    let plate = new
        .plate
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::InvalidInput("plate is required".to_string()))?;

    let vehicle = Vehicle {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        make: new.make.unwrap_or_default().trim().to_string(),
        model: new.model.unwrap_or_default().trim().to_string(),
        plate,
    };

    match queries::insert_vehicle(conn, &vehicle) {
        Ok(()) => {
            tracing::info!(vehicle_id = %vehicle.id, user_id = %user_id, "vehicle added");
            Ok(vehicle)
        }
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(AppError::Conflict(format!(
                "vehicle {} is already registered",
                vehicle.plate
            )))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn list_vehicles(conn: &Connection, user_id: &str) -> Result<Vec<Vehicle>, AppError> {
    Ok(queries::list_vehicles(conn, user_id)?)
}
