use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::errors::AppError;
use crate::handlers::auth::current_user;
use crate::handlers::extract::AppJson;
use crate::models::Vehicle;
use crate::services::vehicles::{self, NewVehicle};
use crate::state::AppState;

// POST /api/vehicles
pub async fn add_vehicle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<NewVehicle>,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    let user_id = current_user(&headers, &state)?;
    let conn = state.conn()?;
    let vehicle = vehicles::add_vehicle(&conn, &user_id, body)?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

// GET /api/vehicles
pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    let user_id = current_user(&headers, &state)?;
    let conn = state.conn()?;
    Ok(Json(vehicles::list_vehicles(&conn, &user_id)?))
}
