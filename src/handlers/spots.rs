use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::errors::AppError;
use crate::models::Spot;
use crate::services::spots;
use crate::state::AppState;

// GET /api/spots
pub async fn list_spots(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Spot>>, AppError> {
    let conn = state.conn()?;
    Ok(Json(spots::list_spots(&conn)?))
}

// GET /api/spots/:id
pub async fn get_spot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Spot>, AppError> {
    let conn = state.conn()?;
    Ok(Json(spots::get_spot(&conn, &id)?))
}
