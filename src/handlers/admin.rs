use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::handlers::auth::check_admin;
use crate::handlers::extract::AppJson;
use crate::models::Spot;
use crate::services::spots::{self, NewSpot, SpotUpdate};
use crate::services::sweeper::{self, SweepReport};
use crate::services::{auth, users};
use crate::state::AppState;

// POST /api/admin/spots
pub async fn create_spot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<NewSpot>,
) -> Result<(StatusCode, Json<Spot>), AppError> {
    check_admin(&headers, &state)?;
    let conn = state.conn()?;
    let spot = spots::create_spot(&conn, body)?;
    Ok((StatusCode::CREATED, Json(spot)))
}

// GET /api/admin/spots
pub async fn list_spots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Spot>>, AppError> {
    check_admin(&headers, &state)?;
    let conn = state.conn()?;
    Ok(Json(spots::list_all_spots(&conn)?))
}

// PUT /api/admin/spots/:id
pub async fn update_spot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    AppJson(body): AppJson<SpotUpdate>,
) -> Result<Json<Spot>, AppError> {
    check_admin(&headers, &state)?;
    let mut conn = state.conn()?;
    Ok(Json(spots::update_spot(&mut conn, &id, body)?))
}

// DELETE /api/admin/spots/:id
pub async fn archive_spot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Spot>, AppError> {
    check_admin(&headers, &state)?;
    let mut conn = state.conn()?;
    Ok(Json(spots::archive_spot(&mut conn, &id)?))
}

// POST /api/admin/users
#[derive(Deserialize)]
pub struct RegisterUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct RegisteredUser {
    id: String,
    name: String,
    email: String,
    token: String,
}

pub async fn register_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<RegisterUserRequest>,
) -> Result<(StatusCode, Json<RegisteredUser>), AppError> {
    check_admin(&headers, &state)?;
    let user = {
        let conn = state.conn()?;
        users::register_user(&conn, body.name, body.email)?
    };
    let token = auth::issue_token(&state.config.session_secret, &user.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisteredUser {
            id: user.id,
            name: user.name,
            email: user.email,
            token,
        }),
    ))
}

// POST /api/admin/sweep
pub async fn run_sweep(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SweepReport>, AppError> {
    check_admin(&headers, &state)?;
    let report = {
        let mut conn = state.conn()?;
        sweeper::sweep_once(&mut conn, Utc::now())?
    };
    tracing::info!(
        expired_holds = report.expired_holds,
        finished_bookings = report.finished_bookings,
        "manual expiry sweep"
    );
    Ok(Json(report))
}
