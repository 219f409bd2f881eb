use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::errors::AppError;
use crate::handlers::auth::current_user;
use crate::handlers::extract::AppJson;
use crate::services::reservation::{
    self, Booked, HoldCreated, HoldRequest, ReservationSummary, ReservationView,
};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldBody {
    pub slot_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub hours: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectBookBody {
    pub slot_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub hours: Option<f64>,
    pub price_per_slot: Option<f64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    pub payment_result: Option<PaymentResult>,
}

#[derive(Deserialize)]
pub struct PaymentResult {
    pub status: Option<String>,
}

// POST /api/reservations/hold
pub async fn create_hold(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<HoldBody>,
) -> Result<Json<HoldCreated>, AppError> {
    let user_id = current_user(&headers, &state)?;
    let req = HoldRequest {
        user_id,
        slot_id: body.slot_id,
        vehicle_id: body.vehicle_id,
        hours: body.hours,
    };

    let mut conn = state.conn()?;
    let hold = reservation::create_hold(&mut conn, &req, state.config.hold_duration(), Utc::now())?;
    Ok(Json(hold))
}

// POST /api/reservations/:id/confirm
pub async fn confirm_hold(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<ConfirmBody>, JsonRejection>,
) -> Result<Json<ReservationView>, AppError> {
    let user_id = current_user(&headers, &state)?;
    let body = match body {
        Ok(Json(body)) => body,
        // No body at all: confirm with the default payment result.
        Err(JsonRejection::MissingJsonContentType(_)) => ConfirmBody::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let payment_status = body.payment_result.and_then(|p| p.status);

    let mut conn = state.conn()?;
    let view = reservation::confirm_hold(&mut conn, &id, &user_id, payment_status, Utc::now())?;
    Ok(Json(view))
}

// POST /api/reservations/:id/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ReservationView>, AppError> {
    let user_id = current_user(&headers, &state)?;
    let mut conn = state.conn()?;
    let view = reservation::cancel(&mut conn, &id, &user_id, Utc::now())?;
    Ok(Json(view))
}

// GET /api/reservations/:id
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ReservationView>, AppError> {
    let user_id = current_user(&headers, &state)?;
    let conn = state.conn()?;
    Ok(Json(reservation::get_one(&conn, &id, &user_id)?))
}

// GET /api/reservations/mine/list
pub async fn list_mine(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ReservationSummary>>, AppError> {
    let user_id = current_user(&headers, &state)?;
    let conn = state.conn()?;
    Ok(Json(reservation::list_mine(&conn, &user_id)?))
}

// POST /api/reservations
pub async fn direct_book(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<DirectBookBody>,
) -> Result<(StatusCode, Json<Booked>), AppError> {
    let user_id = current_user(&headers, &state)?;
    if let Some(client_price) = body.price_per_slot {
        tracing::debug!(client_price, "ignoring client-supplied pricePerSlot");
    }
    let req = HoldRequest {
        user_id,
        slot_id: body.slot_id,
        vehicle_id: body.vehicle_id,
        hours: body.hours,
    };

    let mut conn = state.conn()?;
    let booked = reservation::direct_book(&mut conn, &req, Utc::now())?;
    Ok((StatusCode::CREATED, Json(booked)))
}
