pub mod admin;
pub mod auth;
pub mod extract;
pub mod health;
pub mod reservations;
pub mod spots;
pub mod vehicles;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/spots", get(spots::list_spots))
        .route("/api/spots/:id", get(spots::get_spot))
        .route(
            "/api/vehicles",
            get(vehicles::list_vehicles).post(vehicles::add_vehicle),
        )
        .route("/api/reservations", post(reservations::direct_book))
        .route("/api/reservations/hold", post(reservations::create_hold))
        .route("/api/reservations/mine/list", get(reservations::list_mine))
        .route("/api/reservations/:id", get(reservations::get_one))
        .route(
            "/api/reservations/:id/confirm",
            post(reservations::confirm_hold),
        )
        .route("/api/reservations/:id/cancel", post(reservations::cancel))
        .route(
            "/api/admin/spots",
            get(admin::list_spots).post(admin::create_spot),
        )
        .route(
            "/api/admin/spots/:id",
            put(admin::update_spot).delete(admin::archive_spot),
        )
        .route("/api/admin/users", post(admin::register_user))
        .route("/api/admin/sweep", post(admin::run_sweep))
        .with_state(state)
}
