use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use parkspace::config::AppConfig;
use parkspace::db;
use parkspace::handlers;
use parkspace::state::AppState;

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        session_secret: "test-secret".to_string(),
        client_url: "http://localhost:5173".to_string(),
        hold_minutes: 5,
        sweep_interval_secs: 60,
    }
}

fn test_state() -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    Arc::new(AppState::new(conn, test_config()))
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(request).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Registers a user and a vehicle; returns (token, vehicle_id).
async fn user_with_vehicle(app: &Router, name: &str, plate: &str) -> (String, String) {
    let (status, user) = send(
        app,
        "POST",
        "/api/admin/users",
        Some("test-token"),
        Some(serde_json::json!({
            "name": name,
            "email": format!("{}@example.com", name.to_lowercase()),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = user["token"].as_str().unwrap().to_string();

    let (status, vehicle) = send(
        app,
        "POST",
        "/api/vehicles",
        Some(&token),
        Some(serde_json::json!({ "make": "Maruti", "model": "Swift", "plate": plate })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let vehicle_id = vehicle["id"].as_str().unwrap().to_string();

    (token, vehicle_id)
}

async fn create_spot(app: &Router, price: f64, total_slots: i64) -> String {
    let (status, spot) = send(
        app,
        "POST",
        "/api/admin/spots",
        Some("test-token"),
        Some(serde_json::json!({
            "name": "Riverfront",
            "address": "Ashram Road",
            "price": price,
            "totalSlots": total_slots,
            "perSlot": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    spot["id"].as_str().unwrap().to_string()
}

fn is_confirmation_code(code: &str) -> bool {
    code.len() == 8 && code.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

// ── Health & auth ──

#[tokio::test]
async fn test_health() {
    let app = test_app(test_state());
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_reservations_require_auth() {
    let app = test_app(test_state());

    let (status, body) = send(&app, "GET", "/api/reservations/mine/list", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = send(
        &app,
        "GET",
        "/api/reservations/mine/list",
        Some("someone.forged"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let app = test_app(test_state());
    let (status, _) = send(
        &app,
        "POST",
        "/api/admin/spots",
        Some("wrong-token"),
        Some(serde_json::json!({ "name": "X", "price": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "POST", "/api/admin/sweep", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Spots ──

#[tokio::test]
async fn test_spot_browse() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 50.0, 2).await;

    let (status, list) = send(&app, "GET", "/api/spots", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, spot) = send(&app, "GET", &format!("/api/spots/{spot_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(spot["availableSlots"], 2);
    assert_eq!(spot["spots"][0]["spotNumber"], "P1");
    assert_eq!(spot["spots"][0]["status"], "available");

    let (status, _) = send(&app, "GET", "/api/spots/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Reservations ──

#[tokio::test]
async fn test_hold_confirm_flow() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 50.0, 2).await;
    let (token, vehicle_id) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;

    let (status, hold) = send(
        &app,
        "POST",
        "/api/reservations/hold",
        Some(&token),
        Some(serde_json::json!({ "slotId": spot_id, "vehicleId": vehicle_id, "hours": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hold["amount"], 100.0);
    let reservation_id = hold["reservationId"].as_str().unwrap().to_string();

    let (status, ticket) = send(
        &app,
        "POST",
        &format!("/api/reservations/{reservation_id}/confirm"),
        Some(&token),
        Some(serde_json::json!({ "paymentResult": { "status": "success" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticket["status"], "confirmed");
    assert!(is_confirmation_code(ticket["confirmationCode"].as_str().unwrap()));
    assert_eq!(ticket["user"]["name"], "Asha");
    assert_eq!(ticket["vehicle"]["plate"], "GJ01AB1234");
    assert_eq!(ticket["slot"]["name"], "Riverfront");
    assert_eq!(ticket["amount"], 100.0);
    assert_eq!(ticket["spotNumber"], "P1");

    let (status, again) = send(
        &app,
        "POST",
        &format!("/api/reservations/{reservation_id}/confirm"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["code"], "conflict");

    let (status, spot) = send(&app, "GET", &format!("/api/spots/{spot_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(spot["availableSlots"], 1);
}

#[tokio::test]
async fn test_confirm_without_body_defaults_to_success() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 20.0, 1).await;
    let (token, vehicle_id) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;

    let (_, hold) = send(
        &app,
        "POST",
        "/api/reservations/hold",
        Some(&token),
        Some(serde_json::json!({ "slotId": spot_id, "vehicleId": vehicle_id, "hours": 1 })),
    )
    .await;
    let reservation_id = hold["reservationId"].as_str().unwrap();

    let (status, ticket) = send(
        &app,
        "POST",
        &format!("/api/reservations/{reservation_id}/confirm"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticket["payment"]["status"], "success");
    assert_eq!(ticket["payment"]["provider"], "offline");
}

#[tokio::test]
async fn test_overlapping_hold_rejected() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 50.0, 2).await;
    let (asha, asha_car) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;
    let (ravi, ravi_car) = user_with_vehicle(&app, "Ravi", "GJ05CD5678").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/reservations/hold",
        Some(&asha),
        Some(serde_json::json!({ "slotId": spot_id, "vehicleId": asha_car, "hours": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        "/api/reservations/hold",
        Some(&ravi),
        Some(serde_json::json!({ "slotId": spot_id, "vehicleId": ravi_car, "hours": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, _) = send(
        &app,
        "POST",
        "/api/reservations",
        Some(&ravi),
        Some(serde_json::json!({ "slotId": spot_id, "vehicleId": ravi_car, "hours": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_hold_validation_errors() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 50.0, 2).await;
    let (token, vehicle_id) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;
    let (_, ravi_car) = user_with_vehicle(&app, "Ravi", "GJ05CD5678").await;

    let cases = [
        (serde_json::json!({ "slotId": spot_id, "vehicleId": vehicle_id }), StatusCode::BAD_REQUEST),
        (
            serde_json::json!({ "slotId": spot_id, "vehicleId": vehicle_id, "hours": 0 }),
            StatusCode::BAD_REQUEST,
        ),
        (serde_json::json!({ "vehicleId": vehicle_id, "hours": 1 }), StatusCode::BAD_REQUEST),
        (serde_json::json!({ "slotId": spot_id, "hours": 1 }), StatusCode::BAD_REQUEST),
        (
            serde_json::json!({ "slotId": "missing", "vehicleId": vehicle_id, "hours": 1 }),
            StatusCode::NOT_FOUND,
        ),
        (
            serde_json::json!({ "slotId": spot_id, "vehicleId": ravi_car, "hours": 1 }),
            StatusCode::NOT_FOUND,
        ),
    ];

    for (body, expected) in cases {
        let (status, _) = send(&app, "POST", "/api/reservations/hold", Some(&token), Some(body)).await;
        assert_eq!(status, expected);
    }
}

#[tokio::test]
async fn test_direct_book_ignores_client_price() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 40.0, 3).await;
    let (token, vehicle_id) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;

    let (status, booked) = send(
        &app,
        "POST",
        "/api/reservations",
        Some(&token),
        Some(serde_json::json!({
            "slotId": spot_id,
            "vehicleId": vehicle_id,
            "hours": 2,
            "slots": 1,
            "pricePerSlot": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booked["amount"], 80.0);
    assert!(booked["startTime"].is_string());
    assert!(booked["endTime"].is_string());
    assert!(is_confirmation_code(booked["confirmationCode"].as_str().unwrap()));
}

#[tokio::test]
async fn test_get_and_list_are_owner_scoped() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 50.0, 2).await;
    let (asha, asha_car) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;
    let (ravi, _) = user_with_vehicle(&app, "Ravi", "GJ05CD5678").await;

    let (_, booked) = send(
        &app,
        "POST",
        "/api/reservations",
        Some(&asha),
        Some(serde_json::json!({ "slotId": spot_id, "vehicleId": asha_car, "hours": 1 })),
    )
    .await;
    let reservation_id = booked["reservationId"].as_str().unwrap();

    let (status, view) = send(
        &app,
        "GET",
        &format!("/api/reservations/{reservation_id}"),
        Some(&asha),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "confirmed");
    assert_eq!(view["reservationId"], reservation_id);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/reservations/{reservation_id}"),
        Some(&ravi),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, mine) = send(&app, "GET", "/api/reservations/mine/list", Some(&asha), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["slot"]["name"], "Riverfront");

    let (status, theirs) = send(&app, "GET", "/api/reservations/mine/list", Some(&ravi), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(theirs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_frees_window() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 50.0, 1).await;
    let (asha, asha_car) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;
    let (ravi, ravi_car) = user_with_vehicle(&app, "Ravi", "GJ05CD5678").await;

    let (_, hold) = send(
        &app,
        "POST",
        "/api/reservations/hold",
        Some(&asha),
        Some(serde_json::json!({ "slotId": spot_id, "vehicleId": asha_car, "hours": 1 })),
    )
    .await;
    let reservation_id = hold["reservationId"].as_str().unwrap();

    let (status, view) = send(
        &app,
        "POST",
        &format!("/api/reservations/{reservation_id}/cancel"),
        Some(&asha),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "cancelled");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/reservations/{reservation_id}/confirm"),
        Some(&asha),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        "/api/reservations/hold",
        Some(&ravi),
        Some(serde_json::json!({ "slotId": spot_id, "vehicleId": ravi_car, "hours": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_manual_sweep_with_nothing_due() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 50.0, 1).await;
    let (token, vehicle_id) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;

    send(
        &app,
        "POST",
        "/api/reservations/hold",
        Some(&token),
        Some(serde_json::json!({ "slotId": spot_id, "vehicleId": vehicle_id, "hours": 1 })),
    )
    .await;

    let (status, report) = send(&app, "POST", "/api/admin/sweep", Some("test-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["expiredHolds"], 0);
    assert_eq!(report["finishedBookings"], 0);
}

#[tokio::test]
async fn test_duplicate_vehicle_conflicts() {
    let app = test_app(test_state());
    let (token, _) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/vehicles",
        Some(&token),
        Some(serde_json::json!({ "plate": "GJ01AB1234" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, list) = send(&app, "GET", "/api/vehicles", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

// ── Malformed bodies ──

#[tokio::test]
async fn test_malformed_body_is_invalid_input() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 50.0, 1).await;
    let (token, vehicle_id) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/reservations/hold",
        Some(&token),
        Some(serde_json::json!({ "slotId": spot_id, "vehicleId": vehicle_id, "hours": "two" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
    assert!(body["error"].is_string());

    let (status, body) = send(
        &app,
        "POST",
        "/api/reservations",
        Some(&token),
        Some(serde_json::json!({ "slotId": 5, "vehicleId": vehicle_id, "hours": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_missing_content_type_is_invalid_input() {
    let app = test_app(test_state());
    let (token, _) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/vehicles")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(r#"{"plate":"GJ05CD5678"}"#))
        .unwrap();
    let res = app.clone().oneshot(request).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_malformed_confirm_body_is_rejected() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 20.0, 1).await;
    let (token, vehicle_id) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;

    let (_, hold) = send(
        &app,
        "POST",
        "/api/reservations/hold",
        Some(&token),
        Some(serde_json::json!({ "slotId": spot_id, "vehicleId": vehicle_id, "hours": 1 })),
    )
    .await;
    let reservation_id = hold["reservationId"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/reservations/{reservation_id}/confirm"),
        Some(&token),
        Some(serde_json::json!({ "paymentResult": "paid" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");

    let (status, view) = send(
        &app,
        "GET",
        &format!("/api/reservations/{reservation_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "held");
}

// ── Spot administration ──

#[tokio::test]
async fn test_admin_updates_spot() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 50.0, 2).await;

    let (status, spot) = send(
        &app,
        "PUT",
        &format!("/api/admin/spots/{spot_id}"),
        Some("test-token"),
        Some(serde_json::json!({ "name": "City Centre", "price": 30, "totalSlots": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(spot["name"], "City Centre");
    assert_eq!(spot["price"], 30.0);
    assert_eq!(spot["totalSlots"], 3);
    assert_eq!(spot["availableSlots"], 3);
    assert_eq!(spot["spots"][2]["spotNumber"], "P3");

    let (status, _) = send(
        &app,
        "PUT",
        "/api/admin/spots/missing",
        Some("test-token"),
        Some(serde_json::json!({ "price": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/admin/spots/{spot_id}"),
        Some("wrong-token"),
        Some(serde_json::json!({ "price": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_archived_spot_rejects_new_reservations() {
    let app = test_app(test_state());
    let spot_id = create_spot(&app, 50.0, 1).await;
    let (token, vehicle_id) = user_with_vehicle(&app, "Asha", "GJ01AB1234").await;

    let (status, spot) = send(
        &app,
        "DELETE",
        &format!("/api/admin/spots/{spot_id}"),
        Some("test-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(spot["archived"], true);

    let (_, list) = send(&app, "GET", "/api/spots", None, None).await;
    assert!(list.as_array().unwrap().is_empty());
    let (_, all) = send(&app, "GET", "/api/admin/spots", Some("test-token"), None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let hold_body = serde_json::json!({ "slotId": spot_id, "vehicleId": vehicle_id, "hours": 1 });
    let (status, _) = send(
        &app,
        "POST",
        "/api/reservations/hold",
        Some(&token),
        Some(hold_body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/admin/spots/{spot_id}"),
        Some("test-token"),
        Some(serde_json::json!({ "archived": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/api/reservations/hold", Some(&token), Some(hold_body)).await;
    assert_eq!(status, StatusCode::OK);
}
