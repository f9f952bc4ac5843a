use std::sync::{Arc, Mutex};
use std::time::Duration;

use aquabear_api::{
    app,
    auth::{hash_password, StaffDirectory},
    state::{AppState, AuthConfig},
};
use aquabear_core::dispatch::{BookingNotification, DispatchError, NotificationDispatcher};
use aquabear_core::notice::SilentAlerts;
use aquabear_core::{
    BookingIntake, ConsoleContext, ConsoleSettings, ReservationConsole, ReservationStore,
};
use aquabear_shared::{Masked, Reservation, ReservationStatus, ServiceType};
use aquabear_store::MemoryReservationStore;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Datelike, Duration as ChronoDuration, Local, Utc, Weekday};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const STAFF_EMAIL: &str = "staff@aquabear.mx";
const STAFF_PASSWORD: &str = "correct horse";

#[derive(Default)]
struct RecordingDispatcher {
    sent: Mutex<Vec<BookingNotification>>,
    fail: bool,
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, notification: &BookingNotification) -> Result<(), DispatchError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            return Err(DispatchError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

struct Harness {
    router: Router,
    store: Arc<MemoryReservationStore>,
    console: Arc<ReservationConsole>,
    dispatcher: Arc<RecordingDispatcher>,
}

fn reservation(name: &str, phone: &str, status: ReservationStatus, date: &str, age_hours: i64) -> Reservation {
    Reservation {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: Masked::from(format!("{}@example.com", name.to_lowercase())),
        phone: Masked::from(phone),
        service_type: ServiceType::Kids,
        reservation_date: date.to_string(),
        reservation_time: "10:00".to_string(),
        participants: 2,
        notes: None,
        status,
        created_at: Utc::now() - ChronoDuration::hours(age_hours),
    }
}

async fn harness_with(records: Vec<Reservation>, dispatcher: RecordingDispatcher) -> Harness {
    let store = Arc::new(MemoryReservationStore::with_records(records).await);
    let dispatcher = Arc::new(dispatcher);

    let console = Arc::new(ReservationConsole::new(ConsoleContext {
        store: store.clone(),
        alerts: Arc::new(SilentAlerts),
        settings: ConsoleSettings::default(),
    }));
    console.mount().await;

    let intake = Arc::new(BookingIntake::new(store.clone(), dispatcher.clone()));

    let mut staff = StaffDirectory::default();
    staff.insert_hash(STAFF_EMAIL, hash_password(STAFF_PASSWORD).unwrap());

    let state = AppState::new(
        console.clone(),
        intake,
        dispatcher.clone(),
        staff,
        AuthConfig {
            secret: "integration-secret".to_string(),
            expiration: 3600,
        },
    );

    Harness {
        router: app(state),
        store,
        console,
        dispatcher,
    }
}

async fn harness(records: Vec<Reservation>) -> Harness {
    harness_with(records, RecordingDispatcher::default()).await
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(payload) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&payload).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn login(router: &Router) -> String {
    let (status, body) = call(
        router,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "email": STAFF_EMAIL, "password": STAFF_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

fn next_saturday() -> String {
    let mut date = Local::now().date_naive() + ChronoDuration::days(1);
    while date.weekday() != Weekday::Sat {
        date += ChronoDuration::days(1);
    }
    date.format("%Y-%m-%d").to_string()
}

async fn wait_for_pending(console: &ReservationConsole, expected: usize) {
    for _ in 0..100 {
        if console.counts().await.pending == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pending count never reached {expected}");
}

async fn open_stream(router: &Router, token: &str) -> axum::body::BodyDataStream {
    let req = Request::builder()
        .uri(format!("/v1/admin/stream?access_token={token}"))
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    response.into_body().into_data_stream()
}

/// Read SSE frames into `seen` until it contains `needle`.
async fn read_until(frames: &mut axum::body::BodyDataStream, seen: &mut String, needle: &str) {
    while !seen.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(2), frames.next())
            .await
            .unwrap_or_else(|_| panic!("no `{needle}` frame within 2s, got: {seen}"))
            .expect("stream ended")
            .unwrap();
        seen.push_str(std::str::from_utf8(&chunk).unwrap());
    }
}

#[tokio::test]
async fn test_console_requires_a_session() {
    let h = harness(vec![]).await;

    for uri in ["/v1/admin/reservations", "/v1/admin/counts", "/v1/auth/session"] {
        let (status, body) = call(&h.router, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["redirect"], "/login");
    }

    let (status, _) = call(&h.router, Method::GET, "/v1/admin/counts", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_session_and_logout() {
    let h = harness(vec![]).await;

    let (status, body) = call(
        &h.router,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "email": STAFF_EMAIL, "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Correo o contraseña incorrectos");

    let token = login(&h.router).await;
    let (status, body) = call(&h.router, Method::GET, "/v1/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], STAFF_EMAIL);

    let (status, body) = call(&h.router, Method::POST, "/v1/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect"], "/login");

    let (status, _) = call(&h.router, Method::GET, "/v1/admin/counts", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_booking_reaches_console_and_notifies_staff() {
    let h = harness(vec![]).await;
    let token = login(&h.router).await;

    let (status, body) = call(
        &h.router,
        Method::POST,
        "/v1/reservations",
        None,
        Some(json!({
            "name": "Ana",
            "email": "ana@example.com",
            "phone": "5215512345678",
            "service": "kids",
            "date": next_saturday(),
            "time": "10:00",
            "participants": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);

    wait_for_pending(&h.console, 1).await;

    let (status, counts) = call(&h.router, Method::GET, "/v1/admin/counts", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(counts["pending"], 1);
    assert_eq!(counts["all"], 1);

    let (_, notice) = call(&h.router, Method::GET, "/v1/admin/notification", Some(&token), None).await;
    assert_eq!(notice["notice"]["reservation"]["id"], body["reservation_id"]);

    let sent = h.dispatcher.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].service, "Clases Infantiles");
}

#[tokio::test]
async fn test_booking_validation_and_failed_email() {
    let h = harness_with(
        vec![],
        RecordingDispatcher {
            fail: true,
            ..Default::default()
        },
    )
    .await;

    let (status, body) = call(
        &h.router,
        Method::POST,
        "/v1/reservations",
        None,
        Some(json!({ "name": "Ana", "email": "a@example.com", "phone": "555", "time": "10:00", "service": "kids" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Por favor selecciona una fecha");

    let (status, _) = call(
        &h.router,
        Method::POST,
        "/v1/reservations",
        None,
        Some(json!({
            "name": "Luis", "email": "", "phone": "555", "service": "adult",
            "date": next_saturday(), "time": "07:00", "participants": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "blank email is rejected");

    let (status, body) = call(
        &h.router,
        Method::POST,
        "/v1/reservations",
        None,
        Some(json!({
            "name": "Luis", "email": "luis@example.com", "phone": "555", "service": "adult",
            "date": next_saturday(), "time": "07:00", "participants": 1,
            "notes": "a".repeat(8 * 1024)
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "oversized notes are rejected up front");
    assert_eq!(body["error"], "El campo notas admite como máximo 1000 caracteres");

    // Email failure does not block the booking.
    let (status, _) = call(
        &h.router,
        Method::POST,
        "/v1/reservations",
        None,
        Some(json!({
            "name": "Luis", "email": "luis@example.com", "phone": "555", "service": "adult",
            "date": next_saturday(), "time": "07:00", "participants": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(h.store.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_confirm_returns_deep_link_and_updates_counts() {
    let ana = reservation("Ana", "+52 1 (55) 1234-5678", ReservationStatus::Pending, "2026-10-24", 1);
    let h = harness(vec![ana.clone()]).await;
    let token = login(&h.router).await;

    let uri = format!("/v1/admin/reservations/{}/confirm", ana.id);
    let (status, body) = call(&h.router, Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reservation"]["status"], "confirmed");
    let link = body["message"]["deep_link"].as_str().unwrap();
    assert!(link.starts_with("https://wa.me/5215512345678?text="));
    assert!(link.contains("CONFIRMADA"));

    let (_, view) = call(&h.router, Method::GET, "/v1/admin/reservations?status=confirmed", Some(&token), None).await;
    assert_eq!(view["reservations"].as_array().unwrap().len(), 1);
    assert_eq!(view["counts"]["pending"], 0);
    assert_eq!(view["counts"]["confirmed"], 1);

    // Already resolved.
    let (status, _) = call(&h.router, Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_pending_reservation_cannot_be_deleted() {
    let ana = reservation("Ana", "555", ReservationStatus::Pending, "2026-10-24", 1);
    let luis = reservation("Luis", "555", ReservationStatus::Cancelled, "2026-10-24", 2);
    let h = harness(vec![ana.clone(), luis.clone()]).await;
    let token = login(&h.router).await;

    let (_, detail) = call(
        &h.router,
        Method::GET,
        &format!("/v1/admin/reservations/{}", ana.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(detail["actions"], json!(["confirm", "cancel"]));

    let (status, _) = call(
        &h.router,
        Method::DELETE,
        &format!("/v1/admin/reservations/{}", ana.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(h.console.get(ana.id).await.unwrap().status, ReservationStatus::Pending);

    let (status, body) = call(
        &h.router,
        Method::DELETE,
        &format!("/v1/admin/reservations/{}", luis.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], luis.id.to_string());
    assert_eq!(h.console.counts().await.all, 1);

    let (status, _) = call(
        &h.router,
        Method::GET,
        &format!("/v1/admin/reservations/{}", Uuid::new_v4()),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_outage_is_reported_and_nothing_changes() {
    let ana = reservation("Ana", "555", ReservationStatus::Pending, "2026-10-24", 1);
    let h = harness(vec![ana.clone()]).await;
    let token = login(&h.router).await;

    h.store.set_offline(true);
    let (status, body) = call(
        &h.router,
        Method::POST,
        &format!("/v1/admin/reservations/{}/cancel", ana.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["applied"], false);
    assert_eq!(h.console.get(ana.id).await.unwrap().status, ReservationStatus::Pending);
    assert!(!h.console.is_busy(ana.id));

    let (status, _) = call(&h.router, Method::POST, "/v1/admin/reservations/refresh", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(h.console.counts().await.all, 1);

    h.store.set_offline(false);
    let (status, body) = call(&h.router, Method::POST, "/v1/admin/reservations/refresh", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_calendar_and_day_selection() {
    let ana = reservation("Ana", "555", ReservationStatus::Pending, "2026-10-24", 1);
    let luis = reservation("Luis", "555", ReservationStatus::Confirmed, "2026-10-24", 2);
    let marta = reservation("Marta", "555", ReservationStatus::Confirmed, "2026-10-05", 3);
    let h = harness(vec![ana, luis, marta.clone()]).await;
    let token = login(&h.router).await;

    let (status, view) = call(
        &h.router,
        Method::GET,
        "/v1/admin/calendar?year=2026&month=10",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["title"], "Octubre 2026");
    assert_eq!(view["leading_blanks"], 4);
    assert_eq!(view["days"].as_array().unwrap().len(), 31);
    assert_eq!(view["days"][23]["total"], 2);
    assert_eq!(view["days"][23]["has_pending"], true);

    let (_, single) = call(&h.router, Method::GET, "/v1/admin/calendar/2026-10-05", Some(&token), None).await;
    assert_eq!(single["detail"]["id"], marta.id.to_string());

    let (_, busy) = call(&h.router, Method::GET, "/v1/admin/calendar/2026-10-24", Some(&token), None).await;
    assert!(busy["detail"].is_null());
    assert_eq!(busy["reservations"].as_array().unwrap().len(), 2);

    let (status, _) = call(
        &h.router,
        Method::GET,
        "/v1/admin/calendar?year=2026&month=13",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &h.router,
        Method::GET,
        "/v1/admin/calendar?year=2147483647&month=12",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, view) = call(
        &h.router,
        Method::GET,
        "/v1/admin/calendar?year=2026&month=12",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(view["next"], json!({ "year": 2027, "month": 1 }));
}

#[tokio::test]
async fn test_public_catalog_and_notification_endpoint() {
    let h = harness(vec![]).await;

    let (status, services) = call(&h.router, Method::GET, "/v1/services", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(services.as_array().unwrap().len(), 6);
    assert_eq!(services[1]["label"], "Clases Infantiles (4 - 12 años)");

    let uri = format!("/v1/availability?date={}", next_saturday());
    let (_, availability) = call(&h.router, Method::GET, &uri, None, None).await;
    assert_eq!(availability["bookable"], true);
    assert_eq!(availability["slots"].as_array().unwrap().len(), 16);

    let (status, body) = call(
        &h.router,
        Method::POST,
        "/v1/notifications",
        None,
        Some(json!({
            "name": "Ana", "phone": "555", "email": "", "service": "Membresía",
            "date": "sábado, 24 de octubre de 2026", "time": "07:00", "participants": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_console_stream_delivers_live_updates() {
    let h = harness(vec![]).await;
    let token = login(&h.router).await;

    let (status, _) = call(&h.router, Method::GET, "/v1/admin/stream?access_token=forged", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut frames = open_stream(&h.router, &token).await;
    let mut seen = String::new();

    let (status, body) = call(
        &h.router,
        Method::POST,
        "/v1/reservations",
        None,
        Some(json!({
            "name": "Ana", "email": "ana@example.com", "phone": "5215512345678",
            "service": "kids", "date": next_saturday(), "time": "10:00", "participants": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["reservation_id"].as_str().unwrap().to_string();

    read_until(&mut frames, &mut seen, "event: inserted").await;
    read_until(&mut frames, &mut seen, "event: alert").await;
    assert!(seen.contains(&id));

    wait_for_pending(&h.console, 1).await;
    let uri = format!("/v1/admin/reservations/{id}/confirm");
    let (status, _) = call(&h.router, Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    read_until(&mut frames, &mut seen, "event: status_changed").await;

    let uri = format!("/v1/admin/reservations/{id}");
    let (status, _) = call(&h.router, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    read_until(&mut frames, &mut seen, "event: removed").await;
}

#[tokio::test]
async fn test_lagging_stream_is_told_to_resync() {
    let h = harness(vec![]).await;
    let token = login(&h.router).await;
    let mut frames = open_stream(&h.router, &token).await;

    // More refreshes than the event buffer holds, none of them read yet.
    for _ in 0..300 {
        h.console.load_all().await.unwrap();
    }

    let mut seen = String::new();
    read_until(&mut frames, &mut seen, "event: resync").await;
    assert!(seen.contains("\"skipped\""));
}
