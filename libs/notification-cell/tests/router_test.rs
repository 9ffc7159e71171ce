mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use notification_cell::create_notification_router;
use notification_cell::handlers::NotificationState;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

use common::{utc, Clinic};

fn router(clinic: &Clinic) -> (Router, TestConfig) {
    let config = TestConfig::default();
    let state = NotificationState {
        feed: clinic.feed(),
        read_state: clinic.read_state.clone(),
        clock: clinic.clock.clone(),
        clinic_offset: utc(),
    };
    (create_notification_router(Arc::new(state), config.to_arc()), config)
}

async fn send(router: &Router, method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

/// Keys of everything a `GET /notifications` body is displaying.
fn displayed_keys(body: &Value) -> Vec<Value> {
    ["new_requests", "today"]
        .iter()
        .flat_map(|list| body[*list].as_array().cloned().unwrap_or_default())
        .map(|entry| entry["key"].clone())
        .collect()
}

#[tokio::test]
async fn notifications_require_a_valid_token() {
    let clinic = Clinic::new();
    let (router, _) = router(&clinic);
    let doctor = TestUser::doctor("house@example.com").with_id(clinic.cardiologist.id.to_string());

    let (status, _) = send(&router, Method::GET, "/notifications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = format!("Bearer {}", JwtTestUtils::create_invalid_signature_token(&doctor));
    let (status, _) = send(&router, Method::GET, "/notifications", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn doctor_dashboard_flow() {
    let clinic = Clinic::new();
    let (router, config) = router(&clinic);
    let doctor = TestUser::doctor("house@example.com").with_id(clinic.cardiologist.id.to_string());
    let auth = JwtTestUtils::bearer(&doctor, &config.jwt_secret);

    let appointment = clinic
        .book("Cardiology", Some(clinic.cardiologist.id), clinic.today())
        .await;

    let (status, body) = send(&router, Method::GET, "/notifications", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_requests"][0]["key"], appointment.id.to_string());
    assert_eq!(body["today"][0]["key"], format!("today-{}", appointment.id));

    let (status, body) = send(
        &router,
        Method::POST,
        "/notifications/read",
        Some(&auth),
        Some(json!({ "appointment_id": appointment.id, "kind": "today" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key"], format!("today-{}", appointment.id));

    let (_, body) = send(&router, Method::GET, "/notifications", Some(&auth), None).await;
    assert!(body["today"].as_array().unwrap().is_empty());
    assert_eq!(body["new_requests"].as_array().unwrap().len(), 1);

    let keys = displayed_keys(&body);
    let (status, body) = send(
        &router,
        Method::POST,
        "/notifications/read-all",
        Some(&auth),
        Some(json!({ "keys": keys })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 1);

    let (_, body) = send(&router, Method::GET, "/notifications", Some(&auth), None).await;
    assert!(body["new_requests"].as_array().unwrap().is_empty());

    let (status, _) = send(&router, Method::DELETE, "/notifications/read-state", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&router, Method::GET, "/notifications", Some(&auth), None).await;
    assert_eq!(body["new_requests"].as_array().unwrap().len(), 1);
    assert_eq!(body["today"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn read_state_is_per_user() {
    let clinic = Clinic::new();
    let (router, config) = router(&clinic);
    clinic.book("Cardiology", Some(clinic.cardiologist.id), clinic.today()).await;

    let first_admin = JwtTestUtils::bearer(&TestUser::admin("one@example.com"), &config.jwt_secret);
    let second_admin = JwtTestUtils::bearer(&TestUser::admin("two@example.com"), &config.jwt_secret);

    let (_, shown) = send(&router, Method::GET, "/notifications", Some(&first_admin), None).await;
    let (_, body) = send(
        &router,
        Method::POST,
        "/notifications/read-all",
        Some(&first_admin),
        Some(json!({ "keys": displayed_keys(&shown) })),
    )
    .await;
    assert_eq!(body["marked"], 2);

    let (_, body) = send(&router, Method::GET, "/notifications", Some(&first_admin), None).await;
    assert!(displayed_keys(&body).is_empty());

    let (_, body) = send(&router, Method::GET, "/notifications", Some(&second_admin), None).await;
    assert_eq!(body["new_requests"].as_array().unwrap().len(), 1);
    assert_eq!(body["today"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let clinic = Clinic::new();
    let (router, config) = router(&clinic);

    let malformed_doctor = TestUser::doctor("x@example.com").with_id("not-a-uuid");
    let auth = JwtTestUtils::bearer(&malformed_doctor, &config.jwt_secret);
    let (status, _) = send(&router, Method::GET, "/notifications", Some(&auth), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let patient = JwtTestUtils::bearer(&TestUser::patient("ada@example.com"), &config.jwt_secret);
    let (status, _) = send(
        &router,
        Method::POST,
        "/notifications/read",
        Some(&patient),
        Some(json!({ "appointment_id": "nope", "kind": "yesterday" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &router,
        Method::POST,
        "/notifications/read-all",
        Some(&patient),
        Some(json!({ "keys": ["today-not-a-uuid"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&router, Method::POST, "/notifications/read-all", Some(&patient), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn read_all_leaves_unseen_bookings_unread() {
    let clinic = Clinic::new();
    let (router, config) = router(&clinic);
    let doctor = TestUser::doctor("house@example.com").with_id(clinic.cardiologist.id.to_string());
    let auth = JwtTestUtils::bearer(&doctor, &config.jwt_secret);

    let seen = clinic
        .book("Cardiology", Some(clinic.cardiologist.id), clinic.today())
        .await;
    let (_, shown) = send(&router, Method::GET, "/notifications", Some(&auth), None).await;
    assert_eq!(displayed_keys(&shown).len(), 2);

    let arrived = clinic
        .book("Cardiology", Some(clinic.cardiologist.id), clinic.today())
        .await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/notifications/read-all",
        Some(&auth),
        Some(json!({ "keys": displayed_keys(&shown) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 2);

    let (_, body) = send(&router, Method::GET, "/notifications", Some(&auth), None).await;
    let keys = displayed_keys(&body);
    assert_eq!(
        keys,
        vec![json!(arrived.id.to_string()), json!(format!("today-{}", arrived.id))]
    );
    assert!(!keys.contains(&json!(seen.id.to_string())));
}
