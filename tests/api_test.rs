//! HTTP-level tests: auth middleware, the operator gate, and response
//! privacy, driven through the full router.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower::ServiceExt;
use uuid::Uuid;

use farm_notify::auth::create_jwt;
use farm_notify::notification::{NotificationRepository, NotificationService};
use farm_notify::routes::create_router;
use farm_notify::state::{AppState, Config};
use farm_notify::user::UserRepository;

const JWT_SECRET: &str = "test-secret";

fn test_app(pool: PgPool) -> Router {
    let config = Arc::new(Config {
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration_hours: 1,
    });
    let (notification_tx, _) = broadcast::channel(16);
    let user_repository = UserRepository::new(pool.clone());
    let notification_repository = NotificationRepository::new(pool.clone());
    let notification_service =
        NotificationService::new(notification_repository.clone(), user_repository.clone());

    create_router(AppState {
        db: pool,
        config,
        notification_tx,
        user_repository,
        notification_repository,
        notification_service,
    })
}

fn token(user_id: Uuid, role: &str) -> String {
    create_jwt(user_id, role, JWT_SECRET, 1).unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[sqlx::test]
async fn requests_without_token_are_rejected(pool: PgPool) {
    let app = test_app(pool);

    let response = app
        .oneshot(request(Method::GET, "/api/notifications", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
async fn non_operators_cannot_reach_admin_routes(pool: PgPool) {
    let app = test_app(pool);
    let worker_token = token(Uuid::new_v4(), "worker");

    let response = app
        .oneshot(request(
            Method::POST,
            "/api/admin/notifications",
            Some(&worker_token),
            Some(json!({
                "title": "Nope",
                "message": "Workers cannot create notifications",
                "is_global": true
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test]
async fn create_list_and_mark_read_round_trip(pool: PgPool) {
    let app = test_app(pool);
    let admin_token = token(Uuid::new_v4(), "admin");
    let user_token = token(Uuid::new_v4(), "worker");

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/admin/notifications",
            Some(&admin_token),
            Some(json!({
                "title": "Low stock",
                "message": "Seed bin below threshold",
                "category": "inventory",
                "is_global": true
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Another user's read state must not be observable: no recipients field
    // anywhere in a non-operator response.
    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            "/api/notifications",
            Some(&user_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = json_body(response).await;
    assert_eq!(listing["unread_count"], json!(1));
    assert_eq!(listing["total"], json!(1));
    assert_eq!(listing["total_pages"], json!(1));
    assert_eq!(listing["data"][0]["read"], json!(false));
    assert!(listing["data"][0].get("recipients").is_none());

    // Paging past the end keeps the envelope honest: empty page, same totals.
    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            "/api/notifications?page=2&limit=1",
            Some(&user_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = json_body(response).await;
    assert_eq!(listing["data"], json!([]));
    assert_eq!(listing["total"], json!(1));
    assert_eq!(listing["page"], json!(2));
    assert_eq!(listing["total_pages"], json!(1));

    let response = app
        .clone()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/notifications/{id}/read"),
            Some(&user_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/api/notifications/{id}"),
            Some(&user_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = json_body(response).await;
    assert_eq!(fetched["read"], json!(true));
}

#[sqlx::test]
async fn validation_errors_surface_with_stable_shape(pool: PgPool) {
    let app = test_app(pool);
    let admin_token = token(Uuid::new_v4(), "admin");

    let response = app
        .oneshot(request(
            Method::POST,
            "/api/admin/notifications",
            Some(&admin_token),
            Some(json!({
                "title": "Targeted but empty",
                "message": "No recipients supplied",
                "is_global": false
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("recipients"));
}

#[sqlx::test]
async fn operator_recipients_view_exposes_read_markers(pool: PgPool) {
    let app = test_app(pool);
    let admin_token = token(Uuid::new_v4(), "admin");
    let user_a = Uuid::new_v4();
    let user_a_token = token(user_a, "worker");

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/admin/notifications",
            Some(&admin_token),
            Some(json!({
                "title": "Crew notice",
                "message": "Targeted delivery",
                "is_global": false,
                "recipients": [user_a, Uuid::new_v4()]
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = json_body(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/notifications/{id}/read"),
            Some(&user_a_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/api/admin/notifications/{id}/recipients"),
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let entries = json_body(response).await;
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    let entry_a = entries
        .iter()
        .find(|e| e["user_id"] == json!(user_a))
        .unwrap();
    assert_eq!(entry_a["is_read"], json!(true));
    assert!(entry_a["read_at"].is_string());
}
