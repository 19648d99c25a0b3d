//! End-to-end flows through the HTTP router against the in-memory store

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use aqua_server::config::Config;
use aqua_server::db::MemoryStore;
use aqua_server::email::LogMailer;
use aqua_server::payment::{PayOsGateway, VnPayGateway};
use aqua_server::state::{AppState, Gateways};
use aqua_server::storage::MemoryStorage;
use aqua_server::util::hash_password;
use aqua_server::api;
use shared::models::{User, UserRole, UserStatus};

struct Harness {
    app: Router,
    state: AppState,
}

fn harness() -> Harness {
    let config = Config::default();
    let gateways = Gateways {
        payos: Arc::new(
            PayOsGateway::new(config.payos.clone(), std::time::Duration::from_millis(500))
                .unwrap(),
        ),
        vnpay: Arc::new(VnPayGateway::new(config.vnpay.clone())),
    };
    let state = AppState::from_parts(
        config,
        Arc::new(MemoryStore::new()),
        gateways,
        Arc::new(MemoryStorage::new()),
        Arc::new(LogMailer::new()),
    );
    Harness {
        app: api::create_router(state.clone()),
        state,
    }
}

impl Harness {
    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Staff accounts are provisioned outside the public API
    async fn seed_staff(&self, email: &str, role: UserRole) {
        let now = chrono::Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: hash_password("staff-pass-1").unwrap(),
            full_name: "Staff".into(),
            phone: None,
            address: None,
            role,
            status: UserStatus::Available,
            created_at: now,
            updated_at: now,
        };
        let mut uow = self.state.store.begin().await.unwrap();
        uow.insert_user(&user).await.unwrap();
        uow.commit().await.unwrap();
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["token"].as_str().unwrap().to_owned()
    }
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let (status, body) = h.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_checkout_and_bank_transfer_flow() {
    let h = harness();
    h.seed_staff("manager@aqua.test", UserRole::Manager).await;
    let manager = h.login("manager@aqua.test", "staff-pass-1").await;

    let (status, _) = h
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "lan@aqua.test",
                "password": "aquarium123",
                "full_name": "Lan Nguyen",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let customer = h.login("lan@aqua.test", "aquarium123").await;

    // catalog set up by the manager
    let (_, category) = h
        .call(
            "POST",
            "/api/categories",
            Some(&manager),
            Some(json!({ "name": "Filters" })),
        )
        .await;
    let category_id = category["data"]["id"].as_str().unwrap().to_owned();
    let (status, product) = h
        .call(
            "POST",
            "/api/products",
            Some(&manager),
            Some(json!({
                "category_id": category_id,
                "name": "Canister filter 1200L",
                "price": "12.50",
                "quantity": 5,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{product}");
    let product_id = product["data"]["id"].as_str().unwrap().to_owned();

    // anonymous catalog browsing
    let (status, listed) = h.call("GET", "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"]["total"], 1);

    // cart → order
    let (_, item) = h
        .call(
            "POST",
            "/api/cart/items",
            Some(&customer),
            Some(json!({ "product_id": product_id, "quantity": 2 })),
        )
        .await;
    let item_id = item["data"]["id"].as_str().unwrap().to_owned();
    let (status, checkout) = h
        .call(
            "POST",
            "/api/orders",
            Some(&customer),
            Some(json!({
                "cart_item_ids": [item_id],
                "address": "1 Nguyen Hue, HCMC",
                "ship_cost": "3.00",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{checkout}");
    let order = &checkout["data"]["order"];
    assert_eq!(order["status"], "PENDING_PAYMENT");
    assert_eq!(order["total_price"], "25.00");
    assert_eq!(checkout["data"]["amount_due"], "28.00");
    let order_id = order["id"].as_str().unwrap().to_owned();

    // wrong amount is refused
    let (status, _) = h
        .call(
            "POST",
            "/api/payments",
            Some(&customer),
            Some(json!({ "order_id": order_id, "method": "BANK_TRANSFER", "amount": "25.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, payment) = h
        .call(
            "POST",
            "/api/payments",
            Some(&customer),
            Some(json!({ "order_id": order_id, "method": "BANK_TRANSFER", "amount": "28.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{payment}");
    assert_eq!(payment["data"]["status"], "PENDING");
    assert!(payment["data"]["bank_info"]["transfer_content"]
        .as_str()
        .unwrap()
        .starts_with("AQUA "));
    let payment_id = payment["data"]["id"].as_str().unwrap().to_owned();

    // only staff can confirm
    let uri = format!("/api/payments/{payment_id}/confirm");
    let (status, _) = h.call("POST", &uri, Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, outcome) = h.call("POST", &uri, Some(&manager), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["data"]["status"], "COMPLETED");

    let (_, view) = h
        .call("GET", &format!("/api/orders/{order_id}"), Some(&customer), None)
        .await;
    assert_eq!(view["data"]["status"], "PAID");
    assert_eq!(view["data"]["payments"][0]["status"], "COMPLETED");
}

#[tokio::test]
async fn test_auth_and_error_envelope() {
    let h = harness();

    let (status, body) = h.call("GET", "/api/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
    assert!(body["code"].as_u64().unwrap() > 0);

    let (status, _) = h.call("GET", "/api/orders", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    h.seed_staff("tech@aqua.test", UserRole::Technician).await;
    let tech = h.login("tech@aqua.test", "staff-pass-1").await;
    let (status, body) = h
        .call(
            "POST",
            "/api/categories",
            Some(&tech),
            Some(json!({ "name": "Lights" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.get("data").is_none());

    let (status, body) = h
        .call(
            "GET",
            &format!("/api/products/{}", Uuid::new_v4()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let h = harness();
    let body = json!({ "code": "00", "data": { "orderCode": 1, "amount": 1000 } });
    let request = Request::builder()
        .method("POST")
        .uri("/api/payments/payos/webhook")
        .header("content-type", "application/json")
        .header("x-signature", "deadbeef")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let ack: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(ack["success"], false);
}

#[tokio::test]
async fn test_login_rate_limited() {
    let h = harness();
    let attempt = json!({ "email": "nobody@aqua.test", "password": "whatever1" });
    for _ in 0..5 {
        let (status, _) = h
            .call("POST", "/api/auth/login", None, Some(attempt.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, _) = h
        .call("POST", "/api/auth/login", None, Some(attempt))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}
