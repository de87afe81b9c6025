#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::auth::issue_token;
use storefront_api::config::AppConfig;
use storefront_api::db::{ensure_schema, establish_connection};
use storefront_api::entities::{cart, order, product};
use storefront_api::errors::ServiceError;
use storefront_api::events::{Event, EventSender};
use storefront_api::handlers::AppServices;
use storefront_api::payments::{signature, PaymentGateway, PaymentIntent};
use storefront_api::services::{CartService, CatalogService, CheckoutService};
use storefront_api::{app_router, AppState};

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Gateway fake that hands out sequential order ids and records every
/// intent it creates.
#[derive(Default)]
pub struct MockGateway {
    counter: AtomicUsize,
    pub intents: Mutex<Vec<PaymentIntent>>,
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        _receipt: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let intent = PaymentIntent {
            external_order_id: format!("order_test_{:04}", n),
            amount_cents,
            currency: currency.to_string(),
        };
        self.intents.lock().unwrap().push(intent.clone());
        Ok(intent)
    }
}

/// Gateway fake that rejects every intent.
pub struct FailingGateway;

#[async_trait]
impl PaymentGateway for FailingGateway {
    async fn create_intent(
        &self,
        _amount_cents: i64,
        _currency: &str,
        _receipt: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        Err(ServiceError::PaymentGateway("gateway unavailable".into()))
    }
}

pub struct TestApp {
    router: Router,
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub gateway: Arc<MockGateway>,
    _event_rx: mpsc::Receiver<Event>,
}

fn test_config() -> AppConfig {
    AppConfig {
        // every in-memory sqlite connection is its own database, so the
        // pool must stay at a single connection
        database_url: "sqlite::memory:".into(),
        jwt_secret: "integration-test-secret-0123456789abcdef".into(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "test".into(),
        log_level: "warn".into(),
        log_json: false,
        auto_migrate: true,
        currency: "INR".into(),
        order_retention_days: 30,
        payment_base_url: "http://gateway.invalid".into(),
        payment_key_id: "rzp_test_key".into(),
        payment_key_secret: "rzp_test_secret".into(),
        payment_webhook_secret: "webhook_secret_0123456789".into(),
        payment_timeout_secs: 5,
        cors_allowed_origins: None,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    pub async fn with_failing_gateway() -> Self {
        Self::build(Some(Arc::new(FailingGateway))).await
    }

    async fn build(gateway_override: Option<Arc<dyn PaymentGateway>>) -> Self {
        let config = test_config();
        let db = Arc::new(establish_connection(&config).await.unwrap());
        ensure_schema(&db).await.unwrap();

        let (tx, rx) = mpsc::channel(1024);
        let event_sender = EventSender::new(tx);

        let mock = Arc::new(MockGateway::default());
        let gateway: Arc<dyn PaymentGateway> = match gateway_override {
            Some(g) => g,
            None => mock.clone(),
        };

        let services = AppServices::new(
            CatalogService::new(db.clone(), event_sender.clone()),
            CartService::new(db.clone(), event_sender.clone()),
            CheckoutService::new(
                db.clone(),
                gateway,
                event_sender.clone(),
                config.currency.clone(),
                config.order_retention_days,
            ),
        );

        let state = AppState {
            db: db.clone(),
            config: config.clone(),
            event_sender,
            services,
        };

        TestApp {
            router: app_router(state),
            db,
            config,
            gateway: mock,
            _event_rx: rx,
        }
    }

    pub fn token_for(&self, user_id: Uuid, email: &str, name: &str) -> String {
        issue_token(&self.config.jwt_secret, user_id, email, name, Duration::hours(1)).unwrap()
    }

    pub async fn seed_product(&self, name: &str, price_cents: i64, available: i32) -> product::Model {
        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(format!("{} description", name)),
            price_cents: Set(price_cents),
            currency: Set("INR".into()),
            available_quantity: Set(available),
            seller_id: Set(Uuid::new_v4()),
            brand: Set("Acme".into()),
            category: Set("general".into()),
            image_url: Set("https://img.example/p.png".into()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(&*self.db).await.unwrap()
    }

    pub async fn set_stock(&self, product_id: Uuid, available: i32) {
        let existing = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await
            .unwrap()
            .unwrap();
        let mut model: product::ActiveModel = existing.into();
        model.available_quantity = Set(available);
        model.update(&*self.db).await.unwrap();
    }

    pub async fn set_price(&self, product_id: Uuid, price_cents: i64) {
        let existing = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await
            .unwrap()
            .unwrap();
        let mut model: product::ActiveModel = existing.into();
        model.price_cents = Set(price_cents);
        model.update(&*self.db).await.unwrap();
    }

    pub async fn fetch_product(&self, product_id: Uuid) -> product::Model {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn fetch_cart(&self, user_id: Uuid) -> Option<cart::Model> {
        use sea_orm::{ColumnTrait, QueryFilter};
        cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await
            .unwrap()
    }

    pub async fn fetch_order(&self, external_order_id: &str) -> Option<order::Model> {
        use sea_orm::{ColumnTrait, QueryFilter};
        order::Entity::find()
            .filter(order::Column::ExternalOrderId.eq(external_order_id))
            .one(&*self.db)
            .await
            .unwrap()
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
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

    /// Deliver a raw webhook body, optionally signed.
    pub async fn post_webhook(&self, body: &str, sig: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/payments/webhook")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(sig) = sig {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    pub fn sign_webhook(&self, body: &str) -> String {
        signature::sign(body.as_bytes(), &self.config.payment_webhook_secret)
    }
}

/// Webhook body for a captured payment on the given gateway order.
pub fn captured_webhook_body(external_order_id: &str, amount_cents: i64) -> String {
    serde_json::json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_test_123",
                    "order_id": external_order_id,
                    "captured": true,
                    "amount": amount_cents,
                    "currency": "INR"
                }
            }
        }
    })
    .to_string()
}
