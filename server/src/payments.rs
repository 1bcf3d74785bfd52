//! Checkout sessions and the payment webhook.
//!
//! Outbound: `/checkout` prices the requested seats, records a pending
//! order and asks the gateway for a hosted checkout page.
//!
//! Inbound: the gateway posts signed events to `/webhooks/payment`. The
//! HMAC signature over the raw body is enforced, deliveries are
//! deduplicated by id, and the delivery id is recorded only after the
//! order write succeeds so a failed write stays retryable.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use seatmap::SeatRef;

use crate::{
    auth::{AuthUser, generate_salt, hash_password},
    database::OrderRow,
    error::AppError,
    maps,
    state::AppState,
    utils::generate_password,
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const DELIVERY_HEADER: &str = "x-delivery-id";

const GENERATED_PASSWORD_LENGTH: usize = 12;

// ── gateway client ──────────────────────────────────────────────────────

pub struct GatewayClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
pub struct SessionRequest<'a> {
    pub amount_cents: i64,
    pub currency: &'a str,
    pub order_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn create_session(
        &self,
        request: &SessionRequest<'_>,
    ) -> Result<CheckoutSession, AppError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "session create returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))
    }
}

// ── checkout route ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub worshiper_id: i64,
    pub map: String,
    pub seats: Vec<SeatRef>,
    /// Create an account for the worshiper once the order is paid.
    #[serde(default)]
    pub provision_account: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub url: String,
}

pub async fn checkout_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    if payload.seats.is_empty() {
        return Err(AppError::MalformedPayload);
    }

    let worshiper = state
        .db
        .worshiper(payload.worshiper_id)?
        .ok_or(AppError::NotFound)?;
    // Checkout needs somewhere to send the receipt and the password.
    let email = worshiper.email.ok_or(AppError::MalformedPayload)?;

    let map = maps::load_map(&state, &payload.map)?;
    if payload.seats.iter().any(|seat| !map.seat_exists(*seat)) {
        return Err(AppError::MalformedPayload);
    }

    let order_id = Uuid::new_v4().to_string();
    let amount_cents = payload.seats.len() as i64 * state.config.seat_price_cents;

    state.db.insert_order(&OrderRow {
        id: order_id.clone(),
        worshiper_id: payload.worshiper_id,
        email: email.clone(),
        amount_cents,
        currency: state.config.currency.clone(),
        seat_count: payload.seats.len() as i64,
        status: "pending".to_string(),
        session_id: None,
        provision_account: payload.provision_account,
    })?;

    let session = state
        .gateway
        .create_session(&SessionRequest {
            amount_cents,
            currency: &state.config.currency,
            order_id: &order_id,
            success_url: &state.config.success_url,
            cancel_url: &state.config.cancel_url,
        })
        .await;

    let session = match session {
        Ok(session) => session,
        Err(e) => {
            state.db.set_order_status(&order_id, "failed")?;
            return Err(e);
        }
    };

    state.db.set_order_session(&order_id, &session.id)?;
    info!("Order {order_id} checkout session {}", session.id);

    Ok(Json(CheckoutResponse {
        order_id,
        url: session.url,
    }))
}

// ── webhook route ───────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Deserialize)]
pub struct WebhookData {
    pub order_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Checks `sha256=<hex>` against an HMAC over the raw body bytes.
pub fn verify_signature(secret: &[u8], body: &[u8], header: &str) -> Result<(), AppError> {
    let hex_signature = header
        .strip_prefix("sha256=")
        .ok_or(AppError::InvalidSignature)?;
    let signature = hex::decode(hex_signature).map_err(|_| AppError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| AppError::InvalidSignature)
}

pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;
    verify_signature(state.config.webhook_secret.as_bytes(), &body, signature)?;

    let delivery_id = headers
        .get(DELIVERY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::MalformedPayload)?;

    if state.db.delivery_seen(delivery_id)? {
        info!("Duplicate delivery {delivery_id}, skipping");
        return Ok(StatusCode::OK);
    }

    let event: WebhookEvent =
        serde_json::from_slice(&body).map_err(|_| AppError::MalformedPayload)?;

    match event.event_type.as_str() {
        "checkout.completed" => handle_completed(&state, &event.data).await?,
        "checkout.expired" => handle_expired(&state, &event.data)?,
        other => {
            warn!("Unsupported webhook event type: {other}");
            return Err(AppError::MalformedPayload);
        }
    }

    state.db.mark_delivery(delivery_id)?;

    Ok(StatusCode::OK)
}

async fn handle_completed(state: &AppState, data: &WebhookData) -> Result<(), AppError> {
    let Some(order) = state.db.order(&data.order_id)? else {
        // Acknowledge so the gateway stops retrying a dead order.
        warn!("Webhook for unknown order {}", data.order_id);
        return Ok(());
    };

    if order.status == "paid" {
        info!("Order {} already paid", order.id);
        return Ok(());
    }

    state.db.set_order_status(&order.id, "paid")?;
    info!(
        "Order {} paid (session {})",
        order.id,
        data.session_id.as_deref().unwrap_or("unknown")
    );

    if order.provision_account {
        provision_account(state, &order.email).await?;
    }

    Ok(())
}

fn handle_expired(state: &AppState, data: &WebhookData) -> Result<(), AppError> {
    let Some(order) = state.db.order(&data.order_id)? else {
        warn!("Webhook for unknown order {}", data.order_id);
        return Ok(());
    };

    // Only a pending order can expire; a paid one keeps its status.
    if order.status == "pending" {
        state.db.set_order_status(&order.id, "expired")?;
        info!("Order {} expired", order.id);
    }

    Ok(())
}

/// Creates the account with a generated password and mails it. An existing
/// account is left untouched. Mail failure is logged, not fatal: payment
/// state must never be lost to a mail outage.
async fn provision_account(state: &AppState, email: &str) -> Result<(), AppError> {
    if state.db.user_by_email(email)?.is_some() {
        info!("Account {email} already exists, skipping provisioning");
        return Ok(());
    }

    let password = generate_password(GENERATED_PASSWORD_LENGTH);
    let salt = generate_salt();
    state
        .db
        .insert_user(email, &hash_password(&password, &salt), &salt)?;
    info!("Provisioned account {email}");

    let text = format!(
        "Welcome! Your seat-map account is ready.\n\nEmail: {email}\nPassword: {password}\n"
    );
    if let Err(e) = state.mailer.send(email, "Your account", &text).await {
        warn!("Password mail to {email} failed: {e}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, database::Database, email::Mailer};
    use axum::http::HeaderValue;
    use seatmap::{Bench, Orientation, SeatMap};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WEBHOOK_SECRET: &str = "webhook-secret";

    fn test_config(gateway_url: &str, mail_url: &str) -> Config {
        Config {
            port: 0,
            database_path: ":memory:".to_string(),
            seat_price_cents: 18000,
            currency: "usd".to_string(),
            gateway_url: gateway_url.to_string(),
            success_url: "https://localhost/ok".to_string(),
            cancel_url: "https://localhost/no".to_string(),
            mail_url: mail_url.to_string(),
            mail_from: "gabbai@shul.org".to_string(),
            token_ttl_minutes: 60,
            auth_secret: "auth-secret".to_string(),
            gateway_key: "gateway-key".to_string(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            mail_key: "mail-key".to_string(),
        }
    }

    fn test_state(gateway_url: &str, mail_url: &str) -> Arc<AppState> {
        let config = test_config(gateway_url, mail_url);

        Arc::new(AppState {
            db: Database::open_in_memory().unwrap(),
            gateway: GatewayClient::new(gateway_url, "gateway-key"),
            mailer: Mailer::new(mail_url, "mail-key", "gabbai@shul.org"),
            config,
        })
    }

    fn sign(body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn webhook_headers(signature: &str, delivery_id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(signature).unwrap());
        headers.insert(DELIVERY_HEADER, HeaderValue::from_str(delivery_id).unwrap());
        headers
    }

    fn pending_order(state: &AppState, id: &str, provision: bool) -> OrderRow {
        let order = OrderRow {
            id: id.to_string(),
            worshiper_id: 1,
            email: "rivka@shul.org".to_string(),
            amount_cents: 18000,
            currency: "usd".to_string(),
            seat_count: 1,
            status: "pending".to_string(),
            session_id: None,
            provision_account: provision,
        };
        state.db.insert_order(&order).unwrap();
        order
    }

    #[test]
    fn signature_verification_is_enforced() {
        let body = br#"{"type":"checkout.completed"}"#;
        let good = sign(body);

        assert!(verify_signature(WEBHOOK_SECRET.as_bytes(), body, &good).is_ok());

        let err = verify_signature(WEBHOOK_SECRET.as_bytes(), b"other body", &good).unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));

        let err = verify_signature(WEBHOOK_SECRET.as_bytes(), body, "nonsense").unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));

        let err =
            verify_signature(WEBHOOK_SECRET.as_bytes(), body, "sha256=zznothex").unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));
    }

    #[tokio::test]
    async fn gateway_session_create_round_trips() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "sess-1",
                "url": "https://gateway.example.com/pay/sess-1"
            })))
            .expect(1)
            .mount(&gateway)
            .await;

        let client = GatewayClient::new(&gateway.uri(), "gateway-key");
        let session = client
            .create_session(&SessionRequest {
                amount_cents: 18000,
                currency: "usd",
                order_id: "ord-1",
                success_url: "https://localhost/ok",
                cancel_url: "https://localhost/no",
            })
            .await
            .unwrap();

        assert_eq!(session.id, "sess-1");
        assert!(session.url.ends_with("sess-1"));
    }

    #[tokio::test]
    async fn gateway_error_status_is_a_gateway_error() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&gateway)
            .await;

        let client = GatewayClient::new(&gateway.uri(), "gateway-key");
        let err = client
            .create_session(&SessionRequest {
                amount_cents: 1,
                currency: "usd",
                order_id: "ord-1",
                success_url: "s",
                cancel_url: "c",
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Gateway(_)));
    }

    #[tokio::test]
    async fn completed_webhook_marks_paid_and_provisions_once() {
        let mail = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mail)
            .await;

        let state = test_state("https://gateway.invalid", &mail.uri());
        pending_order(&state, "ord-1", true);

        let body = serde_json::json!({
            "type": "checkout.completed",
            "data": { "order_id": "ord-1", "session_id": "sess-1" }
        })
        .to_string();

        let status = webhook_handler(
            State(state.clone()),
            webhook_headers(&sign(body.as_bytes()), "d-1"),
            Bytes::from(body.clone()),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);

        let order = state.db.order("ord-1").unwrap().unwrap();
        assert_eq!(order.status, "paid");
        assert!(state.db.user_by_email("rivka@shul.org").unwrap().is_some());

        // Replay under a fresh delivery id: already paid, no second mail.
        let status = webhook_handler(
            State(state.clone()),
            webhook_headers(&sign(body.as_bytes()), "d-2"),
            Bytes::from(body),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_delivery_is_acknowledged_without_reprocessing() {
        let state = test_state("https://gateway.invalid", "https://mail.invalid");
        pending_order(&state, "ord-1", false);

        let body = serde_json::json!({
            "type": "checkout.expired",
            "data": { "order_id": "ord-1" }
        })
        .to_string();
        let headers = webhook_headers(&sign(body.as_bytes()), "d-1");

        webhook_handler(State(state.clone()), headers.clone(), Bytes::from(body.clone()))
            .await
            .unwrap();
        assert_eq!(state.db.order("ord-1").unwrap().unwrap().status, "expired");

        // Flip the order back by hand; the replayed delivery must not touch it.
        state.db.set_order_status("ord-1", "pending").unwrap();
        webhook_handler(State(state.clone()), headers, Bytes::from(body))
            .await
            .unwrap();
        assert_eq!(state.db.order("ord-1").unwrap().unwrap().status, "pending");
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_before_any_write() {
        let state = test_state("https://gateway.invalid", "https://mail.invalid");
        pending_order(&state, "ord-1", false);

        let body = serde_json::json!({
            "type": "checkout.completed",
            "data": { "order_id": "ord-1" }
        })
        .to_string();

        let err = webhook_handler(
            State(state.clone()),
            webhook_headers("sha256=00ff", "d-1"),
            Bytes::from(body),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::InvalidSignature));
        assert_eq!(state.db.order("ord-1").unwrap().unwrap().status, "pending");
        assert!(!state.db.delivery_seen("d-1").unwrap());
    }

    #[tokio::test]
    async fn unknown_event_type_is_rejected_and_retryable() {
        let state = test_state("https://gateway.invalid", "https://mail.invalid");

        let body = serde_json::json!({
            "type": "checkout.unknowable",
            "data": { "order_id": "ord-1" }
        })
        .to_string();

        let err = webhook_handler(
            State(state.clone()),
            webhook_headers(&sign(body.as_bytes()), "d-1"),
            Bytes::from(body),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::MalformedPayload));
        // Not marked: the gateway may retry once the type is supported.
        assert!(!state.db.delivery_seen("d-1").unwrap());
    }

    #[tokio::test]
    async fn checkout_prices_seats_and_stores_the_session() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "sess-7",
                "url": "https://pay.example.com/sess-7"
            })))
            .mount(&gateway)
            .await;

        let state = test_state(&gateway.uri(), "https://mail.invalid");
        let worshiper_id = state
            .db
            .insert_worshiper(&crate::database::WorshiperPatch {
                first_name: "rivka",
                last_name: "cohen",
                email: Some("rivka@shul.org"),
                phone: None,
                note: None,
            })
            .unwrap();

        let mut map = SeatMap::new("main", 800.0, 600.0);
        let bench = map.add_bench(Bench::row(0, 0.0, 0.0, Orientation::Horizontal, 4));
        state
            .db
            .put_blob("map:main", &serde_json::to_string(&map).unwrap())
            .unwrap();

        let response = checkout_handler(
            State(state.clone()),
            AuthUser {
                email: "gabbai@shul.org".to_string(),
            },
            Json(CheckoutRequest {
                worshiper_id,
                map: "main".to_string(),
                seats: vec![
                    SeatRef {
                        bench_id: bench,
                        seat: 0,
                    },
                    SeatRef {
                        bench_id: bench,
                        seat: 1,
                    },
                ],
                provision_account: false,
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.url, "https://pay.example.com/sess-7");

        let order = state.db.order(&response.0.order_id).unwrap().unwrap();
        assert_eq!(order.amount_cents, 36000);
        assert_eq!(order.status, "pending");
        assert_eq!(order.session_id.as_deref(), Some("sess-7"));
    }

    #[tokio::test]
    async fn checkout_rejects_seats_that_do_not_exist() {
        let state = test_state("https://gateway.invalid", "https://mail.invalid");
        let worshiper_id = state
            .db
            .insert_worshiper(&crate::database::WorshiperPatch {
                first_name: "rivka",
                last_name: "cohen",
                email: Some("rivka@shul.org"),
                phone: None,
                note: None,
            })
            .unwrap();

        let mut map = SeatMap::new("main", 800.0, 600.0);
        let bench = map.add_bench(Bench::row(0, 0.0, 0.0, Orientation::Horizontal, 2));
        state
            .db
            .put_blob("map:main", &serde_json::to_string(&map).unwrap())
            .unwrap();

        let err = checkout_handler(
            State(state.clone()),
            AuthUser {
                email: "gabbai@shul.org".to_string(),
            },
            Json(CheckoutRequest {
                worshiper_id,
                map: "main".to_string(),
                seats: vec![SeatRef {
                    bench_id: bench,
                    seat: 5,
                }],
                provision_account: false,
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::MalformedPayload));
    }
}
