//! Synagogue seat-map service.
//!
//! # General Infrastructure
//! - Single axum process behind the reverse proxy, one SQLite file for state
//! - Floor plans are JSON blobs in the generic storage table, resolved
//!   through the `seatmap` crate on every write
//! - Worshipers, accounts, orders and seat assignments are plain relational
//!   tables, one parameterized statement per route
//! - Payment checkout goes out through the gateway client; the gateway calls
//!   back into `/webhooks/payment` with an HMAC-signed body
//! - Passwords provisioned by the webhook are delivered through the
//!   transactional mail API
//!
//! # Surface
//!
//! | Route | Auth | Purpose |
//! |---|---|---|
//! | `POST /auth/register`, `POST /auth/login`, `GET /auth/me` | mixed | accounts |
//! | `GET/POST/PUT/DELETE /worshipers[/{id}]` | writes | registry |
//! | `GET/PUT /maps/{name}` | writes | floor plans |
//! | `POST /maps/{name}/layout` | yes | multi-select nudge + respacing |
//! | `GET /maps/{name}/export` | no | print tiling plan |
//! | `GET/PUT/DELETE /maps/{name}/seats...` | writes | seat assignment |
//! | `GET/PUT /storage/{key}` | writes | generic JSON blobs |
//! | `POST /checkout` | yes | gateway session |
//! | `POST /webhooks/payment` | signature | order status, provisioning |

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod email;
pub mod error;
pub mod maps;
pub mod payments;
pub mod state;
pub mod storage;
pub mod utils;
pub mod worshipers;

use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new();

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let app = router(state.clone()).layer(cors);

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/worshipers",
            get(worshipers::list_handler).post(worshipers::create_handler),
        )
        .route(
            "/worshipers/{id}",
            get(worshipers::get_handler)
                .put(worshipers::update_handler)
                .delete(worshipers::delete_handler),
        )
        .route(
            "/maps/{name}",
            get(maps::get_map_handler).put(maps::put_map_handler),
        )
        .route("/maps/{name}/layout", post(maps::layout_handler))
        .route("/maps/{name}/export", get(maps::export_handler))
        .route("/maps/{name}/seats", get(maps::assignments_handler))
        .route(
            "/maps/{name}/seats/{bench_id}/{seat}",
            put(maps::assign_handler).delete(maps::unassign_handler),
        )
        .route(
            "/storage/{key}",
            get(storage::get_handler).put(storage::put_handler),
        )
        .route("/checkout", post(payments::checkout_handler))
        .route("/webhooks/payment", post(payments::webhook_handler))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
