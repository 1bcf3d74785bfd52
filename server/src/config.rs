use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub database_path: String,

    /// Flat price per seat, minor units.
    pub seat_price_cents: i64,
    pub currency: String,

    pub gateway_url: String,
    pub success_url: String,
    pub cancel_url: String,

    pub mail_url: String,
    pub mail_from: String,

    /// Bearer token lifetime, minutes.
    pub token_ttl_minutes: i64,

    pub auth_secret: String,
    pub gateway_key: String,
    pub webhook_secret: String,
    pub mail_key: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "1111"),
            database_path: try_load("DATABASE_PATH", "shul.db"),
            seat_price_cents: try_load("SEAT_PRICE_CENTS", "18000"),
            currency: try_load("CURRENCY", "usd"),
            gateway_url: try_load("GATEWAY_URL", "https://gateway.example.com"),
            success_url: try_load("CHECKOUT_SUCCESS_URL", "https://localhost/checkout/success"),
            cancel_url: try_load("CHECKOUT_CANCEL_URL", "https://localhost/checkout/cancel"),
            mail_url: try_load("MAIL_URL", "https://mail.example.com"),
            mail_from: try_load("MAIL_FROM", "gabbai@localhost"),
            token_ttl_minutes: try_load("TOKEN_TTL_MINUTES", "720"),
            auth_secret: read_secret("AUTH_SECRET"),
            gateway_key: read_secret("GATEWAY_KEY"),
            webhook_secret: read_secret("WEBHOOK_SECRET"),
            mail_key: read_secret("MAIL_KEY"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Docker secret file first, plain environment variable as the fallback.
fn read_secret(secret_name: &str) -> String {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .or_else(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
            env::var(secret_name)
        })
        .expect("Secrets misconfigured!")
}
