//! Transactional mail client.
//!
//! The service never speaks SMTP; it posts to the hosted mail API and
//! treats the provider as fire-and-forget. The one caller that must not
//! fail on a mail outage (the payment webhook) logs and moves on.

use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::error::AppError;

pub struct Mailer {
    http: Client,
    base_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct OutboundMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl Mailer {
    pub fn new(base_url: &str, api_key: &str, from: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&OutboundMail {
                from: &self.from,
                to,
                subject,
                text,
            })
            .send()
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Mail(format!(
                "provider returned {}",
                response.status()
            )));
        }

        info!("Sent mail to {to}: {subject}");
        Ok(())
    }
}
