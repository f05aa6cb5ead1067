//! Resend HTTP mailer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Mailer, OutgoingEmail};
use crate::error::DeliveryError;

const API_URL: &str = "https://api.resend.com/emails";

/// Email delivery through the Resend API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    /// Create a mailer with the given API key and sender address.
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiSendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiSendResponse {
    id: String,
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<String, DeliveryError> {
        let request = ApiSendRequest {
            from: &self.from,
            to: vec![&email.to],
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Api {
                status,
                message: body,
            });
        }

        let parsed: ApiSendResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Rejected {
                reason: format!("unreadable delivery response: {e}"),
            })?;
        Ok(parsed.id)
    }
}
