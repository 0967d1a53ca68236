//! OTP delivery. Codes are static per user; "sending" is a notification to
//! an external channel and carries no secret.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

use super::authenticator::Identity;
use crate::APP_USER_AGENT;

#[async_trait]
pub trait OtpNotifier: Send + Sync {
    async fn send(&self, identity: &Identity) -> Result<()>;
}

/// Logs the delivery instead of sending anything.
#[derive(Clone, Debug, Default)]
pub struct LogOtpNotifier;

#[async_trait]
impl OtpNotifier for LogOtpNotifier {
    async fn send(&self, identity: &Identity) -> Result<()> {
        info!(
            user_id = identity.user_id,
            channel = identity.identifier.kind(),
            "Sending OTP to {}",
            identity.identifier.value()
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct OtpDelivery<'a> {
    user_id: u64,
    channel: &'a str,
    destination: &'a str,
}

/// Posts a delivery request to an external notification service.
#[derive(Clone, Debug)]
pub struct WebhookOtpNotifier {
    client: Client,
    url: Url,
}

impl WebhookOtpNotifier {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Error creating reqwest client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl OtpNotifier for WebhookOtpNotifier {
    #[instrument(skip_all, fields(url = %self.url, user_id = identity.user_id))]
    async fn send(&self, identity: &Identity) -> Result<()> {
        let body = OtpDelivery {
            user_id: identity.user_id,
            channel: identity.identifier.kind(),
            destination: identity.identifier.value(),
        };
        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .context("OTP webhook request failed")?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow!("OTP webhook returned {}", response.status()))
        }
    }
}
