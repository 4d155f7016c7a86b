// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outbound email delivery.
//!
//! One attempt per submission, no retries. Provider error detail is returned
//! in [`DeliveryError`] for logging and must not reach the client.

use crate::config::DeliveryConfig;
use crate::validator::ValidatedSubmission;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Delivery error types.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery is not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("provider rejected message with HTTP {status}: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Successful send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Provider's message id, when it returns one
    pub message_id: Option<String>,
}

/// Sends validated submissions to the site owner.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn send(&self, submission: &ValidatedSubmission) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Message handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub reply_to: String,
}

impl ContactEmail {
    pub fn compose(
        submission: &ValidatedSubmission,
        from: &str,
        to: &str,
        subject: &str,
        received_at: DateTime<Utc>,
    ) -> Self {
        let mut subject = format!("{} from {}", subject, submission.name());
        if !submission.service().is_empty() {
            subject.push_str(&format!(" ({})", submission.service()));
        }

        let mut text = format!("Name: {}\nEmail: {}\n", submission.name(), submission.email());
        if !submission.service().is_empty() {
            text.push_str(&format!("Service: {}\n", submission.service()));
        }
        text.push_str(&format!(
            "Received: {}\n\nMessage:\n{}\n",
            received_at.to_rfc3339(),
            submission.message()
        ));

        Self {
            from: from.to_string(),
            to: vec![to.to_string()],
            subject: single_line(&subject),
            text,
            reply_to: submission.email().to_string(),
        }
    }
}

/// Collapse control characters so submitter text cannot add header lines.
fn single_line(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Resend-compatible HTTP email API client.
pub struct HttpEmailGateway {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
    to: String,
    subject: String,
}

#[async_trait]
impl DeliveryGateway for HttpEmailGateway {
    async fn send(&self, submission: &ValidatedSubmission) -> Result<DeliveryReceipt, DeliveryError> {
        let email = ContactEmail::compose(submission, &self.from, &self.to, &self.subject, Utc::now());

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&email)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let message_id = response
            .json::<ProviderResponse>()
            .await
            .ok()
            .and_then(|body| body.id);
        debug!(?message_id, "Provider accepted message");
        Ok(DeliveryReceipt { message_id })
    }
}

/// Gateway for a deployment without provider credentials.
#[derive(Debug, Clone, Copy)]
pub struct UnconfiguredGateway {
    missing: &'static str,
}

#[async_trait]
impl DeliveryGateway for UnconfiguredGateway {
    async fn send(&self, _submission: &ValidatedSubmission) -> Result<DeliveryReceipt, DeliveryError> {
        Err(DeliveryError::NotConfigured(self.missing))
    }
}

/// Build the gateway for a configuration. Missing credentials or addresses
/// yield a gateway that reports [`DeliveryError::NotConfigured`] on every send.
pub fn from_config(config: &DeliveryConfig) -> Result<Arc<dyn DeliveryGateway>, DeliveryError> {
    let present = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let (api_key, from, to) = match (present(&config.api_key), present(&config.from), present(&config.to)) {
        (Some(api_key), Some(from), Some(to)) => (api_key, from, to),
        (None, _, _) => return Ok(unconfigured("delivery.api_key")),
        (_, None, _) => return Ok(unconfigured("delivery.from")),
        (_, _, None) => return Ok(unconfigured("delivery.to")),
    };

    let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
    Ok(Arc::new(HttpEmailGateway {
        client,
        api_url: config.api_url.clone(),
        api_key,
        from,
        to,
        subject: config.subject.clone(),
    }))
}

fn unconfigured(missing: &'static str) -> Arc<dyn DeliveryGateway> {
    warn!(missing, "Email delivery is not configured; submissions will fail");
    Arc::new(UnconfiguredGateway { missing })
}
