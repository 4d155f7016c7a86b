// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Bot-score verification.
//!
//! Talks to a reCAPTCHA-compatible `siteverify` endpoint. The check is opt-in:
//! without a configured secret every submission passes. Once configured it
//! fails closed, so an unreachable or confused verifier rejects.

use crate::config::BotCheckConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Outcome of a bot-score check.
#[derive(Debug, Clone, PartialEq)]
pub enum BotVerdict {
    /// Verification is not configured
    Skipped,
    Accepted { score: Option<f64> },
    Rejected { score: Option<f64>, reason: RejectReason },
}

impl BotVerdict {
    pub fn passed(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Why a token was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    MissingToken,
    /// The service answered `success: false`
    Unsuccessful { error_codes: Vec<String> },
    ScoreBelowThreshold { threshold: f64 },
    /// The service could not be asked or answered nonsense
    VerifierUnavailable(String),
}

/// Failures talking to the verification service.
#[derive(Debug, Error)]
pub enum BotCheckError {
    #[error("verification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("verification service returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// Verifies client-supplied bot-score tokens.
#[async_trait]
pub trait BotVerifier: Send + Sync {
    async fn verify(&self, token: Option<&str>, remote_ip: Option<&str>) -> BotVerdict;
}

/// Verifier used when no secret is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledVerifier;

#[async_trait]
impl BotVerifier for DisabledVerifier {
    async fn verify(&self, _token: Option<&str>, _remote_ip: Option<&str>) -> BotVerdict {
        BotVerdict::Skipped
    }
}

/// `siteverify` response body.
#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Client for a reCAPTCHA-compatible verification endpoint.
pub struct SiteVerifyClient {
    client: reqwest::Client,
    verify_url: String,
    secret: String,
    score_threshold: f64,
    require_token: bool,
}

impl SiteVerifyClient {
    pub fn new(config: &BotCheckConfig, secret: String) -> Result<Self, BotCheckError> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            verify_url: config.verify_url.clone(),
            secret,
            score_threshold: config.score_threshold,
            require_token: config.require_token,
        })
    }

    async fn site_verify(&self, token: &str, remote_ip: Option<&str>) -> Result<SiteVerifyResponse, BotCheckError> {
        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = self.client.post(&self.verify_url).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(BotCheckError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}

/// Build the verifier for a configuration: disabled without a secret.
pub fn from_config(config: &BotCheckConfig) -> Result<Arc<dyn BotVerifier>, BotCheckError> {
    match config.secret.as_deref().map(str::trim) {
        Some(secret) if !secret.is_empty() => {
            Ok(Arc::new(SiteVerifyClient::new(config, secret.to_string())?))
        }
        _ => Ok(Arc::new(DisabledVerifier)),
    }
}

/// Apply the score threshold to a verification response.
fn judge(response: SiteVerifyResponse, threshold: f64) -> BotVerdict {
    if !response.success {
        return BotVerdict::Rejected {
            score: response.score,
            reason: RejectReason::Unsuccessful {
                error_codes: response.error_codes,
            },
        };
    }
    match response.score {
        Some(score) if score < threshold => BotVerdict::Rejected {
            score: Some(score),
            reason: RejectReason::ScoreBelowThreshold { threshold },
        },
        score => BotVerdict::Accepted { score },
    }
}

#[async_trait]
impl BotVerifier for SiteVerifyClient {
    async fn verify(&self, token: Option<&str>, remote_ip: Option<&str>) -> BotVerdict {
        let token = match token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ if self.require_token => {
                debug!("Bot token missing");
                return BotVerdict::Rejected {
                    score: None,
                    reason: RejectReason::MissingToken,
                };
            }
            _ => return BotVerdict::Skipped,
        };

        match self.site_verify(token, remote_ip).await {
            Ok(response) => {
                let verdict = judge(response, self.score_threshold);
                debug!(?verdict, "Bot verification finished");
                verdict
            }
            Err(err) => {
                warn!(error = %err, "Bot verification unavailable, rejecting");
                BotVerdict::Rejected {
                    score: None,
                    reason: RejectReason::VerifierUnavailable(err.to_string()),
                }
            }
        }
    }
}
