// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission pipeline.
//!
//! Stages run in a fixed order and the first failure ends the request:
//!
//! ```text
//! method -> honeypot -> required fields -> email format
//!        -> bot check -> admission -> delivery -> accepted
//! ```
//!
//! Everything that costs a network call comes after the local checks, and
//! admission comes after the bot check so rejected bots never use up a
//! sender's quota.

use crate::bot_check::BotVerifier;
use crate::config::KeyStrategy;
use crate::delivery::{DeliveryError, DeliveryGateway};
use crate::extract::{SubmissionDraft, SubmissionPayload};
use crate::limiter::{loggable_key, RateLimitResult, RateLimiter};
use crate::metrics::Metrics;
use crate::outcome::Outcome;
use crate::validator::{SubmissionValidator, ValidatedSubmission};
use axum::http::Method;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Key used when the client address is unknown.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// One inbound request, as the pipeline sees it.
#[derive(Debug, Clone)]
pub struct Submission {
    pub method: Method,
    pub payload: SubmissionPayload,
    pub client_ip: Option<IpAddr>,
}

impl Submission {
    pub fn post(payload: SubmissionPayload, client_ip: Option<IpAddr>) -> Self {
        Self {
            method: Method::POST,
            payload,
            client_ip,
        }
    }
}

/// What the pipeline decided for a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    /// Set for [`Outcome::RateLimited`]
    pub retry_after: Option<Duration>,
    /// Client redirect hint, set for [`Outcome::Accepted`]
    pub next_url: Option<String>,
}

impl From<Outcome> for Decision {
    fn from(outcome: Outcome) -> Self {
        Self {
            outcome,
            retry_after: None,
            next_url: None,
        }
    }
}

pub struct Pipeline {
    validator: SubmissionValidator,
    verifier: Arc<dyn BotVerifier>,
    limiter: RateLimiter,
    gateway: Arc<dyn DeliveryGateway>,
    key_strategy: KeyStrategy,
    metrics: Arc<Metrics>,
}

impl Pipeline {
    pub fn new(
        validator: SubmissionValidator,
        verifier: Arc<dyn BotVerifier>,
        limiter: RateLimiter,
        gateway: Arc<dyn DeliveryGateway>,
        key_strategy: KeyStrategy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            validator,
            verifier,
            limiter,
            gateway,
            key_strategy,
            metrics,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Run a submission through every stage.
    pub async fn run(&self, submission: Submission) -> Decision {
        let decision = self.evaluate(submission).await;
        self.metrics.record(decision.outcome);
        decision
    }

    async fn evaluate(&self, submission: Submission) -> Decision {
        if submission.method != Method::POST {
            info!(method = %submission.method, "Method not allowed");
            return Outcome::MethodNotAllowed.into();
        }

        let draft = SubmissionDraft::extract(&submission.payload);
        let validated = match self.validator.validate(&draft) {
            Ok(validated) => validated,
            Err(err) => {
                info!(client = ?submission.client_ip, error = %err, "Submission rejected");
                return Outcome::from(&err).into();
            }
        };

        let remote_ip = submission.client_ip.map(|ip| ip.to_string());
        let verdict = self
            .verifier
            .verify(draft.bot_token.as_deref(), remote_ip.as_deref())
            .await;
        if !verdict.passed() {
            info!(client = ?submission.client_ip, ?verdict, "Bot check failed");
            return Outcome::BotCheckFailed.into();
        }

        let key = self.admission_key(&validated, submission.client_ip);
        match self.limiter.check(&key).await {
            Ok(RateLimitResult::Allowed { .. }) => {}
            Ok(RateLimitResult::Limited { retry_after }) => {
                info!(key = loggable_key(&key), retry_after_secs = retry_after.as_secs(), "Submission rate limited");
                return Decision {
                    outcome: Outcome::RateLimited,
                    retry_after: Some(retry_after),
                    next_url: None,
                };
            }
            Err(err) => {
                error!(error = %err, "Admission store unavailable");
                return Outcome::MisconfiguredServer.into();
            }
        }

        let started = Instant::now();
        let delivery = self.gateway.send(&validated).await;
        self.metrics.observe_delivery(started.elapsed());

        match delivery {
            Ok(receipt) => {
                info!(message_id = ?receipt.message_id, "Submission delivered");
                Decision {
                    outcome: Outcome::Accepted,
                    retry_after: None,
                    next_url: draft.next_url,
                }
            }
            Err(DeliveryError::NotConfigured(missing)) => {
                error!(missing, "Delivery is not configured");
                Outcome::MisconfiguredServer.into()
            }
            Err(err @ DeliveryError::Rejected { .. }) => {
                error!(error = %err, "Email provider rejected submission");
                Outcome::DeliveryFailed.into()
            }
            Err(err @ DeliveryError::Transport(_)) => {
                warn!(error = %err, "Email provider unreachable");
                Outcome::DeliveryFailed.into()
            }
        }
    }

    fn admission_key(&self, submission: &ValidatedSubmission, client_ip: Option<IpAddr>) -> String {
        match self.key_strategy {
            KeyStrategy::Ip => format!(
                "ip:{}",
                client_ip.map_or_else(|| UNKNOWN_CLIENT.to_string(), |ip| ip.to_string())
            ),
            KeyStrategy::Email => format!("email:{}", submission.email().trim().to_lowercase()),
        }
    }
}
