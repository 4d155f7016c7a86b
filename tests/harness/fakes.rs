// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! In-memory stand-ins for the bot verifier, email provider and a broken
//! admission store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contact_relay::{
    bot_check::{BotVerdict, BotVerifier},
    delivery::{DeliveryError, DeliveryGateway, DeliveryReceipt},
    limiter::{AdmissionStore, RateLimitResult, StoreError, WindowPolicy},
    ValidatedSubmission,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum GatewayMode {
    Succeed,
    Reject { status: u16, detail: String },
    Unconfigured,
}

/// Delivery gateway that records every send attempt.
#[derive(Debug)]
pub struct RecordingGateway {
    mode: GatewayMode,
    attempts: Mutex<Vec<ValidatedSubmission>>,
}

impl RecordingGateway {
    fn with_mode(mode: GatewayMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            attempts: Mutex::new(Vec::new()),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::with_mode(GatewayMode::Succeed)
    }

    /// Provider answers every send with a non-2xx status.
    pub fn rejecting(status: u16, detail: &str) -> Arc<Self> {
        Self::with_mode(GatewayMode::Reject {
            status,
            detail: detail.to_string(),
        })
    }

    pub fn unconfigured() -> Arc<Self> {
        Self::with_mode(GatewayMode::Unconfigured)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<ValidatedSubmission> {
        self.attempts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl DeliveryGateway for RecordingGateway {
    async fn send(&self, submission: &ValidatedSubmission) -> Result<DeliveryReceipt, DeliveryError> {
        self.attempts.lock().unwrap().push(submission.clone());
        match &self.mode {
            GatewayMode::Succeed => Ok(DeliveryReceipt {
                message_id: Some(format!("msg-{}", self.attempts())),
            }),
            GatewayMode::Reject { status, detail } => Err(DeliveryError::Rejected {
                status: *status,
                detail: detail.clone(),
            }),
            GatewayMode::Unconfigured => Err(DeliveryError::NotConfigured("delivery.api_key")),
        }
    }
}

/// Verifier that returns a fixed verdict and remembers the tokens it saw.
#[derive(Debug)]
pub struct FixedVerifier {
    verdict: BotVerdict,
    tokens: Mutex<Vec<Option<String>>>,
}

impl FixedVerifier {
    pub fn new(verdict: BotVerdict) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl BotVerifier for FixedVerifier {
    async fn verify(&self, token: Option<&str>, _remote_ip: Option<&str>) -> BotVerdict {
        self.tokens.lock().unwrap().push(token.map(str::to_string));
        self.verdict.clone()
    }
}

/// Admission store whose backend is always down.
#[derive(Debug, Default)]
pub struct UnreachableStore;

#[async_trait]
impl AdmissionStore for UnreachableStore {
    async fn try_admit(
        &self,
        _key: &str,
        _now: DateTime<Utc>,
        _policy: WindowPolicy,
    ) -> Result<RateLimitResult, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}
