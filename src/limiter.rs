// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding-window admission control for contact submissions.
//!
//! Each identifier may be admitted at most `max_requests` times within any
//! trailing window. Denied attempts are not recorded. State lives behind an
//! [`AdmissionStore`], either in process memory ([`MemoryStore`]) or in Redis
//! ([`crate::redis_store::RedisStore`]).

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Result of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is admitted
    Allowed {
        /// Admissions left in the current window
        remaining: u32,
    },
    /// Request is denied
    Limited {
        /// Time until a slot frees up
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Admission store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("admission store unavailable: {0}")]
    Unavailable(String),
}

/// Cap and window applied to every identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub max_requests: u32,
    pub window: chrono::Duration,
}

impl From<&RateLimitConfig> for WindowPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window(),
        }
    }
}

/// Backing store for admission state.
///
/// `try_admit` must be atomic per key: two concurrent calls for the same key
/// never both take the last slot.
#[async_trait]
pub trait AdmissionStore: Send + Sync {
    async fn try_admit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: WindowPolicy,
    ) -> Result<RateLimitResult, StoreError>;

    /// Drop state that can no longer affect a decision. Returns the number
    /// of identifiers removed.
    async fn sweep(&self, _now: DateTime<Utc>, _policy: WindowPolicy) -> usize {
        0
    }
}

/// Identifier as it may appear in logs. Email keys are reduced to their
/// prefix so submitter addresses stay out of log output.
pub fn loggable_key(key: &str) -> &str {
    match key.split_once(':') {
        Some(("email", _)) => "email:<redacted>",
        _ => key,
    }
}

type Timestamps = Arc<Mutex<VecDeque<DateTime<Utc>>>>;

/// In-process store holding admission timestamps per identifier.
///
/// The map lock is only held to find or create an identifier's entry; the
/// check-then-record runs under that identifier's own lock.
#[derive(Default)]
pub struct MemoryStore {
    windows: RwLock<HashMap<String, Timestamps>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identifiers currently tracked.
    pub async fn len(&self) -> usize {
        self.windows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.windows.read().await.is_empty()
    }

    async fn entry(&self, key: &str) -> Timestamps {
        if let Some(stamps) = self.windows.read().await.get(key) {
            return stamps.clone();
        }
        self.windows
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl AdmissionStore for MemoryStore {
    async fn try_admit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: WindowPolicy,
    ) -> Result<RateLimitResult, StoreError> {
        let entry = self.entry(key).await;
        let mut stamps = entry.lock().await;

        stamps.retain(|ts| now.signed_duration_since(*ts) < policy.window);

        if stamps.len() >= policy.max_requests as usize {
            let retry_after = stamps
                .iter()
                .min()
                .map(|oldest| (*oldest + policy.window).signed_duration_since(now))
                .and_then(|wait| wait.to_std().ok())
                .unwrap_or(Duration::ZERO);
            return Ok(RateLimitResult::Limited { retry_after });
        }

        stamps.push_back(now);
        Ok(RateLimitResult::Allowed {
            remaining: policy.max_requests - stamps.len() as u32,
        })
    }

    async fn sweep(&self, now: DateTime<Utc>, policy: WindowPolicy) -> usize {
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, entry| {
            // Someone outside the map holds this entry and may be about to record.
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            match entry.try_lock() {
                Ok(mut stamps) => {
                    stamps.retain(|ts| now.signed_duration_since(*ts) < policy.window);
                    !stamps.is_empty()
                }
                Err(_) => true,
            }
        });
        before - windows.len()
    }
}

/// Admission controller.
pub struct RateLimiter {
    policy: WindowPolicy,
    store: Arc<dyn AdmissionStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter over the given store and clock.
    pub fn new(config: &RateLimitConfig, store: Arc<dyn AdmissionStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy: WindowPolicy::from(config),
            store,
            clock,
        }
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Check and, when admitted, record one submission for `key`.
    pub async fn check(&self, key: &str) -> Result<RateLimitResult, StoreError> {
        let now = self.clock.now();
        let result = self.store.try_admit(key, now, self.policy).await;
        let key = loggable_key(key);
        match &result {
            Ok(RateLimitResult::Allowed { remaining }) => {
                debug!(key, remaining, "Admission granted");
            }
            Ok(RateLimitResult::Limited { retry_after }) => {
                debug!(key, ?retry_after, "Admission denied");
            }
            Err(err) => {
                warn!(key, error = %err, "Admission store failed, denying");
            }
        }
        result
    }

    /// Clean up stale entries (should be called periodically).
    pub async fn sweep(&self) -> usize {
        let removed = self.store.sweep(self.clock.now(), self.policy).await;
        if removed > 0 {
            debug!(removed, "Swept stale admission entries");
        }
        removed
    }
}
