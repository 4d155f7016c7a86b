// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Redis-backed admission store, shared by every instance of the service.
//!
//! One counter per identifier, created with a time-to-live equal to the
//! window and incremented on every attempt. An attempt is admitted while the
//! post-increment count is within the cap. This is a fixed window per key,
//! not a sliding one: a client can get up to twice the cap across a window
//! boundary, and denied attempts count too.

use crate::limiter::{AdmissionStore, RateLimitResult, StoreError, WindowPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::{RedisError, Script};
use std::time::Duration;
use tracing::info;

pub const KEY_PREFIX: &str = "contactRelay:admission";

/// INCR and first-hit PEXPIRE in one server-side step. Returns the new
/// count and the key's remaining TTL in milliseconds.
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub struct RedisStore {
    connection: MultiplexedConnection,
    script: Script,
}

impl RedisStore {
    /// Open a multiplexed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_tokio_connection().await?;
        info!("Connected to Redis admission store");
        Ok(Self::with_connection(connection))
    }

    pub fn with_connection(connection: MultiplexedConnection) -> Self {
        Self {
            connection,
            script: Script::new(INCREMENT_SCRIPT),
        }
    }
}

pub fn admission_key(key: &str) -> String {
    format!("{}:{}", KEY_PREFIX, key)
}

/// Map a post-increment count and TTL to an admission decision.
fn decide(count: u64, ttl_ms: i64, policy: WindowPolicy) -> RateLimitResult {
    let max = u64::from(policy.max_requests);
    if count <= max {
        RateLimitResult::Allowed {
            remaining: (max - count) as u32,
        }
    } else {
        RateLimitResult::Limited {
            retry_after: Duration::from_millis(ttl_ms.max(0) as u64),
        }
    }
}

#[async_trait]
impl AdmissionStore for RedisStore {
    async fn try_admit(
        &self,
        key: &str,
        _now: DateTime<Utc>,
        policy: WindowPolicy,
    ) -> Result<RateLimitResult, StoreError> {
        let window_ms = policy.window.num_milliseconds().max(1);
        let (count, ttl_ms) = self
            .script
            .key(admission_key(key))
            .arg(window_ms)
            .invoke_async::<_, (u64, i64)>(&mut self.connection.clone())
            .await?;

        Ok(decide(count, ttl_ms, policy))
    }

    // Keys expire on their own.
}
