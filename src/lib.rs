// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay
//!
//! Accepts contact-form submissions over HTTP and forwards them to an email
//! provider after a fixed series of checks:
//!
//! - Honeypot field must be empty
//! - Name, email and message must be present
//! - Email must have a plausible shape
//! - Optional bot-score verification
//! - Sliding-window admission per client (5 per 15 minutes default)
//! - Exactly one delivery attempt

pub mod bot_check;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod extract;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod outcome;
pub mod pipeline;
pub mod redis_store;
pub mod validator;

pub use config::Config;
pub use limiter::{RateLimitResult, RateLimiter};
pub use outcome::Outcome;
pub use pipeline::{Decision, Pipeline, Submission};
pub use validator::{SubmissionValidator, ValidatedSubmission, ValidationError};
