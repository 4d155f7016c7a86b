// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission validator.
//!
//! Checks run in a fixed order and stop at the first failure:
//! - Honeypot must be empty
//! - Name, email and message must be present
//! - Email must have a plausible shape

use crate::config::{HoneypotPolicy, ValidationConfig};
use crate::extract::SubmissionDraft;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

/// Something, `@`, something, `.`, something; no whitespace anywhere.
static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("email shape pattern compiles"));

/// Required submission fields, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    Name,
    Email,
    Message,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Email => write!(f, "email"),
            Self::Message => write!(f, "message"),
        }
    }
}

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Honeypot field was filled in")]
    SpamDetected,

    #[error("Missing required field: {0}")]
    MissingField(RequiredField),

    #[error("Email address is not well formed")]
    InvalidEmailFormat,
}

/// A submission that passed every validation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    name: String,
    email: String,
    message: String,
    service: String,
}

impl ValidatedSubmission {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Optional service the submitter asked about; empty when not given.
    pub fn service(&self) -> &str {
        &self.service
    }
}

/// Submission validator.
#[derive(Debug, Clone)]
pub struct SubmissionValidator {
    config: ValidationConfig,
}

impl SubmissionValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Fail when the honeypot holds a value under the configured policy.
    pub fn check_honeypot(&self, website: &str) -> Result<(), ValidationError> {
        let filled = match self.config.honeypot {
            HoneypotPolicy::Raw => !website.is_empty(),
            HoneypotPolicy::Trimmed => !website.trim().is_empty(),
        };
        if filled {
            debug!(policy = ?self.config.honeypot, "Honeypot triggered");
            return Err(ValidationError::SpamDetected);
        }
        Ok(())
    }

    /// Fail on the first of name, email, message that is blank.
    pub fn check_required(&self, draft: &SubmissionDraft) -> Result<(), ValidationError> {
        let fields = [
            (RequiredField::Name, &draft.name),
            (RequiredField::Email, &draft.email),
            (RequiredField::Message, &draft.message),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                debug!(%field, "Missing required field");
                return Err(ValidationError::MissingField(field));
            }
        }
        Ok(())
    }

    pub fn check_email_format(&self, email: &str) -> Result<(), ValidationError> {
        if EMAIL_SHAPE.is_match(email) {
            Ok(())
        } else {
            debug!("Email shape check failed");
            Err(ValidationError::InvalidEmailFormat)
        }
    }

    /// Validate a complete draft.
    pub fn validate(&self, draft: &SubmissionDraft) -> Result<ValidatedSubmission, ValidationError> {
        self.check_honeypot(&draft.website)?;
        self.check_required(draft)?;
        self.check_email_format(&draft.email)?;

        Ok(ValidatedSubmission {
            name: draft.name.trim().to_string(),
            email: draft.email.trim().to_string(),
            message: draft.message.trim().to_string(),
            service: draft.service.trim().to_string(),
        })
    }
}
