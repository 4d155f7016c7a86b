// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission outcomes and their wire representation.

use crate::validator::{RequiredField, ValidationError};
use axum::http::StatusCode;
use serde::Serialize;
use std::fmt;

/// The single result of handling one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    MethodNotAllowed,
    SpamDetected,
    MissingName,
    MissingEmail,
    MissingMessage,
    InvalidEmailFormat,
    BotCheckFailed,
    RateLimited,
    DeliveryFailed,
    MisconfiguredServer,
    Accepted,
}

impl Outcome {
    pub const ALL: [Outcome; 11] = [
        Outcome::MethodNotAllowed,
        Outcome::SpamDetected,
        Outcome::MissingName,
        Outcome::MissingEmail,
        Outcome::MissingMessage,
        Outcome::InvalidEmailFormat,
        Outcome::BotCheckFailed,
        Outcome::RateLimited,
        Outcome::DeliveryFailed,
        Outcome::MisconfiguredServer,
        Outcome::Accepted,
    ];

    pub fn status(self) -> StatusCode {
        match self {
            Self::Accepted => StatusCode::OK,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::SpamDetected
            | Self::MissingName
            | Self::MissingEmail
            | Self::MissingMessage
            | Self::InvalidEmailFormat
            | Self::BotCheckFailed => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::DeliveryFailed | Self::MisconfiguredServer => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::SpamDetected => "SpamDetected",
            Self::MissingName => "MissingName",
            Self::MissingEmail => "MissingEmail",
            Self::MissingMessage => "MissingMessage",
            Self::InvalidEmailFormat => "InvalidEmailFormat",
            Self::BotCheckFailed => "BotCheckFailed",
            Self::RateLimited => "RateLimited",
            Self::DeliveryFailed => "DeliveryFailed",
            Self::MisconfiguredServer => "MisconfiguredServer",
            Self::Accepted => "Accepted",
        }
    }

    /// Short text a client may show. Never carries internal detail.
    pub fn message(self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "Only POST is supported.",
            Self::SpamDetected => "Submission rejected.",
            Self::MissingName => "Please enter your name.",
            Self::MissingEmail => "Please enter your email address.",
            Self::MissingMessage => "Please enter a message.",
            Self::InvalidEmailFormat => "Please enter a valid email address.",
            Self::BotCheckFailed => "Automated submission check failed.",
            Self::RateLimited => "Too many submissions. Please try again later.",
            Self::DeliveryFailed | Self::MisconfiguredServer => {
                "Your message could not be sent. Please email us directly."
            }
            Self::Accepted => "Thanks, your message was sent.",
        }
    }

    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ValidationError> for Outcome {
    fn from(err: &ValidationError) -> Self {
        match err {
            ValidationError::SpamDetected => Self::SpamDetected,
            ValidationError::MissingField(RequiredField::Name) => Self::MissingName,
            ValidationError::MissingField(RequiredField::Email) => Self::MissingEmail,
            ValidationError::MissingField(RequiredField::Message) => Self::MissingMessage,
            ValidationError::InvalidEmailFormat => Self::InvalidEmailFormat,
        }
    }
}

/// Response body for the submission endpoint.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl From<Outcome> for SubmitResponse {
    fn from(outcome: Outcome) -> Self {
        if outcome.is_accepted() {
            Self {
                ok: true,
                error: None,
                message: None,
            }
        } else {
            Self {
                ok: false,
                error: Some(outcome),
                message: Some(outcome.message()),
            }
        }
    }
}
