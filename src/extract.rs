// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Field extraction and normalization.
//!
//! Turns an untrusted request body into a [`SubmissionDraft`]: aliases are
//! resolved, text fields trimmed, missing optional fields defaulted to empty.
//! The honeypot value is kept exactly as received.

use serde_json::Value;
use std::collections::HashMap;

const EMAIL_ALIASES: &[&str] = &["_replyto", "email"];
const BOT_TOKEN_ALIASES: &[&str] = &["botToken", "g-recaptcha-response", "cf-turnstile-response"];
const NEXT_URL_ALIASES: &[&str] = &["nextUrl", "_next"];

/// Raw submission: field name to string value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionPayload {
    fields: HashMap<String, String>,
}

impl SubmissionPayload {
    /// Parse a JSON object body. Non-string values are dropped; anything
    /// other than an object yields an empty payload.
    pub fn from_json(body: &[u8]) -> Self {
        let fields = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(key, value)| match value {
                    Value::String(s) => Some((key, s)),
                    _ => None,
                })
                .collect(),
            _ => HashMap::new(),
        };
        Self { fields }
    }

    /// Parse an `application/x-www-form-urlencoded` body. Later duplicates
    /// of a key win.
    pub fn from_form(body: &[u8]) -> Self {
        let fields = url::form_urlencoded::parse(body)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// First alias holding a non-blank value.
    fn first_present(&self, aliases: &[&str]) -> Option<&str> {
        aliases
            .iter()
            .filter_map(|alias| self.get(alias))
            .find(|value| !value.trim().is_empty())
    }
}

impl<K, V> FromIterator<(K, V)> for SubmissionPayload
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Normalized but not yet validated submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionDraft {
    pub name: String,
    pub email: String,
    pub message: String,
    pub service: String,
    /// Honeypot, untrimmed
    pub website: String,
    pub bot_token: Option<String>,
    pub next_url: Option<String>,
}

impl SubmissionDraft {
    pub fn extract(payload: &SubmissionPayload) -> Self {
        let trimmed = |field: &str| payload.get(field).map(str::trim).unwrap_or_default().to_string();

        Self {
            name: trimmed("name"),
            email: payload
                .first_present(EMAIL_ALIASES)
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            message: trimmed("message"),
            service: trimmed("service"),
            website: payload.get("website").unwrap_or_default().to_string(),
            bot_token: payload
                .first_present(BOT_TOKEN_ALIASES)
                .map(|token| token.trim().to_string()),
            next_url: payload
                .first_present(NEXT_URL_ALIASES)
                .map(|url| url.trim().to_string()),
        }
    }
}
