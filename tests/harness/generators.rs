// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test data generators.

use contact_relay::extract::SubmissionPayload;
use std::net::{IpAddr, Ipv4Addr};

/// Build a payload from field pairs.
pub fn payload(fields: &[(&str, &str)]) -> SubmissionPayload {
    fields.iter().copied().collect()
}

/// A submission that passes every check.
pub fn valid_payload() -> SubmissionPayload {
    payload(&[
        ("name", "Test User"),
        ("email", "test@example.com"),
        ("message", "hello"),
    ])
}

/// Generate a pool of IP addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Honeypot values a naive bot might fill in.
pub fn honeypot_values() -> Vec<&'static str> {
    vec!["http://spam.com", "x", " ", "\t", "buy now"]
}

/// Emails the shape check rejects.
pub fn malformed_emails() -> Vec<&'static str> {
    vec![
        "not-an-email",
        "no-at-sign.example.com",
        "no-dot@example",
        "embedded space@example.com",
        "user@exa mple.com",
        "@example.com",
        "user@",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ips() {
        let ips = generate_ips(256);
        assert_eq!(ips.len(), 256);
        // All should be unique
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 256);
    }
}
