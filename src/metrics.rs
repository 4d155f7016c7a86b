// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics.

use crate::outcome::Outcome;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

pub struct Metrics {
    registry: Registry,
    submissions: IntCounterVec,
    delivery_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let submissions = IntCounterVec::new(
            Opts::new("contact_relay_submissions_total", "Submissions by outcome"),
            &["outcome"],
        )?;
        let delivery_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "contact_relay_delivery_seconds",
                "Time spent in the email provider call",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;

        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(delivery_seconds.clone()))?;

        // Export every outcome from the start, not only after it first occurs.
        for outcome in Outcome::ALL {
            submissions.with_label_values(&[outcome.as_str()]);
        }

        Ok(Self {
            registry,
            submissions,
            delivery_seconds,
        })
    }

    pub fn record(&self, outcome: Outcome) {
        self.submissions.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn observe_delivery(&self, elapsed: Duration) {
        self.delivery_seconds.observe(elapsed.as_secs_f64());
    }

    /// Count recorded for an outcome.
    pub fn submissions(&self, outcome: Outcome) -> u64 {
        self.submissions.with_label_values(&[outcome.as_str()]).get()
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}
