// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for the contact relay.
//!
//! Fakes for the outbound collaborators, payload generators and a builder
//! that wires them into a pipeline or router driven by a manual clock.

#![allow(dead_code)]

pub mod fakes;
pub mod generators;

use axum::Router;
use chrono::Utc;
use contact_relay::{
    bot_check::{BotVerifier, DisabledVerifier},
    clock::ManualClock,
    config::Config,
    handlers::{router, AppState},
    limiter::{AdmissionStore, MemoryStore, RateLimiter},
    metrics::Metrics,
    Pipeline, SubmissionValidator,
};
use fakes::RecordingGateway;
use std::sync::Arc;

/// Wires fakes into a pipeline.
pub struct RelayBuilder {
    config: Config,
    verifier: Arc<dyn BotVerifier>,
    gateway: Arc<RecordingGateway>,
    store: Arc<dyn AdmissionStore>,
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            verifier: Arc::new(DisabledVerifier),
            gateway: RecordingGateway::succeeding(),
            store: Arc::new(MemoryStore::new()),
        }
    }
}

impl RelayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, edit: impl FnOnce(&mut Config)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn BotVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn gateway(mut self, gateway: Arc<RecordingGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn store(mut self, store: Arc<dyn AdmissionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn build(self) -> TestRelay {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = RateLimiter::new(&self.config.rate_limit, self.store, clock.clone());
        let metrics = Arc::new(Metrics::new().expect("metrics registry"));

        let pipeline = Pipeline::new(
            SubmissionValidator::new(self.config.validation.clone()),
            self.verifier,
            limiter,
            self.gateway.clone(),
            self.config.rate_limit.key,
            metrics,
        );

        TestRelay {
            pipeline,
            gateway: self.gateway,
            clock,
            config: self.config,
        }
    }
}

pub struct TestRelay {
    pub pipeline: Pipeline,
    pub gateway: Arc<RecordingGateway>,
    pub clock: Arc<ManualClock>,
    pub config: Config,
}

impl TestRelay {
    /// Turn the relay into an HTTP router sharing the same fakes.
    pub fn into_router(self) -> (Router, Arc<RecordingGateway>, Arc<ManualClock>) {
        let state = Arc::new(AppState {
            pipeline: self.pipeline,
            config: self.config,
        });
        (router(state), self.gateway, self.clock)
    }
}
