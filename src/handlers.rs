// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact relay service.

use crate::bot_check::{self, BotCheckError};
use crate::clock::SystemClock;
use crate::config::{Config, CorsConfig, StoreBackend};
use crate::delivery::{self, DeliveryError};
use crate::extract::SubmissionPayload;
use crate::limiter::{AdmissionStore, MemoryStore, RateLimiter, StoreError};
use crate::metrics::Metrics;
use crate::outcome::{Outcome, SubmitResponse};
use crate::pipeline::{Decision, Pipeline, Submission};
use crate::redis_store::RedisStore;
use crate::validator::SubmissionValidator;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::any::Any;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use url::Url;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Failures while wiring up the service.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    BotCheck(#[from] BotCheckError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Shared application state.
pub struct AppState {
    pub pipeline: Pipeline,
    pub config: Config,
}

impl AppState {
    /// Build production collaborators from configuration.
    pub async fn from_config(config: Config) -> Result<Self, StartupError> {
        let store: Arc<dyn AdmissionStore> = match config.rate_limit.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Redis => {
                let url = config.rate_limit.redis_url.as_deref().ok_or_else(|| {
                    StoreError::Unavailable("rate_limit.redis_url is not set".to_string())
                })?;
                Arc::new(RedisStore::connect(url).await?)
            }
        };
        let limiter = RateLimiter::new(&config.rate_limit, store, Arc::new(SystemClock));

        let pipeline = Pipeline::new(
            SubmissionValidator::new(config.validation.clone()),
            bot_check::from_config(&config.bot_check)?,
            limiter,
            delivery::from_config(&config.delivery)?,
            config.rate_limit.key,
            Arc::new(Metrics::new()?),
        );

        Ok(Self { pipeline, config })
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let config = &state.config;

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route(&config.endpoint_path, any(submit));

    if config.metrics.enabled {
        app = app.route(&config.metrics.path, get(metrics));
    }

    app.layer(CatchPanicLayer::custom(panic_response))
        .layer(cors_layer(&config.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// A panicking handler still answers with the generic server error body.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    error!(detail, "Handler panicked");

    let outcome = Outcome::MisconfiguredServer;
    (outcome.status(), Json(SubmitResponse::from(outcome))).into_response()
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "contact-relay",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.metrics().render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Submission endpoint. Accepts any method so that non-POST requests get
/// the same JSON error body as every other rejection.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    method: Method,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let client_ip = client_ip(&headers, peer, state.config.trust_forwarded_for);
    let form_post = is_form(&headers);

    let payload = if method != Method::POST {
        SubmissionPayload::default()
    } else if form_post {
        SubmissionPayload::from_form(&body)
    } else {
        SubmissionPayload::from_json(&body)
    };

    debug!(client = ?client_ip, form_post, "Processing submission");

    let decision = state
        .pipeline
        .run(Submission {
            method,
            payload,
            client_ip,
        })
        .await;

    respond(decision, form_post)
}

fn respond(decision: Decision, form_post: bool) -> Response {
    if decision.outcome.is_accepted() && form_post {
        if let Some(target) = decision.next_url.as_deref().and_then(redirect_target) {
            return Redirect::to(target.as_str()).into_response();
        }
    }

    let status = decision.outcome.status();
    let body = Json(SubmitResponse::from(decision.outcome));
    let mut response = match decision.retry_after {
        Some(retry_after) => {
            // Round up so clients never retry early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            (status, [(header::RETRY_AFTER, secs.to_string())], body).into_response()
        }
        None => (status, body).into_response(),
    };
    if decision.outcome == Outcome::MethodNotAllowed {
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("POST, OPTIONS"));
    }
    response
}

/// Only absolute http(s) URLs are followed.
fn redirect_target(next_url: &str) -> Option<Url> {
    Url::parse(next_url)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_lowercase())
        .is_some_and(|ct| ct == FORM_CONTENT_TYPE)
}

fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded_for: bool) -> Option<IpAddr> {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }
    peer
}
