//! HTTP surface
//!
//! Thin axum handlers over the gateway and the dispatchers.

pub mod checkout;
pub mod error;
pub mod health;
pub mod middleware;
pub mod webhook;

use std::sync::Arc;

use axum::routing::{any, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::payments::dispatch::WebhookDispatcher;
use crate::payments::NotchPayGateway;

/// Static facts about the running service, reported by `/health`
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub environment: String,
    pub sandbox: bool,
    pub provider_configured: bool,
}

impl ServiceInfo {
    pub fn from_config(config: &Config) -> Self {
        Self {
            environment: config.server.environment.clone(),
            sandbox: config.notchpay.sandbox,
            provider_configured: !config.notchpay.active_key().is_empty()
                && !config.notchpay.webhook_secret.is_empty(),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub gateway: Arc<NotchPayGateway>,
    pub webhooks: Arc<WebhookDispatcher>,
    pub service: ServiceInfo,
    #[cfg(feature = "database")]
    pub db: Option<sqlx::PgPool>,
    #[cfg(feature = "cache")]
    pub redis: Option<crate::cache::RedisPool>,
}

impl ApiState {
    pub fn new(
        gateway: Arc<NotchPayGateway>,
        webhooks: Arc<WebhookDispatcher>,
        service: ServiceInfo,
    ) -> Self {
        Self {
            gateway,
            webhooks,
            service,
            #[cfg(feature = "database")]
            db: None,
            #[cfg(feature = "cache")]
            redis: None,
        }
    }

    #[cfg(feature = "database")]
    pub fn with_database(mut self, pool: sqlx::PgPool) -> Self {
        self.db = Some(pool);
        self
    }

    #[cfg(feature = "cache")]
    pub fn with_cache(mut self, pool: crate::cache::RedisPool) -> Self {
        self.redis = Some(pool);
        self
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/v1/orders/:order_id/payment", post(checkout::initialize_payment))
        .route("/v1/payments/notchpay/return", get(checkout::payment_return))
        // Any method is accepted so the dispatcher itself can refuse non-POST
        .route("/v1/webhooks/notchpay", any(webhook::notchpay_webhook))
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
