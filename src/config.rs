use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::payments::providers::notchpay::{NotchPayConfig, DEFAULT_BASE_URL};
use crate::payments::settings::{CustomerFieldToggles, GatewaySettings, GATEWAY_ID};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    pub notchpay: ProviderSettings,
    pub urls: UrlConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub base_url: String,
    pub public_key: String,
    pub sandbox_key: String,
    pub sandbox: bool,
    pub webhook_secret: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub autocomplete_orders: bool,
    pub webhook_timeout_ms: u64,
    pub customer_fields: CustomerFieldToggles,
}

impl ProviderSettings {
    /// Key sent in the `Authorization` header: sandbox key in test mode
    pub fn active_key(&self) -> &str {
        if self.sandbox {
            &self.sandbox_key
        } else {
            &self.public_key
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UrlConfig {
    pub public_base_url: String,
    pub cart_url: String,
    pub checkout_url: String,
    /// Order status page, with `{order_id}` as placeholder
    pub order_received_url: String,
}

fn env_flag(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(anyhow!("{} must be a boolean, got '{}'", name, other)),
        },
        Err(_) => Ok(default),
    }
}

fn env_number<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .context("PORT not set")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let database = match env::var("DATABASE_URL") {
            Ok(url) => Some(DatabaseConfig {
                url,
                max_connections: env_number("DATABASE_MAX_CONNECTIONS", 20)?,
            }),
            Err(_) => None,
        };

        let redis = env::var("REDIS_URL").ok().map(|url| RedisConfig { url });

        let notchpay = ProviderSettings {
            base_url: env::var("NOTCHPAY_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            public_key: env::var("NOTCHPAY_PUBLIC_KEY").unwrap_or_default(),
            sandbox_key: env::var("NOTCHPAY_SANDBOX_KEY").unwrap_or_default(),
            sandbox: env_flag("NOTCHPAY_SANDBOX", true)?,
            webhook_secret: env::var("NOTCHPAY_WEBHOOK_SECRET")
                .context("NOTCHPAY_WEBHOOK_SECRET not set")?,
            timeout_secs: env_number("NOTCHPAY_TIMEOUT_SECS", 30)?,
            max_retries: env_number("NOTCHPAY_MAX_RETRIES", 3)?,
            autocomplete_orders: env_flag("NOTCHPAY_AUTOCOMPLETE_ORDERS", false)?,
            webhook_timeout_ms: env_number("NOTCHPAY_WEBHOOK_TIMEOUT_MS", 5000)?,
            customer_fields: CustomerFieldToggles {
                name: env_flag("NOTCHPAY_SEND_NAME", true)?,
                email: env_flag("NOTCHPAY_SEND_EMAIL", true)?,
                phone: env_flag("NOTCHPAY_SEND_PHONE", true)?,
                billing_address: env_flag("NOTCHPAY_SEND_BILLING_ADDRESS", false)?,
                shipping_address: env_flag("NOTCHPAY_SEND_SHIPPING_ADDRESS", false)?,
            },
        };

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .context("PUBLIC_BASE_URL not set")?
            .trim_end_matches('/')
            .to_string();

        let urls = UrlConfig {
            cart_url: env::var("CART_URL").unwrap_or_else(|_| format!("{}/cart", public_base_url)),
            checkout_url: env::var("CHECKOUT_URL")
                .unwrap_or_else(|_| format!("{}/checkout", public_base_url)),
            order_received_url: env::var("ORDER_RECEIVED_URL").unwrap_or_else(|_| {
                format!("{}/checkout/order-received/{{order_id}}", public_base_url)
            }),
            public_base_url,
        };

        let config = Config {
            server,
            database,
            redis,
            notchpay,
            urls,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if let Some(database) = &self.database {
            if database.url.trim().is_empty() {
                return Err(anyhow!("DATABASE_URL cannot be empty"));
            }
            if database.max_connections == 0 {
                return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
            }
        }

        if let Some(redis) = &self.redis {
            if redis.url.trim().is_empty() {
                return Err(anyhow!("REDIS_URL cannot be empty"));
            }
        }

        if self.notchpay.active_key().trim().is_empty() {
            let variable = if self.notchpay.sandbox {
                "NOTCHPAY_SANDBOX_KEY"
            } else {
                "NOTCHPAY_PUBLIC_KEY"
            };
            return Err(anyhow!("{} cannot be empty", variable));
        }

        if self.notchpay.webhook_secret.trim().is_empty() {
            return Err(anyhow!("NOTCHPAY_WEBHOOK_SECRET cannot be empty"));
        }

        if self.notchpay.timeout_secs == 0 {
            return Err(anyhow!("NOTCHPAY_TIMEOUT_SECS must be greater than 0"));
        }

        if self.notchpay.webhook_timeout_ms == 0 {
            return Err(anyhow!("NOTCHPAY_WEBHOOK_TIMEOUT_MS must be greater than 0"));
        }

        if self.server.environment == "production" && self.notchpay.sandbox {
            tracing::warn!("Notch Pay sandbox mode is enabled in production");
        }

        if !self.urls.order_received_url.contains("{order_id}") {
            return Err(anyhow!(
                "ORDER_RECEIVED_URL must contain the {{order_id}} placeholder"
            ));
        }

        Ok(())
    }

    /// HTTP client settings for the Notch Pay API
    pub fn provider_config(&self) -> NotchPayConfig {
        NotchPayConfig {
            api_key: self.notchpay.active_key().to_string(),
            webhook_secret: self.notchpay.webhook_secret.clone(),
            base_url: self.notchpay.base_url.trim_end_matches('/').to_string(),
            timeout_secs: self.notchpay.timeout_secs,
            max_retries: self.notchpay.max_retries,
            ..NotchPayConfig::default()
        }
    }

    /// Gateway behavior flags handed to the initiator, engine and dispatchers
    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            gateway_id: GATEWAY_ID.to_string(),
            autocomplete_orders: self.notchpay.autocomplete_orders,
            customer_fields: self.notchpay.customer_fields.clone(),
            callback_url: format!("{}/v1/payments/notchpay/return", self.urls.public_base_url),
            cart_url: self.urls.cart_url.clone(),
            checkout_url: self.urls.checkout_url.clone(),
            order_received_url: self.urls.order_received_url.clone(),
            webhook_timeout: Duration::from_millis(self.notchpay.webhook_timeout_ms),
        }
    }
}
