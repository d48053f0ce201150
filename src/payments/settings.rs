//! Gateway behavior settings
//!
//! Built once from [`Config`](crate::config::Config) and passed explicitly to
//! each component.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::orders::{Order, OrderId};

/// Payment method id stored on orders paid through this gateway
pub const GATEWAY_ID: &str = "notchpay";

/// Which customer details are forwarded to the provider on initialize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFieldToggles {
    pub name: bool,
    pub email: bool,
    pub phone: bool,
    pub billing_address: bool,
    pub shipping_address: bool,
}

impl Default for CustomerFieldToggles {
    fn default() -> Self {
        Self {
            name: true,
            email: true,
            phone: true,
            billing_address: false,
            shipping_address: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub gateway_id: String,
    pub autocomplete_orders: bool,
    pub customer_fields: CustomerFieldToggles,
    /// Where the provider sends the customer back after payment
    pub callback_url: String,
    pub cart_url: String,
    pub checkout_url: String,
    pub order_received_url: String,
    /// Local processing budget for one webhook delivery
    pub webhook_timeout: Duration,
}

impl GatewaySettings {
    pub fn order_received_url(&self, order_id: OrderId) -> String {
        self.order_received_url
            .replace("{order_id}", &order_id.to_string())
    }

    /// Autocomplete only applies to orders paid with this gateway
    pub fn autocompletes(&self, order: &Order) -> bool {
        self.autocomplete_orders && order.payment_method == self.gateway_id
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            gateway_id: GATEWAY_ID.to_string(),
            autocomplete_orders: false,
            customer_fields: CustomerFieldToggles::default(),
            callback_url: "http://localhost:8080/v1/payments/notchpay/return".to_string(),
            cart_url: "http://localhost:8080/cart".to_string(),
            checkout_url: "http://localhost:8080/checkout".to_string(),
            order_received_url: "http://localhost:8080/checkout/order-received/{order_id}"
                .to_string(),
            webhook_timeout: Duration::from_secs(5),
        }
    }
}
