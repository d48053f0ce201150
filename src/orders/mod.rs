//! Host order model
//!
//! The gateway never owns orders. It reads them and asks the order store to
//! apply status transitions through the [`OrderStore`] contract.

pub mod memory;
pub mod store;

pub use memory::MemoryOrderStore;
pub use store::OrderStore;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Metadata key holding the reference sent to the provider at initialization
pub const TRANSACTION_REFERENCE_KEY: &str = "_notchpay_txn_ref";

/// Positive integer order identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl OrderId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }

    /// Once an order reaches one of these, reconciliation leaves it alone.
    pub fn is_finalized(&self) -> bool {
        matches!(
            self,
            OrderStatus::Processing | OrderStatus::Completed | OrderStatus::OnHold
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches("wc-") {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "on-hold" => Ok(OrderStatus::OnHold),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    pub country: String,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [
            Some(self.line1.as_str()),
            self.line2.as_deref(),
            Some(self.city.as_str()),
            self.state.as_deref(),
            self.postcode.as_deref(),
            Some(self.country.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|p| !p.trim().is_empty())
        .collect();
        f.write_str(&parts.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
}

impl CustomerDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    pub name: String,
    pub quantity: i32,
}

/// An order as the host store reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Amount expected from the customer, in the unit agreed with the provider
    pub total_amount: BigDecimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_method: String,
    pub customer: CustomerDetails,
    pub items: Vec<OrderItem>,
    /// Session owning the cart this order was placed from
    pub session_id: Option<String>,
    /// Provider-side transaction id, once known
    pub transaction_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl Order {
    pub fn transaction_reference(&self) -> Option<&str> {
        self.metadata
            .get(TRANSACTION_REFERENCE_KEY)
            .map(String::as_str)
    }

    /// Comma-separated item names, sent to the provider as the description
    pub fn description(&self) -> String {
        self.items
            .iter()
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNote {
    pub text: String,
    pub customer_visible: bool,
}

impl OrderNote {
    pub fn customer(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            customer_visible: true,
        }
    }

    pub fn admin(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            customer_visible: false,
        }
    }
}

/// The complete set of changes a reconciliation verdict makes to one order.
///
/// Applied by [`OrderStore::apply_transition`] as a single compare-and-set
/// on the order status; either every part lands or none does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub to: OrderStatus,
    pub notes: Vec<OrderNote>,
    pub reduce_stock: bool,
    pub empty_cart: bool,
}

impl Transition {
    pub fn status_only(to: OrderStatus) -> Self {
        Self {
            to,
            notes: Vec::new(),
            reduce_stock: false,
            empty_cart: false,
        }
    }
}
