//! Payment types and data structures
//!
//! Shapes exchanged with the provider and returned by the gateway.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-side status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Initialized,
    Pending,
    Processing,
    Complete,
    #[serde(alias = "cancelled")]
    Canceled,
    Failed,
    Expired,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Initialized => "initialized",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Complete => "complete",
            TransactionStatus::Canceled => "canceled",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Expired => "expired",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A transaction as reported by the provider. Never mutated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub reference: Option<String>,
    /// Same value as `reference`, under the name some API versions use
    #[serde(default)]
    pub merchant_reference: Option<String>,
    pub status: TransactionStatus,
    pub amount: BigDecimal,
    pub currency: String,
}

impl Transaction {
    /// The reference that binds this transaction to an order:
    /// `reference`, or `merchant_reference` when `reference` is absent.
    pub fn binding_reference(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .filter(|r| !r.is_empty())
            .or_else(|| self.merchant_reference.as_deref().filter(|r| !r.is_empty()))
    }
}

/// Body of a webhook push once its signature has been checked
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub data: Transaction,
}

/// Body of the initialize call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeRequest {
    pub amount: BigDecimal,
    pub currency: String,
    pub reference: String,
    pub callback: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Interpreted 201 response of the initialize call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeResponse {
    /// Hosted payment page
    pub authorization_url: String,
    /// The provider's own id for the transaction, if it sent one
    pub provider_reference: Option<String>,
}

/// Where to send the customer to pay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectTarget {
    pub redirect_url: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initiation {
    Redirect(RedirectTarget),
    /// Nothing to charge: the total is zero or the order is already paid
    NoPaymentRequired,
}

/// Result of reconciling a provider transaction against an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The order was already processing, completed or on hold; nothing changed
    AlreadyFinalized,
    Cancelled,
    Failed,
    /// The provider has not reached a final decision yet
    Pending,
    OnHoldAmountMismatch,
    OnHoldCurrencyMismatch,
    Completed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::AlreadyFinalized => "already_finalized",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed => "failed",
            Outcome::Pending => "pending",
            Outcome::OnHoldAmountMismatch => "on_hold_amount_mismatch",
            Outcome::OnHoldCurrencyMismatch => "on_hold_currency_mismatch",
            Outcome::Completed => "completed",
        };
        f.write_str(s)
    }
}
