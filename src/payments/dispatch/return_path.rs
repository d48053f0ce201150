//! Synchronous return path
//!
//! The customer's browser comes back from the hosted payment page with a
//! reference in the query string. Only that reference is trusted: status and
//! amount are fetched again from the provider before reconciling.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AppError, DomainError, ExternalError};
use crate::payments::gateway::NotchPayGateway;
use crate::payments::traits::PaymentGateway;

/// Message shown to the customer when a payment could not be confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnNotice {
    pub message: String,
    pub retry_url: String,
    /// Refreshing may succeed; otherwise the customer must start over
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnOutcome {
    Redirect(String),
    Notice(ReturnNotice),
}

/// Handle the customer's return for `reference`.
///
/// Never fails: every error becomes either a redirect or a notice.
pub async fn handle_return(gateway: &NotchPayGateway, reference: Option<&str>) -> ReturnOutcome {
    let settings = gateway.settings();

    let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) else {
        return ReturnOutcome::Redirect(settings.cart_url.clone());
    };

    match gateway.verify(reference).await {
        Ok((order_id, outcome)) => {
            info!(order_id = %order_id, reference = %reference, outcome = %outcome, "Customer returned from Notch Pay");
            ReturnOutcome::Redirect(settings.order_received_url(order_id))
        }
        Err(e) => notice_for(gateway, reference, &e),
    }
}

fn notice_for(gateway: &NotchPayGateway, reference: &str, err: &AppError) -> ReturnOutcome {
    let settings = gateway.settings();

    if let Some(domain) = err.domain() {
        return match domain {
            DomainError::OrderNotFound { .. } => {
                warn!(reference = %reference, "Returned transaction points at an unknown order");
                ReturnOutcome::Notice(ReturnNotice {
                    message: "Order not found.".to_string(),
                    retry_url: settings.checkout_url.clone(),
                    retryable: false,
                })
            }
            _ => {
                warn!(reference = %reference, "Rejected return: {}", err);
                ReturnOutcome::Redirect(settings.cart_url.clone())
            }
        };
    }

    if let Some(ExternalError::TransactionNotFound { .. }) = err.external() {
        return ReturnOutcome::Notice(ReturnNotice {
            message: "Transaction not found on Notch Pay. Please retry checkout.".to_string(),
            retry_url: settings.checkout_url.clone(),
            retryable: false,
        });
    }

    warn!(reference = %reference, "Unable to confirm returned transaction: {}", err);
    ReturnOutcome::Notice(ReturnNotice {
        message: "Unable to confirm your transaction with Notch Pay, please refresh the page."
            .to_string(),
        retry_url: format!("{}?reference={}", settings.callback_url, reference),
        retryable: true,
    })
}
