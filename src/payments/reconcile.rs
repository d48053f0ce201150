//! Reconciliation engine
//!
//! [`decide`] is the pure decision procedure: given an order and the
//! provider's view of a transaction it computes the outcome and, when the
//! order must change, the complete [`Transition`] to apply. [`Reconciler`]
//! checks the reference binding and applies that transition with the order
//! store's compare-and-set, so concurrent callers converge on a single
//! effective mutation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, DomainError};
use crate::orders::{Order, OrderStatus, OrderStore, Transition};
use crate::payments::notes;
use crate::payments::reference;
use crate::payments::settings::GatewaySettings;
use crate::payments::types::{Outcome, Transaction, TransactionStatus};

/// Re-reads allowed when the order status moves between read and write
const MAX_CAS_ATTEMPTS: usize = 3;

/// What reconciling a transaction does to an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: Outcome,
    /// `None` when the order is left untouched
    pub transition: Option<Transition>,
}

impl Verdict {
    fn unchanged(outcome: Outcome) -> Self {
        Self {
            outcome,
            transition: None,
        }
    }

    fn apply(outcome: Outcome, transition: Transition) -> Self {
        Self {
            outcome,
            transition: Some(transition),
        }
    }
}

/// Decide the order's next state for a provider transaction.
///
/// Amount and currency mismatches are outcomes, not errors. Currency codes
/// compare case-insensitively.
pub fn decide(order: &Order, txn: &Transaction, settings: &GatewaySettings) -> Verdict {
    if order.status.is_finalized() {
        return Verdict::unchanged(Outcome::AlreadyFinalized);
    }

    match txn.status {
        TransactionStatus::Canceled => {
            if order.status == OrderStatus::Cancelled {
                Verdict::unchanged(Outcome::Cancelled)
            } else {
                Verdict::apply(
                    Outcome::Cancelled,
                    Transition::status_only(OrderStatus::Cancelled),
                )
            }
        }
        TransactionStatus::Failed => {
            if order.status == OrderStatus::Failed {
                Verdict::unchanged(Outcome::Failed)
            } else {
                Verdict::apply(Outcome::Failed, Transition::status_only(OrderStatus::Failed))
            }
        }
        TransactionStatus::Complete => settle(order, txn, settings),
        _ => Verdict::unchanged(Outcome::Pending),
    }
}

fn settle(order: &Order, txn: &Transaction, settings: &GatewaySettings) -> Verdict {
    if txn.amount < order.total_amount {
        return Verdict::apply(
            Outcome::OnHoldAmountMismatch,
            Transition {
                to: OrderStatus::OnHold,
                notes: notes::underpayment(order, txn).to_vec(),
                reduce_stock: true,
                empty_cart: false,
            },
        );
    }

    if !txn.currency.eq_ignore_ascii_case(&order.currency) {
        return Verdict::apply(
            Outcome::OnHoldCurrencyMismatch,
            Transition {
                to: OrderStatus::OnHold,
                notes: notes::currency_mismatch(order, txn).to_vec(),
                reduce_stock: true,
                empty_cart: false,
            },
        );
    }

    let to = if settings.autocompletes(order) {
        OrderStatus::Completed
    } else {
        OrderStatus::Processing
    };

    Verdict::apply(
        Outcome::Completed,
        Transition {
            to,
            notes: vec![notes::payment_complete(order, txn)],
            reduce_stock: true,
            empty_cart: true,
        },
    )
}

/// Ensure `txn` belongs to `order`
pub fn check_binding(order: &Order, txn: &Transaction) -> AppResult<()> {
    let reference = txn
        .binding_reference()
        .ok_or_else(|| AppError::malformed_reference(""))?;
    let order_id = reference::decode(reference)?;

    if order_id != order.id {
        return Err(DomainError::ReferenceMismatch {
            order_id: order.id.get(),
            reference: reference.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Applies reconciliation verdicts through the order store
pub struct Reconciler {
    store: Arc<dyn OrderStore>,
    settings: GatewaySettings,
}

impl Reconciler {
    pub fn new(store: Arc<dyn OrderStore>, settings: GatewaySettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Reconcile `txn` against `order` and apply the result.
    ///
    /// `order` may be stale: when the stored status has moved on, the order
    /// is re-read and the decision taken again against the fresh state.
    pub async fn reconcile(&self, order: &Order, txn: &Transaction) -> AppResult<Outcome> {
        check_binding(order, txn)?;

        let mut current = order.clone();
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let verdict = decide(&current, txn, &self.settings);

            let Some(transition) = verdict.transition else {
                debug!(
                    order_id = %current.id,
                    status = %current.status,
                    txn_status = %txn.status,
                    outcome = %verdict.outcome,
                    "Reconciliation left order unchanged"
                );
                return Ok(verdict.outcome);
            };

            if self
                .store
                .apply_transition(current.id, current.status, &transition)
                .await?
            {
                info!(
                    order_id = %current.id,
                    from = %current.status,
                    to = %transition.to,
                    outcome = %verdict.outcome,
                    reference = txn.binding_reference().unwrap_or_default(),
                    "Order reconciled"
                );
                return Ok(verdict.outcome);
            }

            debug!(order_id = %current.id, attempt, "Order changed concurrently, re-reading");
            current = self
                .store
                .get(current.id)
                .await?
                .ok_or(DomainError::OrderNotFound {
                    order_id: order.id.get(),
                })?;
        }

        if current.status.is_finalized() {
            return Ok(Outcome::AlreadyFinalized);
        }

        warn!(order_id = %current.id, "Order status kept changing during reconciliation");
        Err(AppError::store(format!(
            "order {} changed {} times during reconciliation",
            current.id, MAX_CAS_ATTEMPTS
        )))
    }
}
