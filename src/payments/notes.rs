//! Order note templates
//!
//! Every note names the transaction reference and both sides of the
//! comparison (currency symbol and amount) so a reviewer never has to look
//! the payment up to act on it.

use crate::orders::{Order, OrderNote};
use crate::payments::types::Transaction;
use bigdecimal::BigDecimal;

pub fn currency_symbol(code: &str) -> &str {
    match code.to_ascii_uppercase().as_str() {
        "XAF" => "FCFA",
        "XOF" => "CFA",
        "NGN" => "₦",
        "GHS" => "GH₵",
        "KES" => "KSh",
        "ZAR" => "R",
        "USD" => "$",
        "CAD" => "CA$",
        "EUR" => "€",
        "GBP" => "£",
        _ => code,
    }
}

fn money(amount: &BigDecimal, currency: &str) -> String {
    let amount = if amount.is_integer() {
        amount.with_scale(0)
    } else {
        amount.clone()
    };
    format!("{}{} ({})", currency_symbol(currency), amount, currency)
}

struct Figures {
    paid: String,
    expected: String,
    reference: String,
}

impl Figures {
    fn of(order: &Order, txn: &Transaction) -> Self {
        Self {
            paid: money(&txn.amount, &txn.currency),
            expected: money(&order.total_amount, &order.currency),
            reference: txn.binding_reference().unwrap_or_default().to_string(),
        }
    }
}

pub fn underpayment(order: &Order, txn: &Transaction) -> [OrderNote; 2] {
    let f = Figures::of(order, txn);
    [
        OrderNote::customer(format!(
            "Thank you for your payment. The amount received, {}, is less than your order total of {}. \
             Your order is on hold and will be reviewed by our team. Transaction reference: {}",
            f.paid, f.expected, f.reference
        )),
        OrderNote::admin(format!(
            "Underpayment: amount paid {} is less than amount expected {}. \
             Order held for manual review; stock has been reduced. Notch Pay transaction reference: {}",
            f.paid, f.expected, f.reference
        )),
    ]
}

pub fn currency_mismatch(order: &Order, txn: &Transaction) -> [OrderNote; 2] {
    let f = Figures::of(order, txn);
    [
        OrderNote::customer(format!(
            "Thank you for your payment. It was made as {} but your order is priced at {}. \
             Your order is on hold and will be reviewed by our team. Transaction reference: {}",
            f.paid, f.expected, f.reference
        )),
        OrderNote::admin(format!(
            "Currency mismatch: paid {} against an order total of {}. \
             Order held for manual review; stock has been reduced. Notch Pay transaction reference: {}",
            f.paid, f.expected, f.reference
        )),
    ]
}

pub fn payment_complete(order: &Order, txn: &Transaction) -> OrderNote {
    let f = Figures::of(order, txn);
    OrderNote::admin(format!(
        "Payment via Notch Pay successful: received {} for an order total of {}. Transaction reference: {}",
        f.paid, f.expected, f.reference
    ))
}

pub fn initiation_failed(reason: &str) -> OrderNote {
    OrderNote::admin(format!("Payment init failed with message: {}", reason))
}
