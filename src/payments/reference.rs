//! Transaction reference codec
//!
//! A reference is `"{order_id}_{timestamp}"`. Only the order id is ever read
//! back; the timestamp exists to make each attempt unique.

use crate::error::{AppError, AppResult};
use crate::orders::OrderId;

pub fn encode(order_id: OrderId, timestamp: i64) -> String {
    format!("{}_{}", order_id, timestamp)
}

/// Reference for a new attempt on `order_id`, stamped with the current time
pub fn generate(order_id: OrderId) -> String {
    encode(order_id, chrono::Utc::now().timestamp())
}

/// Extract the order id from a reference.
///
/// The segment before the first `_` must be a positive integer with no sign,
/// whitespace or other decoration. Anything else is rejected.
pub fn decode(reference: &str) -> AppResult<OrderId> {
    let (prefix, _) = reference
        .split_once('_')
        .ok_or_else(|| AppError::malformed_reference(reference))?;

    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::malformed_reference(reference));
    }

    match prefix.parse::<i64>() {
        Ok(id) if id > 0 => Ok(OrderId(id)),
        _ => Err(AppError::malformed_reference(reference)),
    }
}
