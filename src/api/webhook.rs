use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};

use super::ApiState;
use crate::payments::signature::SIGNATURE_HEADER;

/// Notch Pay webhook endpoint.
///
/// The body is always empty. 200 tells the provider the delivery is done,
/// whether it was processed, ignored or rejected; 503 asks for redelivery.
pub async fn notchpay_webhook(
    State(state): State<ApiState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let ack = state
        .webhooks
        .handle(method.as_str(), signature, &body)
        .await;

    if ack.is_final() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
