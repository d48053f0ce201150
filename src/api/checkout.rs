use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::error::AppError;
use crate::orders::OrderId;
use crate::payments::dispatch::return_path::{self, ReturnOutcome};
use crate::payments::traits::PaymentGateway;
use crate::payments::types::Initiation;

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Start paying for an order. Responds with where to send the customer.
pub async fn initialize_payment(
    State(state): State<ApiState>,
    Path(order_id): Path<i64>,
) -> Result<Json<PaymentResponse>, AppError> {
    let order = state.gateway.load_order(OrderId(order_id)).await?;

    let response = match state.gateway.initialize(&order).await? {
        Initiation::Redirect(target) => PaymentResponse {
            redirect_url: target.redirect_url,
            reference: Some(target.reference),
        },
        Initiation::NoPaymentRequired => PaymentResponse {
            redirect_url: state.gateway.settings().order_received_url(order.id),
            reference: None,
        },
    };

    Ok(Json(response))
}

/// Query string of the provider's redirect back to the shop
#[derive(Debug, Default, Deserialize)]
pub struct ReturnQuery {
    pub reference: Option<String>,
    /// Older API versions send the reference under this name
    pub trxref: Option<String>,
}

pub async fn payment_return(
    State(state): State<ApiState>,
    Query(query): Query<ReturnQuery>,
) -> Response {
    let reference = query.reference.or(query.trxref);

    match return_path::handle_return(&state.gateway, reference.as_deref()).await {
        ReturnOutcome::Redirect(location) => Redirect::to(&location).into_response(),
        ReturnOutcome::Notice(notice) => {
            let status = if notice.retryable {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::NOT_FOUND
            };
            (status, Json(notice)).into_response()
        }
    }
}
