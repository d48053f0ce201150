//! Mapping of gateway errors to HTTP responses
//!
//! Bodies carry a customer-facing notice only; details stay in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{AppError, AppErrorKind, DomainError, ExternalError};

#[derive(Debug, Serialize)]
pub struct NoticeBody {
    pub notice: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Domain(DomainError::OrderNotFound { .. }) => StatusCode::NOT_FOUND,
            AppErrorKind::Domain(_) => StatusCode::BAD_REQUEST,
            AppErrorKind::External(ExternalError::TransactionNotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            AppErrorKind::External(ExternalError::RateLimit { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppErrorKind::External(_) => StatusCode::BAD_GATEWAY,
            AppErrorKind::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Text safe to show to a customer
    pub fn notice(&self) -> &'static str {
        match &self.kind {
            AppErrorKind::Domain(DomainError::OrderNotFound { .. }) => "Order not found.",
            AppErrorKind::Domain(_) => "This order cannot be paid.",
            AppErrorKind::External(_) => "Unable to process payment, try again.",
            AppErrorKind::Infrastructure(_) => "Service temporarily unavailable, try again.",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", self);
        } else {
            tracing::warn!(status = status.as_u16(), "Request rejected: {}", self);
        }

        let body = NoticeBody {
            notice: self.notice().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_failures_map_to_bad_gateway() {
        let err: AppError = ExternalError::ProviderRejection {
            provider: "Notch Pay".to_string(),
            status: 422,
            message: "invalid currency".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.notice(), "Unable to process payment, try again.");
    }

    #[test]
    fn test_unknown_order_is_not_found() {
        let err: AppError = DomainError::OrderNotFound { order_id: 3 }.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
