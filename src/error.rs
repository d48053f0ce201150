//! Application error types
//!
//! Errors are grouped by where they originate: the payment provider
//! (`External`), the gateway's own checks (`Domain`), or the services it
//! runs on (`Infrastructure`). Mismatched amounts or currencies are not
//! errors; they are reconciliation outcomes.

use thiserror::Error;

#[cfg(feature = "database")]
use crate::database::error::DatabaseError;

pub type AppResult<T> = Result<T, AppError>;

/// Failures talking to the payment provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExternalError {
    #[error("{provider} unreachable: {message}")]
    Transport {
        provider: String,
        message: String,
        is_timeout: bool,
    },

    #[error("{provider} rejected the request (HTTP {status}): {message}")]
    ProviderRejection {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Transaction '{reference}' not found on {provider}")]
    TransactionNotFound { provider: String, reference: String },

    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("Rate limit exceeded for {service}")]
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
}

/// Failures of the gateway's own validation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Malformed transaction reference '{reference}'")]
    MalformedReference { reference: String },

    #[error("Reference '{reference}' does not belong to order {order_id}")]
    ReferenceMismatch { order_id: i64, reference: String },

    #[error("Webhook signature is invalid")]
    SignatureInvalid,

    #[error("Order {order_id} not found")]
    OrderNotFound { order_id: i64 },

    #[error("Invalid order: {message}")]
    InvalidOrder { message: String },
}

#[derive(Debug, Clone, Error)]
pub enum InfrastructureError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[cfg(feature = "database")]
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Order store error: {message}")]
    Store { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Operation timed out after {millis}ms")]
    Timeout { millis: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum AppErrorKind {
    #[error(transparent)]
    External(#[from] ExternalError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
}

#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        InfrastructureError::Configuration {
            message: message.into(),
        }
        .into()
    }

    pub fn store(message: impl Into<String>) -> Self {
        InfrastructureError::Store {
            message: message.into(),
        }
        .into()
    }

    pub fn malformed_reference(reference: impl Into<String>) -> Self {
        DomainError::MalformedReference {
            reference: reference.into(),
        }
        .into()
    }

    /// Whether the same request may succeed if attempted again later.
    ///
    /// Provider outages, timeouts and storage hiccups are retryable; forged,
    /// malformed or mismatched input never is.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::External(e) => matches!(
                e,
                ExternalError::Transport { .. }
                    | ExternalError::RateLimit { .. }
                    | ExternalError::MalformedResponse { .. }
            ) || matches!(e, ExternalError::ProviderRejection { status, .. } if *status >= 500),
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(InfrastructureError::Configuration { .. }) => false,
            #[cfg(feature = "database")]
            AppErrorKind::Infrastructure(InfrastructureError::Database(e)) => e.is_retryable(),
            AppErrorKind::Infrastructure(_) => true,
        }
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match &self.kind {
            AppErrorKind::Domain(e) => Some(e),
            _ => None,
        }
    }

    pub fn external(&self) -> Option<&ExternalError> {
        match &self.kind {
            AppErrorKind::External(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExternalError> for AppError {
    fn from(err: ExternalError) -> Self {
        AppError::new(AppErrorKind::External(err))
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::new(AppErrorKind::Domain(err))
    }
}

impl From<InfrastructureError> for AppError {
    fn from(err: InfrastructureError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(err))
    }
}

#[cfg(feature = "database")]
impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        InfrastructureError::Database(err).into()
    }
}
