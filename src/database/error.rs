use std::fmt;

/// Failures of the Postgres order store
#[derive(Debug, Clone)]
pub enum DatabaseErrorKind {
    /// No connection became free before the acquire timeout
    PoolExhausted,
    /// Socket-level failure or a closed pool
    ConnectionError { message: String },
    /// Statement rejected by Postgres
    QueryError { message: String },
    /// Transaction used after commit or rollback, or failed to finish
    TransactionError { message: String },
    /// Stored value the order model cannot represent
    InvalidData { message: String },
    /// Bad connection settings or migrations that cannot be loaded
    ConfigError { message: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub context: Option<String>,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Whether the same call may succeed once the database recovers
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::PoolExhausted | DatabaseErrorKind::ConnectionError { .. }
        )
    }

    pub fn from_sqlx(error: sqlx::Error) -> Self {
        let kind = match error {
            sqlx::Error::PoolTimedOut => DatabaseErrorKind::PoolExhausted,
            sqlx::Error::PoolClosed => DatabaseErrorKind::ConnectionError {
                message: "connection pool is closed".to_string(),
            },
            sqlx::Error::Io(io_err) => DatabaseErrorKind::ConnectionError {
                message: io_err.to_string(),
            },
            sqlx::Error::Configuration(msg) => DatabaseErrorKind::ConfigError {
                message: msg.to_string(),
            },
            sqlx::Error::Database(db_err) => DatabaseErrorKind::QueryError {
                message: match db_err.code() {
                    Some(code) => format!("{} (SQLSTATE {})", db_err.message(), code),
                    None => db_err.message().to_string(),
                },
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseErrorKind::InvalidData {
                    message: error.to_string(),
                }
            }
            other => DatabaseErrorKind::QueryError {
                message: other.to_string(),
            },
        };
        Self::new(kind)
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DatabaseErrorKind::PoolExhausted => write!(f, "Database connection pool exhausted")?,
            DatabaseErrorKind::ConnectionError { message } => {
                write!(f, "Database connection error: {}", message)?
            }
            DatabaseErrorKind::QueryError { message } => {
                write!(f, "Database query failed: {}", message)?
            }
            DatabaseErrorKind::TransactionError { message } => {
                write!(f, "Transaction failed: {}", message)?
            }
            DatabaseErrorKind::InvalidData { message } => {
                write!(f, "Invalid stored data: {}", message)?
            }
            DatabaseErrorKind::ConfigError { message } => {
                write!(f, "Database configuration error: {}", message)?
            }
        }

        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for DatabaseError {}
