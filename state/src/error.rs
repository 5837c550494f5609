use thiserror::Error;

/// Store-level errors, split into transient (worth a caller-side retry with
/// backoff) and terminal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transient store error: {0}")]
    Transient(String),

    #[error("store error: {0}")]
    Terminal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => StoreError::Transient(err.to_string()),
            sqlx::Error::Io(_) => StoreError::Transient(err.to_string()),
            sqlx::Error::Database(db_err) => {
                // SQLite busy (5) / locked (6); Postgres serialization_failure /
                // deadlock_detected classes.
                let code = db_err.code();
                let transient = matches!(code.as_deref(), Some("5") | Some("6"))
                    || matches!(code.as_deref(), Some("40001") | Some("40P01"));
                if transient {
                    StoreError::Transient(err.to_string())
                } else {
                    StoreError::Terminal(err.to_string())
                }
            }
            _ => StoreError::Terminal(err.to_string()),
        }
    }
}

impl From<StoreError> for gateway_model::GatewayError {
    fn from(err: StoreError) -> Self {
        gateway_model::GatewayError::Store(err.to_string())
    }
}
