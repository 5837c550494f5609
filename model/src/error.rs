use thiserror::Error;

/// The crate-wide failure taxonomy: validation errors never reach
/// the store, the rest map onto a job's terminal `failed` state or propagate
/// to the caller verbatim.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("staging error: {0}")]
    Staging(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("job {0} not found")]
    NotFound(i64),

    #[error("deadline exceeded: {0}")]
    Deadline(String),
}

impl GatewayError {
    pub fn is_validation(&self) -> bool {
        matches!(self, GatewayError::Validation(_))
    }
}
