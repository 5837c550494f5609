use thiserror::Error;

/// The ASR inference collaborator's failure modes. `Transient`
/// is the "transient device error" the processor retries once on a fresh
/// worker; everything else is a terminal decoder error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transient device error: {0}")]
    Transient(String),

    #[error("decoder error: {0}")]
    Decode(String),

    #[error("failed to read audio file: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Transient(_))
    }
}

impl From<EngineError> for gateway_model::GatewayError {
    fn from(err: EngineError) -> Self {
        gateway_model::GatewayError::Inference(err.to_string())
    }
}
