use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("callback dispatcher queue is closed")]
    Closed,

    #[error(transparent)]
    Store(#[from] gateway_state::StoreError),
}
