use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("cannot resize below min_size ({min_size})")]
    BelowMinSize { min_size: usize },

    #[error("cannot resize above max device capacity ({capacity})")]
    AboveDeviceCapacity { capacity: usize },

    #[error("model pool is shutting down")]
    Closed,
}
