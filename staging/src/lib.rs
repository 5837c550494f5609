//! File staging: turning a job's declared source into a local
//! file path ready for inference, under a size cap, with restart-safe
//! cleanup.

mod error;
mod reconcile;
mod service;

pub use error::StagingError;
pub use reconcile::reconcile_orphans;
pub use service::StagingConfig;
pub use service::StagingService;
