//! Shared domain types for the ASR gateway: the `Job` record, its status and
//! priority enums, decode options, transcript results, and the crate-wide
//! error taxonomy. Every other crate in the workspace depends on this one
//! instead of redefining these shapes.

mod backoff;
mod decode_options;
mod error;
mod job;
mod result;
mod worker;

pub use backoff::Backoff;
pub use decode_options::DecodeOptions;
pub use decode_options::Temperature;
pub use error::GatewayError;
pub use job::Job;
pub use job::JobFilter;
pub use job::JobId;
pub use job::JobPatch;
pub use job::JobSource;
pub use job::JobSpec;
pub use job::JobStatus;
pub use job::Priority;
pub use job::TaskType;
pub use result::Segment;
pub use result::TranscriptResult;
pub use worker::DeviceId;
pub use worker::Worker;
pub use worker::WorkerState;
