//! The task processor: claims queued jobs by priority and
//! drives each through the nine-step pipeline (validate, stage, probe,
//! infer-with-retry, persist, release, cleanup, callback), orchestrating
//! the file staging, model pool, and callback dispatcher crates.

mod config;
mod pipeline;
mod validate;

pub use config::ProcessorConfig;
pub use pipeline::TaskProcessor;
pub use validate::validate_decode_options;
