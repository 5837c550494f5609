//! Media utilities: probing file duration, extracting audio, and
//! rendering a completed transcript to a subtitle format. Every operation
//! shells out to `ffprobe`/`ffmpeg`, mirroring how the pack's desktop ffmpeg
//! tooling wraps the same binaries.

mod error;
mod extract;
mod probe;
mod subtitle;

pub use error::MediaError;
pub use extract::AudioContainer;
pub use extract::ExtractOptions;
pub use extract::extract_audio;
pub use probe::probe_duration;
pub use subtitle::SubtitleFormat;
pub use subtitle::render_subtitle;
