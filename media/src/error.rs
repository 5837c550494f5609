use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with an error: {stderr_tail}")]
    ToolFailed { tool: &'static str, stderr_tail: String },

    #[error("could not parse ffprobe output: {0}")]
    Unparseable(String),

    #[error("unsupported audio container: {0}")]
    UnsupportedContainer(String),
}
