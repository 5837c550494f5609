use tokio::process::Command;

use crate::MediaError;

const STDERR_TAIL_LINES: usize = 12;

fn stderr_tail(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .take(STDERR_TAIL_LINES)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Probes a media file's duration in seconds via `ffprobe -show_entries
/// format=duration`.
pub async fn probe_duration(path: &str, ffprobe_program: &str) -> Result<f64, MediaError> {
    let output = Command::new(ffprobe_program)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
            path,
        ])
        .output()
        .await
        .map_err(|source| MediaError::Spawn { tool: "ffprobe", source })?;

    if !output.status.success() {
        return Err(MediaError::ToolFailed {
            tool: "ffprobe",
            stderr_tail: stderr_tail(&output.stderr),
        });
    }

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|err| MediaError::Unparseable(err.to_string()))?;
    let duration_str = parsed
        .get("format")
        .and_then(|format| format.get("duration"))
        .and_then(|value| value.as_str())
        .ok_or_else(|| MediaError::Unparseable("missing format.duration field".into()))?;
    duration_str
        .parse::<f64>()
        .map_err(|err| MediaError::Unparseable(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn missing_binary_surfaces_a_spawn_error() {
        let result = probe_duration("/tmp/does-not-matter.mp4", "ffprobe-does-not-exist").await;
        assert!(matches!(result, Err(MediaError::Spawn { tool: "ffprobe", .. })));
    }

    #[test]
    fn stderr_tail_keeps_only_the_last_lines() {
        let stderr = (0..20).map(|n| format!("line {n}")).collect::<Vec<_>>().join("\n");
        let tail = stderr_tail(stderr.as_bytes());
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
        assert_eq!(tail.lines().last(), Some("line 19"));
    }
}
