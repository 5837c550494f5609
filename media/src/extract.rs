use tokio::process::Command;

use crate::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    Wav,
    Mp3,
}

impl AudioContainer {
    pub fn parse(value: &str) -> Result<Self, MediaError> {
        match value.to_ascii_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "mp3" => Ok(Self::Mp3),
            other => Err(MediaError::UnsupportedContainer(other.to_owned())),
        }
    }

    fn ffmpeg_format_name(self) -> &'static str {
        match self {
            AudioContainer::Wav => "wav",
            AudioContainer::Mp3 => "mp3",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub container: AudioContainer,
    pub sample_rate_hz: Option<u32>,
    pub bit_depth: Option<u32>,
}

fn stderr_tail(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .take(12)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts the audio track of `path` to the requested container, streamed
/// to stdout rather than a temp file.
pub async fn extract_audio(
    path: &str,
    options: &ExtractOptions,
    ffmpeg_program: &str,
) -> Result<Vec<u8>, MediaError> {
    let mut args = vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-nostdin".to_owned(),
        "-i".to_owned(),
        path.to_owned(),
        "-vn".to_owned(),
    ];
    if let Some(sample_rate_hz) = options.sample_rate_hz {
        args.push("-ar".to_owned());
        args.push(sample_rate_hz.to_string());
    }
    if let Some(bit_depth) = options.bit_depth {
        let codec = match (options.container, bit_depth) {
            (AudioContainer::Wav, 16) => "pcm_s16le",
            (AudioContainer::Wav, 24) => "pcm_s24le",
            (AudioContainer::Wav, 32) => "pcm_s32le",
            (AudioContainer::Wav, other) => {
                return Err(MediaError::UnsupportedContainer(format!("wav bit depth {other}")));
            }
            (AudioContainer::Mp3, _) => "libmp3lame",
        };
        args.push("-c:a".to_owned());
        args.push(codec.to_owned());
    }
    args.push("-f".to_owned());
    args.push(options.container.ffmpeg_format_name().to_owned());
    args.push("pipe:1".to_owned());

    let output = Command::new(ffmpeg_program)
        .args(&args)
        .output()
        .await
        .map_err(|source| MediaError::Spawn { tool: "ffmpeg", source })?;

    if !output.status.success() {
        return Err(MediaError::ToolFailed {
            tool: "ffmpeg",
            stderr_tail: stderr_tail(&output.stderr),
        });
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_containers_case_insensitively() {
        assert_eq!(AudioContainer::parse("WAV").unwrap(), AudioContainer::Wav);
        assert_eq!(AudioContainer::parse("mp3").unwrap(), AudioContainer::Mp3);
        assert!(AudioContainer::parse("flac").is_err());
    }

    #[tokio::test]
    async fn missing_binary_surfaces_a_spawn_error() {
        let options = ExtractOptions {
            container: AudioContainer::Wav,
            sample_rate_hz: Some(16_000),
            bit_depth: Some(16),
        };
        let result = extract_audio("/tmp/does-not-matter.mp4", &options, "ffmpeg-does-not-exist").await;
        assert!(matches!(result, Err(MediaError::Spawn { tool: "ffmpeg", .. })));
    }
}
