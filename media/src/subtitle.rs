use gateway_model::TranscriptResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::Vtt),
            _ => None,
        }
    }
}

fn format_timestamp(seconds: f64, comma_millis_separator: bool) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as i64;
    let millis = total_millis % 1000;
    let total_seconds = total_millis / 1000;
    let secs = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let minutes = total_minutes % 60;
    let hours = total_minutes / 60;
    let separator = if comma_millis_separator { ',' } else { '.' };
    format!("{hours:02}:{minutes:02}:{secs:02}{separator}{millis:03}")
}

/// Renders a completed transcript's segments to SRT or WebVTT.
pub fn render_subtitle(result: &TranscriptResult, format: SubtitleFormat) -> String {
    let mut out = String::new();
    if format == SubtitleFormat::Vtt {
        out.push_str("WEBVTT\n\n");
    }
    for (index, segment) in result.segments.iter().enumerate() {
        let comma = format == SubtitleFormat::Srt;
        if format == SubtitleFormat::Srt {
            out.push_str(&format!("{}\n", index + 1));
        }
        out.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(segment.start, comma),
            format_timestamp(segment.end, comma)
        ));
        out.push_str(segment.text.trim());
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_model::Segment;
    use pretty_assertions::assert_eq;

    fn sample() -> TranscriptResult {
        TranscriptResult {
            text: "hello world".into(),
            segments: vec![
                Segment { id: 0, start: 0.0, end: 1.5, text: "hello".into(), extra: serde_json::json!({}) },
                Segment { id: 1, start: 1.5, end: 3.125, text: "world".into(), extra: serde_json::json!({}) },
            ],
            info: serde_json::json!({}),
        }
    }

    #[test]
    fn renders_srt_with_comma_millis() {
        let srt = render_subtitle(&sample(), SubtitleFormat::Srt);
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,500\nhello\n\n2\n00:00:01,500 --> 00:00:03,125\nworld\n\n"
        );
    }

    #[test]
    fn renders_vtt_with_dot_millis_and_header() {
        let vtt = render_subtitle(&sample(), SubtitleFormat::Vtt);
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:01.500\nhello\n\n"));
    }

    #[test]
    fn format_parses_case_insensitively_and_rejects_unknown() {
        assert_eq!(SubtitleFormat::parse("SRT"), Some(SubtitleFormat::Srt));
        assert_eq!(SubtitleFormat::parse("vtt"), Some(SubtitleFormat::Vtt));
        assert_eq!(SubtitleFormat::parse("ass"), None);
    }
}
