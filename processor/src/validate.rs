use gateway_model::DecodeOptions;
use gateway_model::Temperature;

/// Semantic validation of an already-well-typed [`DecodeOptions`]. Unknown keys are already rejected at intake by serde's
/// `deny_unknown_fields`; this catches the handful of value-range
/// constraints a type alone can't express.
pub fn validate_decode_options(options: &DecodeOptions) -> Result<(), String> {
    if let Some(temperature) = &options.temperature {
        let values: Vec<f64> = match temperature {
            Temperature::Scalar(value) => vec![*value],
            Temperature::Fallbacks(values) => values.clone(),
        };
        if values.is_empty() {
            return Err("temperature fallback list must not be empty".to_owned());
        }
        if values.iter().any(|value| !(0.0..=1.0).contains(value)) {
            return Err("temperature values must fall within [0.0, 1.0]".to_owned());
        }
    }
    if let Some(clip_timestamps) = &options.clip_timestamps {
        if clip_timestamps.len() % 2 != 0 {
            return Err("clip_timestamps must be an even-length list of [start, end] pairs".to_owned());
        }
        for pair in clip_timestamps.chunks(2) {
            if pair[0] > pair[1] {
                return Err("clip_timestamps pairs must be ordered start <= end".to_owned());
            }
        }
    }
    if let Some(threshold) = options.no_speech_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err("no_speech_threshold must fall within [0.0, 1.0]".to_owned());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_defaults() {
        assert_eq!(validate_decode_options(&DecodeOptions::default()), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let options = DecodeOptions {
            temperature: Some(Temperature::Scalar(1.5)),
            ..Default::default()
        };
        assert!(validate_decode_options(&options).is_err());
    }

    #[test]
    fn rejects_odd_length_clip_timestamps() {
        let options = DecodeOptions {
            clip_timestamps: Some(vec![0.0, 1.0, 2.0]),
            ..Default::default()
        };
        assert!(validate_decode_options(&options).is_err());
    }

    #[test]
    fn rejects_inverted_clip_timestamp_pairs() {
        let options = DecodeOptions {
            clip_timestamps: Some(vec![5.0, 1.0]),
            ..Default::default()
        };
        assert!(validate_decode_options(&options).is_err());
    }
}
