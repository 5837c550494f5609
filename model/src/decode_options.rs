use serde::Deserialize;
use serde::Serialize;

/// `temperature` may be a single fallback value or an ordered list of
/// fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Temperature {
    Scalar(f64),
    Fallbacks(Vec<f64>),
}

/// The enumerated decode-options set accepted at intake. `deny_unknown_fields`
/// realizes "unknown keys rejected at intake" as a parse-time check rather
/// than a hand-rolled allowlist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DecodeOptions {
    pub language: Option<String>,
    pub temperature: Option<Temperature>,
    pub compression_ratio_threshold: Option<f64>,
    pub no_speech_threshold: Option<f64>,
    pub condition_on_previous_text: Option<bool>,
    pub initial_prompt: Option<String>,
    pub word_timestamps: Option<bool>,
    pub prepend_punctuations: Option<String>,
    pub append_punctuations: Option<String>,
    pub clip_timestamps: Option<Vec<f64>>,
    pub hallucination_silence_threshold: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_unknown_keys() {
        let raw = serde_json::json!({"language": "en", "bogus": true});
        let err = serde_json::from_value::<DecodeOptions>(raw).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn accepts_scalar_or_list_temperature() {
        let scalar: DecodeOptions =
            serde_json::from_value(serde_json::json!({"temperature": 0.8})).unwrap();
        assert_eq!(scalar.temperature, Some(Temperature::Scalar(0.8)));

        let list: DecodeOptions =
            serde_json::from_value(serde_json::json!({"temperature": [0.8, 1.0]})).unwrap();
        assert_eq!(
            list.temperature,
            Some(Temperature::Fallbacks(vec![0.8, 1.0]))
        );
    }

    #[test]
    fn empty_object_parses_to_defaults() {
        let opts: DecodeOptions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(opts, DecodeOptions::default());
    }
}
