//! Recognition settings.
//!
//! Settings arrive from the configuration layer as plain key/value strings.
//! An update is validated as a whole: if any field is rejected, the previous
//! settings stay in effect and every failing field is reported.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result, WhiskerError};
use crate::matcher::MatchParams;

pub const KEY_THRESHOLD: &str = "threshold";
pub const KEY_MAX_RESULTS: &str = "max_results";
pub const KEY_MAX_HAMMING: &str = "max_hamming";
pub const KEY_MODEL_PATH: &str = "model_path";
pub const KEY_HASH_LENGTH: &str = "hash_length_override";

/// Environment variables read by [`RecognitionSettings::from_env`].
const ENV_KEYS: [(&str, &str); 5] = [
    ("WHISKER_THRESHOLD", KEY_THRESHOLD),
    ("WHISKER_MAX_RESULTS", KEY_MAX_RESULTS),
    ("WHISKER_MAX_HAMMING", KEY_MAX_HAMMING),
    ("WHISKER_MODEL_PATH", KEY_MODEL_PATH),
    ("WHISKER_HASH_LENGTH", KEY_HASH_LENGTH),
];

/// Parameters for matching and signature derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionSettings {
    /// Minimum cosine similarity for a confirmed match (default: 0.75)
    pub threshold: f32,
    /// Maximum confirmed matches returned (default: 5)
    pub max_results: usize,
    /// Hamming pre-filter; `None` disables it (default)
    pub max_hamming: Option<u32>,
    /// Custom feature extractor weights (default: none, use the baseline)
    pub model_path: Option<PathBuf>,
    /// Number of embedding dimensions hashed (default: all)
    pub hash_length_override: Option<usize>,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            max_results: 5,
            max_hamming: None,
            model_path: None,
            hash_length_override: None,
        }
    }
}

/// What an accepted settings update changed beyond the matching parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsChange {
    /// `model_path` was set, changed, or cleared
    pub model_changed: bool,
    /// Stored hashes were derived under a different hash length or model and
    /// reference images should be reprocessed
    pub reprocess_required: bool,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        !self.model_changed && !self.reprocess_required
    }
}

impl RecognitionSettings {
    /// Load settings from `WHISKER_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        let pairs: Vec<(&str, String)> = ENV_KEYS
            .iter()
            .filter_map(|(var, key)| std::env::var(var).ok().map(|value| (*key, value)))
            .collect();

        let mut settings = Self::default();
        settings.apply(pairs)?;
        Ok(settings)
    }

    /// Parameters consumed by the matcher.
    pub fn match_params(&self) -> MatchParams {
        MatchParams {
            threshold: self.threshold,
            max_results: self.max_results,
            max_hamming: self.max_hamming,
        }
    }

    /// Validate this settings object as a whole.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            errors.push(FieldError::new(KEY_THRESHOLD, "must be between 0 and 1 (exclusive)"));
        }
        if self.max_results == 0 {
            errors.push(FieldError::new(KEY_MAX_RESULTS, "must be a positive integer"));
        }
        if self.model_path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            errors.push(FieldError::new(KEY_MODEL_PATH, "must not be empty"));
        }
        if self.hash_length_override == Some(0) {
            errors.push(FieldError::new(KEY_HASH_LENGTH, "must be a positive integer"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WhiskerError::InvalidSettings(errors))
        }
    }

    /// Produce the settings that would result from applying `updates`,
    /// without modifying `self`.
    ///
    /// An empty value clears an optional field. Unknown keys are rejected.
    pub fn with_updates<I, K, V>(&self, updates: I) -> Result<(Self, SettingsChange)>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut next = self.clone();
        let mut errors = Vec::new();

        for (key, value) in updates {
            let key = key.as_ref().trim();
            let value = value.as_ref().trim();
            let parsed = match key {
                KEY_THRESHOLD => parse_threshold(value).map(|v| next.threshold = v),
                KEY_MAX_RESULTS => parse_positive(value).map(|v| next.max_results = v),
                KEY_MAX_HAMMING => parse_optional(value, parse_non_negative)
                    .map(|v| next.max_hamming = v),
                KEY_MODEL_PATH => {
                    next.model_path = (!value.is_empty()).then(|| PathBuf::from(value));
                    Ok(())
                }
                KEY_HASH_LENGTH => {
                    parse_optional(value, parse_positive).map(|v| next.hash_length_override = v)
                }
                _ => Err("unknown setting".to_string()),
            };

            if let Err(reason) = parsed {
                errors.push(FieldError::new(key, reason));
            }
        }

        if !errors.is_empty() {
            return Err(WhiskerError::InvalidSettings(errors));
        }
        next.validate()?;

        let model_changed = next.model_path != self.model_path;
        let change = SettingsChange {
            model_changed,
            reprocess_required: model_changed
                || next.hash_length_override != self.hash_length_override,
        };
        Ok((next, change))
    }

    /// Apply key/value updates in place. On error `self` is left untouched.
    pub fn apply<I, K, V>(&mut self, updates: I) -> Result<SettingsChange>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let (next, change) = self.with_updates(updates)?;
        *self = next;
        Ok(change)
    }
}

fn parse_threshold(value: &str) -> std::result::Result<f32, String> {
    let threshold: f32 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if threshold > 0.0 && threshold < 1.0 {
        Ok(threshold)
    } else {
        Err("must be between 0 and 1 (exclusive)".to_string())
    }
}

fn parse_positive(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err("must be a positive integer".to_string()),
    }
}

fn parse_non_negative(value: &str) -> std::result::Result<u32, String> {
    value
        .parse::<u32>()
        .map_err(|_| "must be a non-negative integer".to_string())
}

fn parse_optional<T>(
    value: &str,
    parse: fn(&str) -> std::result::Result<T, String>,
) -> std::result::Result<Option<T>, String> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse(value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = RecognitionSettings::default();
        assert_eq!(settings.threshold, 0.75);
        assert_eq!(settings.max_results, 5);
        assert_eq!(settings.max_hamming, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_apply_valid_updates() {
        let mut settings = RecognitionSettings::default();
        let change = settings
            .apply([
                ("threshold", "0.8"),
                ("max_results", "3"),
                ("max_hamming", "120"),
            ])
            .unwrap();

        assert!(change.is_empty());
        assert_eq!(settings.threshold, 0.8);
        assert_eq!(settings.max_results, 3);
        assert_eq!(settings.max_hamming, Some(120));
    }

    #[test]
    fn test_apply_rejects_and_keeps_previous() {
        let mut settings = RecognitionSettings::default();
        let err = settings
            .apply([
                ("threshold", "1.0"),
                ("max_results", "0"),
                ("max_hamming", "-3"),
                ("hash_length_override", "abc"),
            ])
            .unwrap_err();

        assert_eq!(
            err.invalid_fields(),
            vec!["threshold", "max_results", "max_hamming", "hash_length_override"]
        );
        assert_eq!(settings, RecognitionSettings::default());
    }

    #[test]
    fn test_partial_failure_changes_nothing() {
        let mut settings = RecognitionSettings::default();
        let err = settings
            .apply([("max_results", "9"), ("threshold", "zero")])
            .unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["threshold"]);
        assert_eq!(settings.max_results, 5);
    }

    #[test]
    fn test_threshold_bounds_are_exclusive() {
        let mut settings = RecognitionSettings::default();
        assert!(settings.apply([("threshold", "0")]).is_err());
        assert!(settings.apply([("threshold", "1")]).is_err());
        assert!(settings.apply([("threshold", "NaN")]).is_err());
        assert!(settings.apply([("threshold", "0.0001")]).is_ok());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut settings = RecognitionSettings::default();
        let err = settings.apply([("colour", "tabby")]).unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["colour"]);
    }

    #[test]
    fn test_empty_value_clears_optional_fields() {
        let mut settings = RecognitionSettings {
            max_hamming: Some(10),
            hash_length_override: Some(128),
            model_path: Some(PathBuf::from("weights.onnx")),
            ..Default::default()
        };

        let change = settings
            .apply([("max_hamming", ""), ("hash_length_override", ""), ("model_path", "")])
            .unwrap();

        assert_eq!(settings.max_hamming, None);
        assert_eq!(settings.hash_length_override, None);
        assert_eq!(settings.model_path, None);
        assert!(change.model_changed);
        assert!(change.reprocess_required);
    }

    #[test]
    fn test_empty_value_rejected_for_required_fields() {
        let mut settings = RecognitionSettings::default();
        let err = settings.apply([("threshold", ""), ("max_results", "")]).unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["threshold", "max_results"]);
    }

    #[test]
    fn test_hash_length_change_requires_reprocessing() {
        let mut settings = RecognitionSettings::default();
        let change = settings.apply([("hash_length_override", "256")]).unwrap();
        assert!(!change.model_changed);
        assert!(change.reprocess_required);

        let unchanged = settings.apply([("hash_length_override", "256")]).unwrap();
        assert!(unchanged.is_empty());
    }

    #[test]
    fn test_hash_length_zero_rejected() {
        let mut settings = RecognitionSettings::default();
        let err = settings.apply([("hash_length_override", "0")]).unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["hash_length_override"]);
    }

    #[test]
    fn test_match_params() {
        let settings = RecognitionSettings {
            threshold: 0.6,
            max_results: 2,
            max_hamming: Some(40),
            ..Default::default()
        };
        let params = settings.match_params();
        assert_eq!(params.threshold, 0.6);
        assert_eq!(params.max_results, 2);
        assert_eq!(params.max_hamming, Some(40));
    }

    #[test]
    fn test_validate_catches_direct_construction() {
        let settings = RecognitionSettings {
            threshold: 1.5,
            ..Default::default()
        };
        assert_eq!(settings.validate().unwrap_err().invalid_fields(), vec!["threshold"]);
    }
}
