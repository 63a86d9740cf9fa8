use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::confidence::{PlacementThresholds, ScoringWeights};
use crate::diagnostics::context::DEFAULT_LOG_CAPACITY;
use crate::pipeline::{ParseOptions, PipelineSettings};

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub defaults: ParseOptions,
    pub retry_base_delay_ms: u64,
    pub tesseract_path: String,
    pub pdftoppm_path: String,
    pub log_buffer_capacity: usize,
    pub weights: ScoringWeights,
    pub thresholds: PlacementThresholds,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base = ParseOptions::default();
        let base_weights = ScoringWeights::default();
        let base_thresholds = PlacementThresholds::default();

        let defaults = ParseOptions {
            timeout_ms: parse_or(&lookup, "PARSER_TIMEOUT_MS", base.timeout_ms)?,
            max_file_size_bytes: parse_or(
                &lookup,
                "PARSER_MAX_FILE_SIZE_BYTES",
                base.max_file_size_bytes,
            )?,
            enable_ocr: bool_or(&lookup, "PARSER_ENABLE_OCR", base.enable_ocr)?,
            ocr_language: lookup("PARSER_OCR_LANGUAGE").unwrap_or(base.ocr_language),
            strict_validation: bool_or(
                &lookup,
                "PARSER_STRICT_VALIDATION",
                base.strict_validation,
            )?,
            retry_attempts: parse_or(&lookup, "PARSER_RETRY_ATTEMPTS", base.retry_attempts)?,
        };
        if defaults.timeout_ms == 0 {
            bail!("PARSER_TIMEOUT_MS must be greater than zero");
        }

        let weights = ScoringWeights {
            classification: parse_or(
                &lookup,
                "SCORE_WEIGHT_CLASSIFICATION",
                base_weights.classification,
            )?,
            extraction: parse_or(&lookup, "SCORE_WEIGHT_EXTRACTION", base_weights.extraction)?,
            validation: parse_or(&lookup, "SCORE_WEIGHT_VALIDATION", base_weights.validation)?,
            completeness: parse_or(
                &lookup,
                "SCORE_WEIGHT_COMPLETENESS",
                base_weights.completeness,
            )?,
        };
        let weights = weights.normalized().with_context(|| {
            format!("SCORE_WEIGHT_* must be non-negative with a positive sum, got {weights:?}")
        })?;

        let thresholds = PlacementThresholds {
            auto_placement: parse_or(
                &lookup,
                "PLACEMENT_AUTO_THRESHOLD",
                base_thresholds.auto_placement,
            )?,
            acceptable_quality: parse_or(
                &lookup,
                "PLACEMENT_ACCEPTABLE_THRESHOLD",
                base_thresholds.acceptable_quality,
            )?,
            manual_review: parse_or(
                &lookup,
                "PLACEMENT_MANUAL_REVIEW_THRESHOLD",
                base_thresholds.manual_review,
            )?,
            alternative: parse_or(
                &lookup,
                "PLACEMENT_ALTERNATIVE_THRESHOLD",
                base_thresholds.alternative,
            )?,
            ..base_thresholds
        }
        .clamped();

        Ok(Config {
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            defaults,
            retry_base_delay_ms: parse_or(&lookup, "PARSER_RETRY_BASE_DELAY_MS", 500)?,
            tesseract_path: lookup("TESSERACT_PATH").unwrap_or_else(|| "tesseract".to_string()),
            pdftoppm_path: lookup("PDFTOPPM_PATH").unwrap_or_else(|| "pdftoppm".to_string()),
            log_buffer_capacity: parse_or(&lookup, "LOG_BUFFER_CAPACITY", DEFAULT_LOG_CAPACITY)?,
            weights,
            thresholds,
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            defaults: self.defaults.clone(),
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            log_capacity: self.log_buffer_capacity,
            weights: self.weights,
            thresholds: self.thresholds,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn bool_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match lookup(key).map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(raw) => match raw.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("{key} must be a boolean, got '{raw}'"),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.defaults, ParseOptions::default());
        assert_eq!(config.log_buffer_capacity, 500);
        assert_eq!(config.tesseract_path, "tesseract");
        assert_eq!(config.thresholds, PlacementThresholds::default());
        let settings = config.pipeline_settings();
        assert_eq!(settings.retry_base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("PARSER_ENABLE_OCR", "off"),
            ("PARSER_STRICT_VALIDATION", "TRUE"),
            ("PARSER_RETRY_ATTEMPTS", "4"),
            ("PARSER_OCR_LANGUAGE", "deu"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(!config.defaults.enable_ocr);
        assert!(config.defaults.strict_validation);
        assert_eq!(config.defaults.retry_attempts, 4);
        assert_eq!(config.defaults.ocr_language, "deu");
    }

    #[test]
    fn test_weights_are_normalized() {
        let config = config_from(&[
            ("SCORE_WEIGHT_CLASSIFICATION", "1"),
            ("SCORE_WEIGHT_EXTRACTION", "1"),
            ("SCORE_WEIGHT_VALIDATION", "1"),
            ("SCORE_WEIGHT_COMPLETENESS", "1"),
        ])
        .unwrap();
        assert!((config.weights.extraction - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_values_fail_startup() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("PARSER_ENABLE_OCR", "maybe")]).is_err());
        assert!(config_from(&[("SCORE_WEIGHT_EXTRACTION", "-1")]).is_err());
        assert!(config_from(&[
            ("SCORE_WEIGHT_CLASSIFICATION", "0"),
            ("SCORE_WEIGHT_EXTRACTION", "0"),
            ("SCORE_WEIGHT_VALIDATION", "0"),
            ("SCORE_WEIGHT_COMPLETENESS", "0"),
        ])
        .is_err());
    }

    #[test]
    fn test_thresholds_are_clamped() {
        let config = config_from(&[("PLACEMENT_AUTO_THRESHOLD", "1.7")]).unwrap();
        assert_eq!(config.thresholds.auto_placement, 1.0);
    }
}
