use serde::{Deserialize, Serialize};

use crate::confidence::validation::ValidationReport;
use crate::parsing::models::{clamp_unit, ExtractionBundle, ExtractionSource};
use crate::parsing::sections::{ClassificationResult, SectionType};

/// Sections extracted above this confidence earn a completeness bonus.
const COMPLETENESS_BONUS_ABOVE: f64 = 0.7;
const COMPLETENESS_BONUS: f64 = 0.1;
const LOW_EXTRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub classification: f64,
    pub extraction: f64,
    pub validation: f64,
    pub completeness: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            classification: 0.25,
            extraction: 0.35,
            validation: 0.25,
            completeness: 0.15,
        }
    }
}

impl ScoringWeights {
    /// Rescaled to sum to 1. `None` if any weight is negative or non-finite, or all are zero.
    pub fn normalized(&self) -> Option<Self> {
        let parts = [self.classification, self.extraction, self.validation, self.completeness];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return None;
        }
        let sum: f64 = parts.iter().sum();
        (sum > 0.0).then(|| Self {
            classification: self.classification / sum,
            extraction: self.extraction / sum,
            validation: self.validation / sum,
            completeness: self.completeness / sum,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub classification: f64,
    pub extraction: f64,
    pub validation: f64,
    pub completeness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceDetail {
    pub section: String,
    pub field: String,
    pub score: f64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub overall: f64,
    pub breakdown: ConfidenceBreakdown,
    pub details: Vec<ConfidenceDetail>,
}

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: ScoringWeights,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

impl ConfidenceScorer {
    /// Invalid weights fall back to the defaults.
    pub fn new(weights: ScoringWeights) -> Self {
        let weights = weights.normalized().unwrap_or_else(|| {
            tracing::warn!(?weights, "invalid scoring weights, using defaults");
            ScoringWeights::default()
        });
        Self { weights }
    }

    #[cfg(test)]
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score(
        &self,
        classification: &ClassificationResult,
        bundle: &ExtractionBundle,
        validation: &ValidationReport,
    ) -> ConfidenceScore {
        let breakdown = ConfidenceBreakdown {
            classification: clamp_unit(classification.confidence),
            extraction: clamp_unit(bundle.mean_confidence()),
            validation: clamp_unit(validation.score),
            completeness: completeness(classification, bundle),
        };
        let w = &self.weights;
        let overall = clamp_unit(
            w.classification * breakdown.classification
                + w.extraction * breakdown.extraction
                + w.validation * breakdown.validation
                + w.completeness * breakdown.completeness,
        );

        let mut details = vec![classification_detail(classification)];
        details.extend(extraction_details(bundle));
        details.push(ConfidenceDetail {
            section: "validation".into(),
            field: "checks".into(),
            score: breakdown.validation,
            reason: format!(
                "{} of {} validation checks passed",
                validation.checks.len() - validation.failed().count(),
                validation.checks.len()
            ),
            suggestion: None,
        });
        details.extend(validation.details());
        details.push(ConfidenceDetail {
            section: "completeness".into(),
            field: "sections".into(),
            score: breakdown.completeness,
            reason: format!(
                "{} of {} expected sections present",
                classification.found.len(),
                SectionType::EXPECTED.len()
            ),
            suggestion: None,
        });

        ConfidenceScore {
            overall,
            breakdown,
            details,
        }
    }
}

/// Fraction of expected sections present, plus a bonus per confidently extracted one.
pub fn completeness(classification: &ClassificationResult, bundle: &ExtractionBundle) -> f64 {
    let expected = SectionType::EXPECTED.len() as f64;
    let present = classification.found.len() as f64 / expected;
    let bonus = bundle
        .outcomes()
        .iter()
        .filter(|o| classification.found.contains(&o.section))
        .filter(|o| o.confidence > COMPLETENESS_BONUS_ABOVE)
        .count() as f64
        * COMPLETENESS_BONUS;
    (present + bonus).min(1.0)
}

fn classification_detail(classification: &ClassificationResult) -> ConfidenceDetail {
    let suggestion = (!classification.missing.is_empty()).then(|| {
        let names: Vec<&str> = classification.missing.iter().map(SectionType::as_str).collect();
        format!("Add clear headers for: {}", names.join(", "))
    });
    ConfidenceDetail {
        section: "classification".into(),
        field: "sections".into(),
        score: classification.confidence,
        reason: format!(
            "Located {} of {} expected sections",
            classification.found.len(),
            SectionType::EXPECTED.len()
        ),
        suggestion,
    }
}

fn extraction_details(bundle: &ExtractionBundle) -> Vec<ConfidenceDetail> {
    bundle
        .outcomes()
        .iter()
        .map(|o| ConfidenceDetail {
            section: o.section.as_str().to_string(),
            field: "extraction".into(),
            score: o.confidence,
            reason: match o.source {
                ExtractionSource::Section => "Extracted from its section".to_string(),
                ExtractionSource::FullText => "No section header; searched the whole document".to_string(),
            },
            suggestion: (o.confidence < LOW_EXTRACTION)
                .then(|| format!("Review the {} details", o.section.as_str())),
        })
        .collect()
}
