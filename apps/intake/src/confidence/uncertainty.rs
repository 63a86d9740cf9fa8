//! Collects the fields a reviewer should look at.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::confidence::placement::PlacementThresholds;
use crate::confidence::scoring::ConfidenceScore;
use crate::confidence::validation::ValidationReport;
use crate::parsing::models::ExtractionBundle;

const MAX_UNCERTAIN_FOR_MANUAL: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertainField {
    pub section: String,
    pub field: String,
    pub confidence: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UncertaintyReport {
    pub fields: Vec<UncertainField>,
    pub recommend_manual_review: bool,
    pub auto_placement_safe: bool,
}

pub struct UncertaintyDetector {
    /// Overall scores below this need review; so do extractions and details below it.
    manual_review_below: f64,
    auto_placement_from: f64,
}

impl UncertaintyDetector {
    pub fn new(thresholds: &PlacementThresholds) -> Self {
        Self {
            manual_review_below: thresholds.manual_review,
            auto_placement_from: thresholds.auto_placement,
        }
    }

    pub fn detect(
        &self,
        bundle: &ExtractionBundle,
        validation: &ValidationReport,
        score: &ConfidenceScore,
    ) -> UncertaintyReport {
        let mut fields = Vec::new();

        for outcome in bundle.outcomes() {
            let section = outcome.section.as_str();
            if outcome.confidence < self.manual_review_below {
                fields.push(UncertainField {
                    section: section.to_string(),
                    field: "section".into(),
                    confidence: outcome.confidence,
                    reason: format!("Low extraction confidence for {section}"),
                    alternatives: Vec::new(),
                    suggestion: format!("Review the {section} details"),
                });
            }
            for warning in outcome.warnings {
                fields.push(UncertainField {
                    section: section.to_string(),
                    field: warning.field.clone(),
                    confidence: 0.0,
                    reason: warning.message.clone(),
                    alternatives: Vec::new(),
                    suggestion: "Enter this value manually".into(),
                });
            }
        }

        for check in validation.failed() {
            fields.push(UncertainField {
                section: check.section.as_str().to_string(),
                field: check.field.to_string(),
                confidence: check.outcome.confidence,
                reason: check.outcome.reason.clone(),
                alternatives: Vec::new(),
                suggestion: check
                    .outcome
                    .suggestion
                    .clone()
                    .unwrap_or_else(|| "Review this value".into()),
            });
        }

        for detail in score.details.iter().filter(|d| d.score < self.manual_review_below) {
            fields.push(UncertainField {
                section: detail.section.clone(),
                field: detail.field.clone(),
                confidence: detail.score,
                reason: detail.reason.clone(),
                alternatives: Vec::new(),
                suggestion: detail
                    .suggestion
                    .clone()
                    .unwrap_or_else(|| "Review this value".into()),
            });
        }

        let fields = dedup(fields);
        UncertaintyReport {
            recommend_manual_review: score.overall < self.manual_review_below
                || fields.len() > MAX_UNCERTAIN_FOR_MANUAL,
            auto_placement_safe: score.overall >= self.auto_placement_from && fields.is_empty(),
            fields,
        }
    }
}

/// Keeps the first occurrence per (section, field).
fn dedup(fields: Vec<UncertainField>) -> Vec<UncertainField> {
    let mut seen = HashSet::new();
    fields
        .into_iter()
        .filter(|f| seen.insert((f.section.clone(), f.field.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::scoring::{ConfidenceBreakdown, ConfidenceDetail};
    use crate::confidence::validation::tests::complete_bundle;
    use crate::confidence::validation::validate;

    fn score(overall: f64, details: Vec<ConfidenceDetail>) -> ConfidenceScore {
        ConfidenceScore {
            overall,
            breakdown: ConfidenceBreakdown {
                classification: overall,
                extraction: overall,
                validation: overall,
                completeness: overall,
            },
            details,
        }
    }

    fn detector() -> UncertaintyDetector {
        UncertaintyDetector::new(&PlacementThresholds::default())
    }

    #[test]
    fn test_clean_bundle_has_no_uncertainty() {
        let mut bundle = complete_bundle();
        bundle.skills.confidence = 0.9;
        let validation = validate(&bundle);
        let report = detector().detect(&bundle, &validation, &score(0.85, Vec::new()));
        assert!(report.fields.is_empty());
        assert!(report.auto_placement_safe);
        assert!(!report.recommend_manual_review);
    }

    #[test]
    fn test_sources_are_merged_and_deduplicated() {
        let mut bundle = complete_bundle();
        bundle.skills.confidence = 0.9;
        bundle.contact.data.email.clear();
        bundle.contact.warn("email", "No email address found");
        let validation = validate(&bundle);
        let details = vec![ConfidenceDetail {
            section: "contact".into(),
            field: "email".into(),
            score: 0.0,
            reason: "No email address found".into(),
            suggestion: None,
        }];
        let report = detector().detect(&bundle, &validation, &score(0.7, details));
        assert_eq!(report.fields.len(), 1);
        let field = &report.fields[0];
        assert_eq!((field.section.as_str(), field.field.as_str()), ("contact", "email"));
        assert_eq!(field.suggestion, "Enter this value manually");
        assert!(!report.auto_placement_safe);
    }

    #[test]
    fn test_many_uncertain_fields_recommend_manual_review() {
        let mut bundle = complete_bundle();
        bundle.skills.confidence = 0.9;
        for field in ["a", "b", "c", "d"] {
            bundle.experience.warn(field, "unclear");
        }
        let validation = validate(&bundle);
        let report = detector().detect(&bundle, &validation, &score(0.9, Vec::new()));
        assert_eq!(report.fields.len(), 4);
        assert!(report.recommend_manual_review);
    }

    #[test]
    fn test_low_overall_recommends_manual_review() {
        let mut bundle = complete_bundle();
        bundle.skills.confidence = 0.9;
        let validation = validate(&bundle);
        let report = detector().detect(&bundle, &validation, &score(0.4, Vec::new()));
        assert!(report.fields.is_empty());
        assert!(report.recommend_manual_review);
    }

    #[test]
    fn test_flagging_follows_the_manual_review_threshold() {
        let mut bundle = complete_bundle();
        bundle.skills.confidence = 0.9;
        let validation = validate(&bundle);
        let overall = score(0.95, Vec::new());

        let default_report = detector().detect(&bundle, &validation, &overall);
        assert!(default_report.fields.is_empty());

        let strict = UncertaintyDetector::new(&PlacementThresholds {
            manual_review: 0.85,
            ..PlacementThresholds::default()
        });
        let report = strict.detect(&bundle, &validation, &overall);
        assert_eq!(report.fields.len(), 1);
        assert_eq!(report.fields[0].section, "experience");
        assert_eq!(report.fields[0].field, "section");
    }
}
