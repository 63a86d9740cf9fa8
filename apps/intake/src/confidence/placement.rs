//! Three-way placement verdict: auto-place, auto-place with review, manual review.

use serde::{Deserialize, Serialize};

use crate::confidence::uncertainty::UncertainField;
use crate::parsing::models::clamp_unit;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementThresholds {
    pub auto_placement: f64,
    pub acceptable_quality: f64,
    pub manual_review: f64,
    /// Uncertain fields below this get a manual-entry alternative.
    pub alternative: f64,
    pub max_uncertain_for_review: usize,
}

impl Default for PlacementThresholds {
    fn default() -> Self {
        Self {
            auto_placement: 0.8,
            acceptable_quality: 0.6,
            manual_review: 0.5,
            alternative: 0.3,
            max_uncertain_for_review: 2,
        }
    }
}

impl PlacementThresholds {
    pub fn clamped(self) -> Self {
        Self {
            auto_placement: clamp_unit(self.auto_placement),
            acceptable_quality: clamp_unit(self.acceptable_quality),
            manual_review: clamp_unit(self.manual_review),
            alternative: clamp_unit(self.alternative),
            max_uncertain_for_review: self.max_uncertain_for_review,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementAlternative {
    pub section: String,
    pub field: String,
    pub confidence: f64,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementDecision {
    pub should_auto_place: bool,
    pub requires_review: bool,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<PlacementAlternative>,
}

pub fn decide(
    overall: f64,
    uncertain: &[UncertainField],
    thresholds: &PlacementThresholds,
) -> PlacementDecision {
    let confidence = clamp_unit(overall);
    let count = uncertain.len();
    let pct = (confidence * 100.0).round();

    if confidence >= thresholds.auto_placement && count == 0 {
        return PlacementDecision {
            should_auto_place: true,
            requires_review: false,
            confidence,
            reasoning: format!("High confidence ({pct}%) with no uncertain fields"),
            alternatives: Vec::new(),
        };
    }
    if confidence >= thresholds.acceptable_quality && count <= thresholds.max_uncertain_for_review {
        return PlacementDecision {
            should_auto_place: true,
            requires_review: true,
            confidence,
            reasoning: format!("Acceptable confidence ({pct}%) with {count} uncertain field(s); review recommended"),
            alternatives: Vec::new(),
        };
    }
    if confidence >= thresholds.manual_review {
        return PlacementDecision {
            should_auto_place: false,
            requires_review: true,
            confidence,
            reasoning: format!("Moderate confidence ({pct}%) with {count} uncertain field(s); review required"),
            alternatives: Vec::new(),
        };
    }

    let alternatives = uncertain
        .iter()
        .filter(|f| f.confidence < thresholds.alternative)
        .map(|f| PlacementAlternative {
            section: f.section.clone(),
            field: f.field.clone(),
            confidence: f.confidence,
            suggestion: format!("Enter {} manually", f.field),
        })
        .collect();
    PlacementDecision {
        should_auto_place: false,
        requires_review: true,
        confidence,
        reasoning: format!("Low confidence ({pct}%); extensive manual review needed"),
        alternatives,
    }
}
