//! Composite confidence, uncertainty, and the placement decision.

pub mod placement;
pub mod scoring;
pub mod uncertainty;
pub mod validation;

pub use placement::{decide, PlacementDecision, PlacementThresholds};
pub use scoring::{ConfidenceScore, ConfidenceScorer, ScoringWeights};
pub use uncertainty::{UncertaintyDetector, UncertaintyReport};
