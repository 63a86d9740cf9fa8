//! Text normalization, section classification, and per-section field extraction.

pub mod contact;
pub mod education;
pub mod experience;
pub mod models;
pub mod normalize;
pub mod rules;
pub mod sections;
pub mod skills;
pub mod summary;

use crate::parsing::models::ExtractionBundle;
use crate::parsing::normalize::NormalizedText;
use crate::parsing::sections::{ClassificationResult, SectionType};

/// Runs the four section extractors. Each reads its own span when classified and
/// falls back to the whole document otherwise.
pub fn extract_all(doc: &NormalizedText, classification: &ClassificationResult) -> ExtractionBundle {
    let span = |section: SectionType| classification.sections.get(&section);
    ExtractionBundle {
        contact: contact::extract_contact(&doc.text, span(SectionType::Contact)),
        experience: experience::extract_experience(&doc.text, span(SectionType::Experience)),
        education: education::extract_education(&doc.text, span(SectionType::Education)),
        skills: skills::extract_skills(&doc.text, span(SectionType::Skills)),
    }
}
