use serde::{Deserialize, Serialize};

use crate::models::resume::{ContactInfo, Education, WorkExperience};
use crate::parsing::sections::SectionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionSource {
    /// Extracted from the classified section span.
    Section,
    /// No span was found; the whole document was searched.
    FullText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub field: String,
    pub message: String,
}

impl ExtractionWarning {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult<T> {
    pub data: T,
    /// Always within [0, 1].
    pub confidence: f64,
    pub source: ExtractionSource,
    pub warnings: Vec<ExtractionWarning>,
}

impl<T> ExtractionResult<T> {
    pub fn new(data: T, confidence: f64, source: ExtractionSource) -> Self {
        Self {
            data,
            confidence: clamp_unit(confidence),
            source,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.push(ExtractionWarning::new(field, message));
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// The four per-section extraction results of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionBundle {
    pub contact: ExtractionResult<ContactInfo>,
    pub experience: ExtractionResult<Vec<WorkExperience>>,
    pub education: ExtractionResult<Education>,
    pub skills: ExtractionResult<Vec<String>>,
}

/// Borrowed, type-erased view of one section's result.
#[derive(Debug, Clone, Copy)]
pub struct SectionOutcome<'a> {
    pub section: SectionType,
    pub confidence: f64,
    pub source: ExtractionSource,
    pub warnings: &'a [ExtractionWarning],
}

impl ExtractionBundle {
    pub fn outcomes(&self) -> [SectionOutcome<'_>; 4] {
        [
            SectionOutcome {
                section: SectionType::Contact,
                confidence: self.contact.confidence,
                source: self.contact.source,
                warnings: &self.contact.warnings,
            },
            SectionOutcome {
                section: SectionType::Experience,
                confidence: self.experience.confidence,
                source: self.experience.source,
                warnings: &self.experience.warnings,
            },
            SectionOutcome {
                section: SectionType::Education,
                confidence: self.education.confidence,
                source: self.education.source,
                warnings: &self.education.warnings,
            },
            SectionOutcome {
                section: SectionType::Skills,
                confidence: self.skills.confidence,
                source: self.skills.source,
                warnings: &self.skills.warnings,
            },
        ]
    }

    pub fn mean_confidence(&self) -> f64 {
        let outcomes = self.outcomes();
        outcomes.iter().map(|o| o.confidence).sum::<f64>() / outcomes.len() as f64
    }
}
