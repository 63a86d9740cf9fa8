//! Cross-field validation.
//!
//! A fixed table of checks over the extracted bundle. Each check has a weight and a
//! critical flag; the validation score is the weighted fraction of checks that pass.

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::Serialize;

use crate::confidence::scoring::ConfidenceDetail;
use crate::parsing::models::ExtractionBundle;
use crate::parsing::sections::SectionType;

/// Checks whose confidence falls below this are reported even when they pass.
const LOW_CONFIDENCE: f64 = 0.7;

const MAX_SKILLS: usize = 60;
const EARLIEST_GRADUATION: i32 = 1950;
/// Expected graduation dates may lie a few years ahead.
const FUTURE_GRADUATION_YEARS: i32 = 6;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[A-Za-z]{2,}$").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub confidence: f64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationOutcome {
    fn pass(reason: &str) -> Self {
        Self::pass_with(1.0, reason)
    }

    fn pass_with(confidence: f64, reason: &str) -> Self {
        Self {
            passed: true,
            confidence,
            reason: reason.to_string(),
            suggestion: None,
        }
    }

    fn fail(confidence: f64, reason: &str, suggestion: &str) -> Self {
        Self {
            passed: false,
            confidence,
            reason: reason.to_string(),
            suggestion: Some(suggestion.to_string()),
        }
    }
}

struct Validator {
    section: SectionType,
    field: &'static str,
    weight: f64,
    critical: bool,
    check: fn(&ExtractionBundle) -> ValidationOutcome,
}

const VALIDATORS: &[Validator] = &[
    Validator {
        section: SectionType::Contact,
        field: "email",
        weight: 0.2,
        critical: true,
        check: check_email,
    },
    Validator {
        section: SectionType::Contact,
        field: "phone",
        weight: 0.15,
        critical: false,
        check: check_phone,
    },
    Validator {
        section: SectionType::Contact,
        field: "name",
        weight: 0.2,
        critical: true,
        check: check_name,
    },
    Validator {
        section: SectionType::Experience,
        field: "entries",
        weight: 0.15,
        critical: true,
        check: check_experience_entries,
    },
    Validator {
        section: SectionType::Experience,
        field: "dates",
        weight: 0.1,
        critical: false,
        check: check_experience_dates,
    },
    Validator {
        section: SectionType::Education,
        field: "degree",
        weight: 0.05,
        critical: false,
        check: check_degree,
    },
    Validator {
        section: SectionType::Education,
        field: "institution",
        weight: 0.05,
        critical: false,
        check: check_institution,
    },
    Validator {
        section: SectionType::Education,
        field: "graduationYear",
        weight: 0.05,
        critical: false,
        check: check_graduation_year,
    },
    Validator {
        section: SectionType::Skills,
        field: "count",
        weight: 0.05,
        critical: false,
        check: check_skill_count,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationCheck {
    pub section: SectionType,
    pub field: &'static str,
    pub weight: f64,
    pub critical: bool,
    #[serde(flatten)]
    pub outcome: ValidationOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub score: f64,
    pub checks: Vec<ValidationCheck>,
}

impl ValidationReport {
    pub fn failed(&self) -> impl Iterator<Item = &ValidationCheck> {
        self.checks.iter().filter(|c| !c.outcome.passed)
    }

    pub fn critical_failures(&self) -> impl Iterator<Item = &ValidationCheck> {
        self.failed().filter(|c| c.critical)
    }

    /// One detail per failing or low-confidence check.
    pub fn details(&self) -> Vec<ConfidenceDetail> {
        self.checks
            .iter()
            .filter(|c| !c.outcome.passed || c.outcome.confidence < LOW_CONFIDENCE)
            .map(|c| ConfidenceDetail {
                section: c.section.as_str().to_string(),
                field: c.field.to_string(),
                score: c.outcome.confidence,
                reason: c.outcome.reason.clone(),
                suggestion: c.outcome.suggestion.clone(),
            })
            .collect()
    }
}

pub fn validate(bundle: &ExtractionBundle) -> ValidationReport {
    let checks: Vec<ValidationCheck> = VALIDATORS
        .iter()
        .map(|v| ValidationCheck {
            section: v.section,
            field: v.field,
            weight: v.weight,
            critical: v.critical,
            outcome: (v.check)(bundle),
        })
        .collect();

    let total: f64 = checks.iter().map(|c| c.weight).sum();
    let passed: f64 = checks.iter().filter(|c| c.outcome.passed).map(|c| c.weight).sum();
    let score = if total > 0.0 { passed / total } else { 0.0 };

    ValidationReport { score, checks }
}

fn check_email(bundle: &ExtractionBundle) -> ValidationOutcome {
    let email = bundle.contact.data.email.as_str();
    if email.is_empty() {
        ValidationOutcome::fail(0.0, "No email address found", "Add an email address")
    } else if EMAIL.is_match(email) {
        ValidationOutcome::pass("Email address is well formed")
    } else {
        ValidationOutcome::fail(0.3, "Email address looks malformed", "Check the email address")
    }
}

fn check_phone(bundle: &ExtractionBundle) -> ValidationOutcome {
    let phone = bundle.contact.data.phone.as_str();
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if phone.is_empty() {
        ValidationOutcome::fail(0.0, "No phone number found", "Add a phone number")
    } else if (10..=15).contains(&digits) {
        ValidationOutcome::pass("Phone number has a plausible length")
    } else {
        ValidationOutcome::fail(0.4, "Phone number has an unusual number of digits", "Check the phone number")
    }
}

fn check_name(bundle: &ExtractionBundle) -> ValidationOutcome {
    let contact = &bundle.contact.data;
    match (contact.first_name.is_empty(), contact.last_name.is_empty()) {
        (false, false) => ValidationOutcome::pass("First and last name found"),
        (false, true) | (true, false) => {
            ValidationOutcome::fail(0.4, "Only part of the name was found", "Enter your full name")
        }
        (true, true) => ValidationOutcome::fail(0.0, "No name found", "Enter your full name"),
    }
}

fn check_experience_entries(bundle: &ExtractionBundle) -> ValidationOutcome {
    if bundle.experience.data.is_empty() {
        ValidationOutcome::fail(0.0, "No work experience found", "Add your work history")
    } else {
        ValidationOutcome::pass_with(bundle.experience.confidence, "Work experience entries found")
    }
}

fn check_experience_dates(bundle: &ExtractionBundle) -> ValidationOutcome {
    let entries = &bundle.experience.data;
    if entries.is_empty() {
        return ValidationOutcome::fail(0.0, "No entries to date", "Add your work history");
    }
    let dated = entries.iter().filter(|e| !e.start_date.is_empty()).count();
    let fraction = dated as f64 / entries.len() as f64;
    if dated == entries.len() {
        ValidationOutcome::pass("Every entry has a start date")
    } else {
        ValidationOutcome::fail(fraction, "Some entries have no dates", "Add start and end dates to each position")
    }
}

fn check_degree(bundle: &ExtractionBundle) -> ValidationOutcome {
    let degree = bundle.education.data.degree.as_str();
    if !degree.is_empty() && degree.chars().count() <= 60 {
        ValidationOutcome::pass("Degree found")
    } else {
        ValidationOutcome::fail(0.0, "No degree found", "Add your degree")
    }
}

fn check_institution(bundle: &ExtractionBundle) -> ValidationOutcome {
    let institution = bundle.education.data.institution.as_str();
    let plausible = institution.chars().any(char::is_uppercase) && institution.chars().count() <= 100;
    if plausible {
        ValidationOutcome::pass("Institution found")
    } else {
        ValidationOutcome::fail(0.0, "No institution found", "Add the school or university name")
    }
}

fn check_graduation_year(bundle: &ExtractionBundle) -> ValidationOutcome {
    let latest = Utc::now().year() + FUTURE_GRADUATION_YEARS;
    match bundle.education.data.graduation_year {
        None => ValidationOutcome::fail(0.0, "No graduation year found", "Add your graduation year"),
        Some(year) if (EARLIEST_GRADUATION..=latest).contains(&i32::from(year)) => {
            ValidationOutcome::pass("Graduation year is plausible")
        }
        Some(_) => ValidationOutcome::fail(0.2, "Graduation year is out of range", "Check the graduation year"),
    }
}

fn check_skill_count(bundle: &ExtractionBundle) -> ValidationOutcome {
    match bundle.skills.data.len() {
        0 => ValidationOutcome::fail(0.0, "No skills found", "Add a skills section"),
        n if n <= MAX_SKILLS => ValidationOutcome::pass("Skill count is reasonable"),
        _ => ValidationOutcome::fail(0.5, "Unusually many skills were found", "Trim the skills list"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::resume::{ContactInfo, Education, WorkExperience};
    use crate::parsing::models::{ExtractionResult, ExtractionSource};

    pub(crate) fn complete_bundle() -> ExtractionBundle {
        ExtractionBundle {
            contact: ExtractionResult::new(
                ContactInfo {
                    first_name: "John".into(),
                    last_name: "Smith".into(),
                    email: "john@example.com".into(),
                    phone: "(555) 123-4567".into(),
                    ..Default::default()
                },
                1.0,
                ExtractionSource::Section,
            ),
            experience: ExtractionResult::new(
                vec![WorkExperience {
                    job_title: "Engineer".into(),
                    employer: "Acme".into(),
                    start_date: "2019".into(),
                    ..Default::default()
                }],
                0.8,
                ExtractionSource::Section,
            ),
            education: ExtractionResult::new(
                Education {
                    degree: "BS".into(),
                    institution: "State University".into(),
                    graduation_year: Some(2015),
                    ..Default::default()
                },
                1.0,
                ExtractionSource::Section,
            ),
            skills: ExtractionResult::new(vec!["Rust".into()], 0.05, ExtractionSource::Section),
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = VALIDATORS.iter().map(|v| v.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_complete_bundle_passes_everything() {
        let report = validate(&complete_bundle());
        assert!((report.score - 1.0).abs() < 1e-9);
        assert_eq!(report.failed().count(), 0);
        assert!(report.details().is_empty());
    }

    #[test]
    fn test_missing_email_is_a_critical_failure() {
        let mut bundle = complete_bundle();
        bundle.contact.data.email.clear();
        let report = validate(&bundle);
        assert!((report.score - 0.8).abs() < 1e-9);
        let critical: Vec<_> = report.critical_failures().map(|c| c.field).collect();
        assert_eq!(critical, vec!["email"]);
        let details = report.details();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].section, "contact");
        assert_eq!(details[0].suggestion.as_deref(), Some("Add an email address"));
    }

    #[test]
    fn test_malformed_values() {
        let mut bundle = complete_bundle();
        bundle.contact.data.email = "john at example".into();
        bundle.contact.data.phone = "12345".into();
        bundle.education.data.graduation_year = Some(2150);
        let report = validate(&bundle);
        let failed: Vec<_> = report.failed().map(|c| (c.field, c.outcome.confidence)).collect();
        assert_eq!(failed, vec![("email", 0.3), ("phone", 0.4), ("graduationYear", 0.2)]);
    }

    #[test]
    fn test_low_confidence_pass_is_reported() {
        let mut bundle = complete_bundle();
        bundle.experience.confidence = 0.5;
        let details = validate(&bundle).details();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].field, "entries");
        assert_eq!(details[0].score, 0.5);
    }
}
