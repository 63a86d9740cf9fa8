//! Section classification.
//!
//! Each section type has an ordered list of header patterns, tested against a cleaned,
//! lowercased copy of every short line. Types claim their header in a fixed order so a
//! line like "Skills & Experience" cannot be claimed twice. A section ends where the
//! next located section begins.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Lines longer than this are never headers.
const MAX_HEADER_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Contact,
    Summary,
    Experience,
    Education,
    Skills,
}

impl SectionType {
    /// Sections whose absence lowers classification confidence and completeness.
    pub const EXPECTED: [SectionType; 4] = [
        SectionType::Contact,
        SectionType::Experience,
        SectionType::Education,
        SectionType::Skills,
    ];

    /// Order in which types claim header lines.
    const CLAIM_ORDER: [SectionType; 5] = [
        SectionType::Experience,
        SectionType::Education,
        SectionType::Skills,
        SectionType::Summary,
        SectionType::Contact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Contact => "contact",
            SectionType::Summary => "summary",
            SectionType::Experience => "experience",
            SectionType::Education => "education",
            SectionType::Skills => "skills",
        }
    }

    fn header_patterns(&self) -> &'static [Regex] {
        match self {
            SectionType::Contact => CONTACT_HEADERS.as_slice(),
            SectionType::Summary => SUMMARY_HEADERS.as_slice(),
            SectionType::Experience => EXPERIENCE_HEADERS.as_slice(),
            SectionType::Education => EDUCATION_HEADERS.as_slice(),
            SectionType::Skills => SKILLS_HEADERS.as_slice(),
        }
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

static CONTACT_HEADERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^contact(?: (?:information|info|details|me))?$",
        r"^personal (?:information|details|info)$",
        r"^get in touch$",
    ])
});

static SUMMARY_HEADERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^(?:professional |career |executive |personal )?(?:summary|profile|overview)$",
        r"^(?:career |professional )?objective$",
        r"^about(?: me)?$",
        r"^summary of qualifications$",
    ])
});

static EXPERIENCE_HEADERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^(?:professional |work |relevant |employment |career )?experience$",
        r"^(?:work|employment|career|professional) history$",
        r"^employment$",
        r"^positions? held$",
        r"^experience (?:and|&) (?:projects|leadership)$",
    ])
});

static EDUCATION_HEADERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^education(?:al background)?$",
        r"^academic (?:background|history|qualifications)$",
        r"^academics$",
        r"^education (?:and|&) (?:training|certifications?)$",
        r"^qualifications$",
    ])
});

static SKILLS_HEADERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^(?:technical |core |key |professional |relevant )?(?:skills|competencies|expertise)$",
        r"^skills (?:and|&) (?:abilities|tools|technologies|interests|certifications)$",
        r"^technical proficienc(?:y|ies)$",
        r"^technologies$",
        r"^tools (?:and|&) technologies$",
    ])
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSpan {
    /// Index of the header line (or of the first line, for an inferred section).
    pub start_line: usize,
    /// Exclusive.
    pub end_line: usize,
    pub header: String,
    pub content: String,
    /// True when no header was found and the span was inferred from position.
    pub inferred: bool,
}

pub type SectionMap = BTreeMap<SectionType, SectionSpan>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub sections: SectionMap,
    pub warnings: Vec<String>,
    pub confidence: f64,
    pub found: Vec<SectionType>,
    pub missing: Vec<SectionType>,
}

fn clean_header(line: &str) -> Option<String> {
    let trimmed = line.trim().trim_start_matches('•').trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_HEADER_CHARS {
        return None;
    }
    let cleaned: String = trimmed
        .trim_end_matches(|c: char| c == ':' || c == '-' || c.is_whitespace())
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '&' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    (!cleaned.is_empty()).then_some(cleaned)
}

pub fn classify_sections(lines: &[String]) -> ClassificationResult {
    let cleaned: Vec<Option<String>> = lines.iter().map(|l| clean_header(l)).collect();
    let mut claimed = vec![false; lines.len()];
    let mut starts: Vec<(usize, SectionType)> = Vec::new();

    for section in SectionType::CLAIM_ORDER {
        let hit = cleaned.iter().enumerate().find(|(i, header)| {
            !claimed[*i]
                && header.as_deref().is_some_and(|h| {
                    section.header_patterns().iter().any(|p| p.is_match(h))
                })
        });
        if let Some((i, _)) = hit {
            claimed[i] = true;
            starts.push((i, section));
        }
    }
    starts.sort();

    let mut sections = SectionMap::new();
    for (idx, &(start, section)) in starts.iter().enumerate() {
        let end = starts.get(idx + 1).map_or(lines.len(), |&(next, _)| next);
        sections.insert(
            section,
            SectionSpan {
                start_line: start,
                end_line: end,
                header: lines[start].trim().to_string(),
                content: join_trimmed(&lines[start + 1..end]),
                inferred: false,
            },
        );
    }

    let mut warnings = Vec::new();
    let preamble_end = starts.first().map_or(lines.len(), |&(first, _)| first);
    if !sections.contains_key(&SectionType::Contact) {
        let preamble = join_trimmed(&lines[..preamble_end]);
        if !preamble.is_empty() {
            sections.insert(
                SectionType::Contact,
                SectionSpan {
                    start_line: 0,
                    end_line: preamble_end,
                    header: String::new(),
                    content: preamble,
                    inferred: true,
                },
            );
            warnings.push("Contact section inferred from the lines before the first header".to_string());
        }
    }

    let found: Vec<SectionType> = SectionType::EXPECTED
        .into_iter()
        .filter(|s| sections.contains_key(s))
        .collect();
    let missing: Vec<SectionType> = SectionType::EXPECTED
        .into_iter()
        .filter(|s| !sections.contains_key(s))
        .collect();
    for section in &missing {
        warnings.push(format!("No {} section found", section.as_str()));
    }

    ClassificationResult {
        confidence: found.len() as f64 / SectionType::EXPECTED.len() as f64,
        sections,
        warnings,
        found,
        missing,
    }
}

fn join_trimmed(lines: &[String]) -> String {
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    const RESUME: &str = "John Smith\njohn@example.com\n\nSUMMARY\nBuilder of things.\n\nPROFESSIONAL EXPERIENCE\nSoftware Engineer at Acme\n2019 - Present\n\nEducation:\nBS Computer Science\n\nTechnical Skills\nRust, Go";

    #[test]
    fn test_partitions_by_headers() {
        let result = classify_sections(&lines(RESUME));
        assert_eq!(result.confidence, 1.0);
        let exp = &result.sections[&SectionType::Experience];
        assert_eq!(exp.header, "PROFESSIONAL EXPERIENCE");
        assert_eq!(exp.content, "Software Engineer at Acme\n2019 - Present");
        assert_eq!(result.sections[&SectionType::Skills].content, "Rust, Go");
        assert_eq!(result.sections[&SectionType::Summary].content, "Builder of things.");
    }

    #[test]
    fn test_preamble_becomes_inferred_contact() {
        let result = classify_sections(&lines(RESUME));
        let contact = &result.sections[&SectionType::Contact];
        assert!(contact.inferred);
        assert_eq!(contact.content, "John Smith\njohn@example.com");
        assert_eq!(contact.end_line, 3);
    }

    #[test]
    fn test_missing_sections_are_absent_not_empty() {
        let result = classify_sections(&lines("Jane Doe\n\nExperience\nPM at Initech"));
        assert!(!result.sections.contains_key(&SectionType::Education));
        assert!(!result.sections.contains_key(&SectionType::Skills));
        assert_eq!(result.missing, vec![SectionType::Education, SectionType::Skills]);
        assert_eq!(result.confidence, 0.5);
        assert!(result.warnings.iter().any(|w| w.contains("education")));
    }

    #[test]
    fn test_long_lines_and_prose_are_not_headers() {
        let text = "My experience spans a decade of shipping distributed systems\nI love education";
        let result = classify_sections(&lines(text));
        assert!(!result.sections.contains_key(&SectionType::Experience));
        assert!(!result.sections.contains_key(&SectionType::Education));
    }

    #[test]
    fn test_first_matching_line_wins() {
        let text = "Experience\nA\nEducation\nB\nExperience\nC";
        let result = classify_sections(&lines(text));
        let exp = &result.sections[&SectionType::Experience];
        assert_eq!(exp.start_line, 0);
        assert_eq!(exp.end_line, 2);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let input = lines(RESUME);
        let first = classify_sections(&input);
        let second = classify_sections(&input);
        assert_eq!(first.sections, second.sections);
        assert_eq!(first.warnings, second.warnings);
        assert_eq!(first.confidence, second.confidence);
    }
}
