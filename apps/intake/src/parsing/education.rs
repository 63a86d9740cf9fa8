//! Education extraction: one record per document (the first degree found).

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::resume::Education;
use crate::parsing::models::{ExtractionResult, ExtractionSource};
use crate::parsing::rules::{group_one, Rule, RuleChain};
use crate::parsing::sections::SectionSpan;

const DEGREE_WEIGHT: f64 = 0.4;
const INSTITUTION_WEIGHT: f64 = 0.4;
const YEAR_WEIGHT: f64 = 0.2;

const MIN_YEAR: u16 = 1950;
const MAX_YEAR: u16 = 2100;

static DEGREE_RULES: LazyLock<RuleChain<(String, String)>> = LazyLock::new(|| {
    RuleChain::new(vec![
        Rule::new(
            "full_name",
            r"(?im)\b((?:bachelor|master|doctor)(?:'s|s)?(?:[ \t]+of[ \t]+(?:science|arts|engineering|business administration|fine arts|philosophy|education|laws|technology))?)(?:[ \t]+(?:in|of)[ \t]+([A-Za-z&][A-Za-z& ]{1,60}?))?[ \t]*(?:[,|(–—]|\d|$)",
            degree_with_field,
        ),
        Rule::new(
            "abbreviation",
            r"(?m)\b(Ph\.?D\.?|MBA|B\.?Sc\.?|M\.?Sc\.?|B\.?Eng\.?|M\.?Eng\.?|B\.?Tech|M\.?Tech|B\.S\.?|B\.A\.?|M\.S\.?|M\.A\.?)(?:[ \t]+(?:in|of)[ \t]+([A-Z][A-Za-z& ]{1,60}?))?[ \t]*(?:[,|(–—]|\d|$)",
            degree_with_field,
        ),
        // Undotted BS/BA/MS/MA collide with state codes ("Cambridge, MA", "MA 02115").
        Rule::new(
            "bare_abbreviation",
            r"(?m)(,[ \t]*)?\b(BS|BA|MS|MA)(?:[ \t]+(?:in|of)[ \t]+([A-Z][A-Za-z& ]{1,60}?))?[ \t]*(\d{5}\b|[,|(–—]|\d|$)",
            bare_degree,
        ),
        Rule::new(
            "associate_or_diploma",
            r"(?im)\b(associate(?:'s)?(?:[ \t]+degree|[ \t]+of[ \t]+(?:arts|science|applied science))?|high school diploma|diploma|certificate)(?:[ \t]+(?:in|of)[ \t]+([A-Za-z&][A-Za-z& ]{1,60}?))?[ \t]*(?:[,|(–—]|\d|$)",
            degree_with_field,
        ),
        Rule::new(
            "generic",
            r"(?im)\b((?:under|post)?graduate degree|degree)(?:[ \t]+in[ \t]+([A-Za-z&][A-Za-z& ]{1,60}?))?[ \t]*(?:[,|(–—]|\d|$)",
            degree_with_field,
        ),
    ])
});

static INSTITUTION_RULES: LazyLock<RuleChain<String>> = LazyLock::new(|| {
    RuleChain::new(vec![
        Rule::new(
            "labeled",
            r"(?im)^[ \t]*(?:school|university|institution|college)[ \t]*:[ \t]*(.+?)[ \t]*$",
            group_one,
        ),
        Rule::new(
            "keyword",
            r"\b((?:[A-Z][A-Za-z.&'-]*[ \t]+){0,4}(?:University|College|Institute|School|Academy|Polytechnic)(?:[ \t]+(?:of|for|at)[ \t]+(?:the[ \t]+)?[A-Z][A-Za-z.&'-]*(?:[ \t]+[A-Z][A-Za-z.&'-]*){0,3})?)",
            group_one,
        ),
    ])
});

static YEAR_RULES: LazyLock<RuleChain<u16>> = LazyLock::new(|| {
    RuleChain::new(vec![
        Rule::new(
            "labeled",
            r"(?i)\b(?:graduated|graduation|class of|expected)[: \t]*(?:[A-Za-z]+\.?[ \t]+)?((?:19|20)\d{2})\b",
            year_group,
        ),
        Rule::new(
            "range_end",
            r"(?i)\b(?:19|20)\d{2}[ \t]*(?:-|–|—|to)[ \t]*((?:19|20)\d{2})\b",
            year_group,
        ),
    ])
});

static ANY_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

static GPA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bGPA[: \t]*([0-4]\.\d{1,2})(?:[ \t]*/[ \t]*(4\.0|4|5\.0|5))?").unwrap()
});

pub fn extract_education(full_text: &str, span: Option<&SectionSpan>) -> ExtractionResult<Education> {
    let (text, source) = match span {
        Some(span) if !span.content.is_empty() => (span.content.as_str(), ExtractionSource::Section),
        _ => (full_text, ExtractionSource::FullText),
    };

    let mut education = Education::default();
    let mut anchors = Vec::new();
    if let Some(m) = DEGREE_RULES.first_match(text) {
        education.degree = m.value.0;
        education.field_of_study = m.value.1;
        anchors.push(m.span);
    }
    if let Some(m) = INSTITUTION_RULES.first_match(text) {
        education.institution = m.value;
        anchors.push(m.span);
    }
    education.graduation_year = match source {
        ExtractionSource::Section => graduation_year(text),
        ExtractionSource::FullText => anchored_graduation_year(text, &anchors),
    };
    if let Some(caps) = GPA.captures(text) {
        education.gpa = match caps.get(2) {
            Some(scale) => format!("{}/{}", &caps[1], scale.as_str()),
            None => caps[1].to_string(),
        };
    }

    let confidence = [
        (!education.degree.is_empty(), DEGREE_WEIGHT),
        (!education.institution.is_empty(), INSTITUTION_WEIGHT),
        (education.graduation_year.is_some(), YEAR_WEIGHT),
    ]
    .iter()
    .filter(|(present, _)| *present)
    .map(|(_, w)| w)
    .sum();

    let mut result = ExtractionResult::new(education, confidence, source);
    if result.data.degree.is_empty() {
        result.warn("degree", "No degree found");
    }
    if result.data.institution.is_empty() {
        result.warn("institution", "No institution found");
    }
    result
}

/// Labeled year, then the end of a year range, then the latest year mentioned.
fn graduation_year(text: &str) -> Option<u16> {
    if let Some(m) = YEAR_RULES.first_match(text) {
        return Some(m.value);
    }
    ANY_YEAR
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<u16>().ok())
        .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y))
        .max()
}

/// Without an education section only a labeled year, or a year on the same line as the
/// degree or institution, is taken. Job date ranges elsewhere in the document are not.
fn anchored_graduation_year(text: &str, anchors: &[Range<usize>]) -> Option<u16> {
    if let Some(m) = YEAR_RULES.first_match(text).filter(|m| m.rule == "labeled") {
        return Some(m.value);
    }
    anchors
        .iter()
        .find_map(|span| graduation_year(line_around(text, span.start)))
}

fn line_around(text: &str, at: usize) -> &str {
    let start = text[..at].rfind('\n').map_or(0, |i| i + 1);
    let end = text[at..].find('\n').map_or(text.len(), |i| at + i);
    &text[start..end]
}

fn year_group(caps: &Captures<'_>) -> Option<u16> {
    caps[1]
        .parse::<u16>()
        .ok()
        .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y))
}

fn degree_with_field(caps: &Captures<'_>) -> Option<(String, String)> {
    let degree = caps[1].trim().to_string();
    let field = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    (!degree.is_empty()).then_some((degree, field))
}

/// Rejects a bare code after a comma or before a ZIP unless a field of study follows.
fn bare_degree(caps: &Captures<'_>) -> Option<(String, String)> {
    let has_field = caps.get(3).is_some();
    let after_comma = caps.get(1).is_some();
    let before_zip = caps.get(4).is_some_and(|m| m.as_str().len() == 5);
    if !has_field && (after_comma || before_zip) {
        return None;
    }
    let field = caps
        .get(3)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some((caps[2].to_string(), field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(content: &str) -> SectionSpan {
        SectionSpan {
            start_line: 0,
            end_line: 3,
            header: "EDUCATION".into(),
            content: content.into(),
            inferred: false,
        }
    }

    #[test]
    fn test_abbreviated_degree_with_field_and_institution() {
        let text = "B.S. in Computer Science, Stanford University, 2015\nGPA: 3.8/4.0";
        let result = extract_education(text, Some(&span(text)));
        let edu = &result.data;
        assert_eq!(edu.degree, "B.S.");
        assert_eq!(edu.field_of_study, "Computer Science");
        assert_eq!(edu.institution, "Stanford University");
        assert_eq!(edu.graduation_year, Some(2015));
        assert_eq!(edu.gpa, "3.8/4.0");
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_full_degree_name_and_university_of() {
        let text = "University of California Berkeley\nBachelor of Arts in Economics\n2009 - 2013";
        let result = extract_education(text, Some(&span(text)));
        let edu = &result.data;
        assert_eq!(edu.degree, "Bachelor of Arts");
        assert_eq!(edu.field_of_study, "Economics");
        assert_eq!(edu.institution, "University of California Berkeley");
        assert_eq!(edu.graduation_year, Some(2013));
    }

    #[test]
    fn test_labeled_year_beats_later_years() {
        let text = "MBA, Wharton School\nExpected May 2024\nExchange term 2025";
        let result = extract_education(text, Some(&span(text)));
        assert_eq!(result.data.degree, "MBA");
        assert_eq!(result.data.institution, "Wharton School");
        assert_eq!(result.data.graduation_year, Some(2024));
    }

    #[test]
    fn test_latest_year_when_unlabeled() {
        assert_eq!(graduation_year("Attended 2001, finished 2004"), Some(2004));
        assert_eq!(graduation_year("no years"), None);
    }

    #[test]
    fn test_ms_office_is_not_a_degree() {
        let text = "Tools: MS Office and Excel";
        let result = extract_education(text, None);
        assert!(result.data.degree.is_empty());
        assert_eq!(result.source, ExtractionSource::FullText);
        let fields: Vec<_> = result.warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, vec!["degree", "institution"]);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_job_dates_are_not_a_graduation_year() {
        let text = "John Smith\njohn@example.com\nSoftware Engineer at Acme Inc\n2019 - Present\n";
        let result = extract_education(text, None);
        assert_eq!(result.data.graduation_year, None);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_full_text_year_must_sit_with_the_degree() {
        let text = "Jane Doe\nAnalyst at Initech | 2016 - 2021\nB.A. in Economics, 2012\n";
        let result = extract_education(text, None);
        assert_eq!(result.data.degree, "B.A.");
        assert_eq!(result.data.graduation_year, Some(2012));

        let labeled = extract_education("Consultant 2018 - 2022\nClass of 2014", None);
        assert_eq!(labeled.data.graduation_year, Some(2014));
    }

    #[test]
    fn test_state_codes_are_not_degrees() {
        let text = "Harvard University, Cambridge, MA\nB.A. in Economics, 2012\n";
        let result = extract_education(text, Some(&span(text)));
        assert_eq!(result.data.degree, "B.A.");
        assert_eq!(result.data.field_of_study, "Economics");
        assert_eq!(result.data.institution, "Harvard University");

        let zip = extract_education("Boston, MA 02115\nNortheastern University", None);
        assert!(zip.data.degree.is_empty());
    }

    #[test]
    fn test_bare_codes_with_context_are_degrees() {
        let own_line = extract_education("MS\nGeorgia Institute of Technology, 2018", None);
        assert_eq!(own_line.data.degree, "MS");

        let with_field = extract_education("Rice University, BS in Physics", None);
        assert_eq!(with_field.data.degree, "BS");
        assert_eq!(with_field.data.field_of_study, "Physics");
    }
}
