//! Skills extraction from delimited lists plus known keywords.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::parsing::models::{ExtractionResult, ExtractionSource};
use crate::parsing::sections::SectionSpan;

const PER_SKILL_CONFIDENCE: f64 = 0.05;
const MAX_TOKEN_CHARS: usize = 40;
const MAX_TOKEN_WORDS: usize = 4;

const TECHNICAL_SKILLS: &[&str] = &[
    "Rust", "Python", "JavaScript", "TypeScript", "Java", "C++", "C#", "Golang", "Ruby", "PHP",
    "Swift", "Kotlin", "Scala", "SQL", "PostgreSQL", "MySQL", "MongoDB", "Redis", "Elasticsearch",
    "AWS", "Azure", "GCP", "Docker", "Kubernetes", "Terraform", "Ansible", "Linux", "Git",
    "React", "Angular", "Vue", "Node.js", "Django", "Flask", "Spring", "GraphQL", "REST",
    "HTML", "CSS", "TensorFlow", "PyTorch", "Machine Learning", "Kafka", "Spark", "Hadoop",
    "Excel", "Tableau", "Power BI", "Figma", "Jenkins", "CI/CD", "Salesforce", "SAP",
];

const SOFT_SKILLS: &[&str] = &[
    "Leadership", "Communication", "Teamwork", "Problem Solving", "Project Management",
    "Public Speaking", "Mentoring", "Time Management", "Collaboration", "Critical Thinking",
    "Agile", "Scrum",
];

const CERTIFICATIONS: &[&str] = &[
    "AWS Certified", "PMP", "CISSP", "CPA", "Certified Scrum Master", "CCNA", "Six Sigma",
];

static LIST_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z /&-]{1,30}:\s*").unwrap());

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

pub fn extract_skills(full_text: &str, span: Option<&SectionSpan>) -> ExtractionResult<Vec<String>> {
    let (text, source) = match span {
        Some(span) if !span.content.is_empty() => (span.content.as_str(), ExtractionSource::Section),
        _ => (full_text, ExtractionSource::FullText),
    };

    let mut skills = Vec::new();
    if source == ExtractionSource::Section {
        skills.extend(list_tokens(text));
    }
    skills.extend(keyword_hits(text));
    let skills = dedup_case_insensitive(skills);

    let confidence = (skills.len() as f64 * PER_SKILL_CONFIDENCE).min(1.0);
    let mut result = ExtractionResult::new(skills, confidence, source);
    if result.data.is_empty() {
        result.warn("skills", "No skills found");
    }
    result
}

/// Tokens of comma/semicolon/pipe/bullet separated lines, label prefixes removed.
fn list_tokens(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(|line| {
            let line = line.trim().trim_start_matches('•').trim();
            let line = LIST_LABEL.replace(line, "");
            line.split([',', ';', '|', '•', '·'])
                .map(|t| t.trim().trim_end_matches('.').trim())
                .map(|t| t.strip_prefix("and ").unwrap_or(t).trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|t| is_skill_token(t))
        .collect()
}

fn is_skill_token(token: &str) -> bool {
    !token.is_empty()
        && token.chars().count() <= MAX_TOKEN_CHARS
        && token.split_whitespace().count() <= MAX_TOKEN_WORDS
        && token.chars().any(char::is_alphabetic)
        && !token.contains(['!', '?', ':'])
        && !token.contains(". ")
        && !YEAR.is_match(token)
}

fn keyword_hits(text: &str) -> Vec<String> {
    let lower = text.to_ascii_lowercase();
    TECHNICAL_SKILLS
        .iter()
        .chain(SOFT_SKILLS)
        .chain(CERTIFICATIONS)
        .filter(|kw| contains_keyword(&lower, &kw.to_ascii_lowercase()))
        .map(|kw| kw.to_string())
        .collect()
}

/// Substring search that requires non-alphanumeric neighbours, so `Java` does not
/// match inside `JavaScript` and `C` does not match `C++`.
fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    haystack.match_indices(keyword).any(|(start, _)| {
        let end = start + keyword.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric() && c != '+' && c != '#');
        before_ok && after_ok
    })
}

fn dedup_case_insensitive(skills: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    skills
        .into_iter()
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}
