//! Contact extraction: email, phone, name, location, profile links.

use std::sync::LazyLock;

use regex::Captures;

use crate::models::resume::ContactInfo;
use crate::parsing::models::{ExtractionResult, ExtractionSource};
use crate::parsing::rules::{group_one, Rule, RuleChain};
use crate::parsing::sections::SectionSpan;

const EMAIL_WEIGHT: f64 = 0.3;
const PHONE_WEIGHT: f64 = 0.2;
const NAME_WEIGHT: f64 = 0.3;
const LOCATION_WEIGHT: f64 = 0.1;
const LINKS_WEIGHT: f64 = 0.1;

/// The name is only looked for in the first few non-empty lines.
const NAME_SEARCH_LINES: usize = 5;

const US_STATES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC",
];

/// Words that rule a line out as a personal name.
const NOT_NAME_WORDS: [&str; 38] = [
    "resume", "curriculum", "vitae", "cv", "experience", "education", "skills", "summary",
    "contact", "profile", "objective", "references", "page", "engineer", "developer",
    "manager", "designer", "analyst", "consultant", "director", "intern", "specialist",
    "scientist", "architect", "lead", "officer", "administrator", "coordinator", "assistant",
    "associate", "president", "founder", "inc", "llc", "corp", "university", "college",
    "street",
];

static EMAIL_RULES: LazyLock<RuleChain<String>> = LazyLock::new(|| {
    RuleChain::new(vec![
        Rule::new(
            "standard",
            r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b",
            |c| Some(c[0].to_lowercase()),
        ),
        Rule::new(
            "obfuscated",
            r"(?i)\b([A-Z0-9._%+-]+)\s*[\[({]\s*at\s*[\])}]\s*([A-Z0-9-]+)\s*[\[({]\s*dot\s*[\])}]\s*([A-Z]{2,})\b",
            |c| Some(format!("{}@{}.{}", &c[1], &c[2], &c[3]).to_lowercase()),
        ),
    ])
});

static PHONE_RULES: LazyLock<RuleChain<String>> = LazyLock::new(|| {
    RuleChain::new(vec![
        Rule::new(
            "labeled",
            r"(?i)\b(?:phone|tel|telephone|mobile|cell)\s*[:.]?\s*(\+?\d[\d\s().-]{6,}\d)",
            plausible_phone,
        ),
        Rule::new(
            "north_american",
            r"(?:\+?1[\s.-]?)?(?:\(\d{3}\)|\b\d{3})[\s.-]?\d{3}[\s.-]?\d{4}\b",
            |c| Some(c[0].trim().to_string()),
        ),
        Rule::new(
            "international",
            r"\+\d{1,3}(?:[\s.-]?\(?\d{1,4}\)?){2,5}",
            |c| plausible_phone_text(&c[0]),
        ),
    ])
});

static NAME_RULES: LazyLock<RuleChain<(String, String)>> = LazyLock::new(|| {
    RuleChain::new(vec![
        Rule::new(
            "labeled",
            r"(?im)^[ \t]*(?:full[ \t]+)?name[ \t]*[:\-][ \t]*([A-Za-z][A-Za-z'.\- ]{1,60}?)[ \t]*$",
            |c| split_name(&c[1]),
        ),
        Rule::new(
            "title_case",
            r"(?m)^[ \t]*([A-Z](?:[a-z]|'[A-Z])[a-zA-Z'\-]*(?:[ \t]+[A-Z]\.?)?(?:[ \t]+[A-Z](?:[a-z]|'[A-Z])[a-zA-Z'\-]*){1,2})[ \t]*$",
            |c| split_name(&c[1]),
        ),
        Rule::new(
            "all_caps",
            r"(?m)^[ \t]*([A-Z][A-Z'\-]+(?:[ \t]+[A-Z]\.?)?(?:[ \t]+[A-Z][A-Z'\-]+){1,2})[ \t]*$",
            |c| split_name(&title_case(&c[1])),
        ),
    ])
});

static LOCATION_RULES: LazyLock<RuleChain<String>> = LazyLock::new(|| {
    RuleChain::new(vec![
        Rule::new(
            "labeled",
            r"(?im)^[ \t]*(?:location|address|based in)[ \t]*[:\-][ \t]*(.+?)[ \t]*$",
            group_one,
        ),
        Rule::new(
            "city_state",
            r"\b([A-Z][a-zA-Z.]+(?: [A-Z][a-zA-Z.]+){0,2}),[ \t]*([A-Z]{2})\b(?:[ \t]+\d{5}(?:-\d{4})?)?",
            city_state,
        ),
        Rule::new(
            "city_country",
            r"\b([A-Z][a-zA-Z]+(?: [A-Z][a-zA-Z]+){0,2}),[ \t]*(United States|USA|Canada|United Kingdom|UK|England|Ireland|Germany|France|Spain|Netherlands|India|Australia|Singapore|Brazil|Mexico|Japan)\b",
            |c| Some(format!("{}, {}", &c[1], &c[2])),
        ),
    ])
});

static LINKEDIN_RULES: LazyLock<RuleChain<String>> = LazyLock::new(|| {
    RuleChain::new(vec![Rule::new(
        "linkedin",
        r"(?i)\b(?:https?://)?(?:[a-z]{2,3}\.)?linkedin\.com/in/[A-Za-z0-9_%-]+/?",
        |c| Some(c[0].trim_end_matches('/').to_string()),
    )])
});

static GITHUB_RULES: LazyLock<RuleChain<String>> = LazyLock::new(|| {
    RuleChain::new(vec![Rule::new(
        "github",
        r"(?i)\b(?:https?://)?(?:www\.)?github\.com/[A-Za-z0-9_-]+",
        |c| Some(c[0].to_string()),
    )])
});

static WEBSITE_RULES: LazyLock<RuleChain<String>> = LazyLock::new(|| {
    RuleChain::new(vec![
        Rule::new("url", r"(?i)\bhttps?://[^\s,;|]+", personal_site),
        Rule::new("www", r"(?i)\bwww\.[^\s,;|]+", personal_site),
    ])
});

pub fn extract_contact(full_text: &str, span: Option<&SectionSpan>) -> ExtractionResult<ContactInfo> {
    let (primary, source) = match span {
        Some(span) if !span.content.is_empty() => (span.content.as_str(), ExtractionSource::Section),
        _ => (full_text, ExtractionSource::FullText),
    };
    let find = |chain: &RuleChain<String>| find_field(chain, primary, full_text);

    let mut contact = ContactInfo::default();
    if let Some(email) = find(&*EMAIL_RULES) {
        contact.email = email;
    }
    if let Some(phone) = find(&*PHONE_RULES) {
        contact.phone = normalize_phone(&phone);
    }
    let name_region = name_region(primary);
    if let Some(m) = NAME_RULES.first_match(&name_region) {
        contact.first_name = m.value.0;
        contact.last_name = m.value.1;
    }
    if let Some(location) = find(&*LOCATION_RULES) {
        contact.location = location;
    }
    if let Some(url) = find(&*LINKEDIN_RULES) {
        contact.linkedin = url;
    }
    if let Some(url) = find(&*GITHUB_RULES) {
        contact.github = url;
    }
    if let Some(url) = find(&*WEBSITE_RULES) {
        contact.website = url;
    }

    let has_links =
        !contact.linkedin.is_empty() || !contact.github.is_empty() || !contact.website.is_empty();
    let confidence = [
        (!contact.email.is_empty(), EMAIL_WEIGHT),
        (!contact.phone.is_empty(), PHONE_WEIGHT),
        (!contact.first_name.is_empty(), NAME_WEIGHT),
        (!contact.location.is_empty(), LOCATION_WEIGHT),
        (has_links, LINKS_WEIGHT),
    ]
    .iter()
    .filter(|(present, _)| *present)
    .map(|(_, weight)| weight)
    .sum::<f64>();

    let mut result = ExtractionResult::new(contact, confidence, source);
    if result.data.email.is_empty() {
        result.warn("email", "No email address found");
    }
    if result.data.phone.is_empty() {
        result.warn("phone", "No phone number found");
    }
    if result.data.first_name.is_empty() {
        result.warn("name", "Could not identify the candidate's name");
    }
    result
}

/// Fields missing from the contact block are looked for in the whole document.
fn find_field(chain: &RuleChain<String>, primary: &str, full_text: &str) -> Option<String> {
    chain
        .first_match(primary)
        .or_else(|| chain.first_match(full_text))
        .map(|m| m.value)
}

/// `(DDD) DDD-DDDD` for 10 digits, or 11 with a leading country code 1. Anything else
/// is returned trimmed but otherwise unchanged.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let national = match digits.len() {
        10 => Some(digits.as_str()),
        11 if digits.starts_with('1') => Some(&digits[1..]),
        _ => None,
    };
    match national {
        Some(d) => format!("({}) {}-{}", &d[..3], &d[3..6], &d[6..]),
        None => raw.trim().to_string(),
    }
}

fn plausible_phone(caps: &Captures<'_>) -> Option<String> {
    plausible_phone_text(&caps[1])
}

fn plausible_phone_text(text: &str) -> Option<String> {
    let digits = text.chars().filter(char::is_ascii_digit).count();
    (7..=15).contains(&digits).then(|| text.trim().to_string())
}

fn name_region(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(NAME_SEARCH_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_name(raw: &str) -> Option<(String, String)> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    if words.len() < 2 || words.len() > 4 {
        return None;
    }
    let rejected = words.iter().any(|w| {
        let lower = w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        NOT_NAME_WORDS.contains(&lower.as_str())
    });
    if rejected {
        return None;
    }
    let first = words[0].to_string();
    let last = words.last().map(|w| w.to_string()).unwrap_or_default();
    Some((first, last))
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub(crate) fn is_us_state(code: &str) -> bool {
    US_STATES.contains(&code)
}

fn city_state(caps: &Captures<'_>) -> Option<String> {
    let state = &caps[2];
    is_us_state(state).then(|| format!("{}, {}", &caps[1], state))
}

fn personal_site(caps: &Captures<'_>) -> Option<String> {
    let url = caps[0].trim_end_matches(['.', ')', '/']);
    let lower = url.to_lowercase();
    if lower.contains("linkedin.com") || lower.contains("github.com") {
        return None;
    }
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone("555.123.4567"), "(555) 123-4567");
        assert_eq!(normalize_phone("+1 (555) 123-4567"), "(555) 123-4567");
        assert_eq!(normalize_phone("+44 20 7946 0018"), "+44 20 7946 0018");
        assert_eq!(normalize_phone("  12345 "), "12345");
    }

    #[test]
    fn test_full_contact_block() {
        let text = "John Smith\nSan Francisco, CA 94105\njohn.smith@example.com | 555.123.4567\nlinkedin.com/in/johnsmith";
        let result = extract_contact(text, None);
        let c = &result.data;
        assert_eq!(c.first_name, "John");
        assert_eq!(c.last_name, "Smith");
        assert_eq!(c.email, "john.smith@example.com");
        assert_eq!(c.phone, "(555) 123-4567");
        assert_eq!(c.location, "San Francisco, CA");
        assert_eq!(c.linkedin, "linkedin.com/in/johnsmith");
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert!(result.warnings.is_empty());
        assert_eq!(result.source, ExtractionSource::FullText);
    }

    #[test]
    fn test_international_phone_kept_verbatim() {
        let result = extract_contact("Amelia Hart\n+44 20 7946 0018\namelia@hart.co.uk", None);
        assert_eq!(result.data.phone, "+44 20 7946 0018");
    }

    #[test]
    fn test_obfuscated_email() {
        let result = extract_contact("Jane Doe\njane.doe [at] mail [dot] com", None);
        assert_eq!(result.data.email, "jane.doe@mail.com");
    }

    #[test]
    fn test_all_caps_name_is_title_cased() {
        let result = extract_contact("JANE DOE\njane@x.io", None);
        assert_eq!(result.data.first_name, "Jane");
        assert_eq!(result.data.last_name, "Doe");
    }

    #[test]
    fn test_headers_and_job_titles_are_not_names() {
        let result = extract_contact("Software Engineer\nWORK EXPERIENCE\nsam@x.io", None);
        assert!(result.data.first_name.is_empty());
        assert!(result.warnings.iter().any(|w| w.field == "name"));
    }

    #[test]
    fn test_missing_fields_produce_warnings_not_errors() {
        let result = extract_contact("nothing useful here", None);
        assert_eq!(result.confidence, 0.0);
        let fields: Vec<_> = result.warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "phone", "name"]);
    }

    #[test]
    fn test_email_outside_span_is_still_found() {
        let span = SectionSpan {
            start_line: 0,
            end_line: 1,
            header: String::new(),
            content: "Jane Doe".into(),
            inferred: true,
        };
        let full = "Jane Doe\nEXPERIENCE\nPM\n\nReach me: jane@doe.dev";
        let result = extract_contact(full, Some(&span));
        assert_eq!(result.data.email, "jane@doe.dev");
        assert_eq!(result.source, ExtractionSource::Section);
    }

    #[test]
    fn test_website_skips_profile_links() {
        let text = "Ana Lima\nhttps://github.com/analima https://analima.dev";
        let result = extract_contact(text, None);
        assert_eq!(result.data.github, "https://github.com/analima");
        assert_eq!(result.data.website, "https://analima.dev");
    }
}
