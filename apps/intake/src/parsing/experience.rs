//! Work experience extraction.
//!
//! The section is cut into entry blocks (blank lines, or a new title line once the
//! current block already has its dates). Per block: dates are matched first and masked
//! out, then title/employer rules run on the first three lines, then location. Whatever
//! text the matched spans do not cover becomes the accomplishments.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::resume::WorkExperience;
use crate::parsing::contact::is_us_state;
use crate::parsing::models::{ExtractionResult, ExtractionSource};
use crate::parsing::rules::{Rule, RuleChain};
use crate::parsing::sections::SectionSpan;

const TITLE_WEIGHT: f64 = 0.3;
const EMPLOYER_WEIGHT: f64 = 0.3;
const DATES_WEIGHT: f64 = 0.2;
const LOCATION_WEIGHT: f64 = 0.1;
const ACCOMPLISHMENTS_WEIGHT: f64 = 0.05;
const REMOTE_WEIGHT: f64 = 0.05;

const HEAD_LINES: usize = 3;

const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?";
const OPEN_END: &str = r"(?:present|current|now|today)";
const RANGE_SEP: &str = r"\s*(?:-|–|—|to|until)\s*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: String,
    pub end: String,
    pub is_current: bool,
}

static DATE_RULES: LazyLock<RuleChain<DateRange>> = LazyLock::new(|| {
    RuleChain::new(vec![
        Rule::new(
            "month_range",
            &format!(r"(?i)\b({MONTH}\s+\d{{4}}){RANGE_SEP}({MONTH}\s+\d{{4}}|\d{{4}}|{OPEN_END})\b"),
            date_range,
        ),
        Rule::new(
            "numeric_range",
            &format!(r"(?i)\b(\d{{1,2}}/\d{{4}}){RANGE_SEP}(\d{{1,2}}/\d{{4}}|{OPEN_END})\b"),
            date_range,
        ),
        Rule::new(
            "year_range",
            &format!(r"(?i)\b(\d{{4}}){RANGE_SEP}(\d{{4}}|{OPEN_END})\b"),
            date_range,
        ),
        Rule::new(
            "single_month",
            &format!(r"(?i)\b({MONTH}\s+\d{{4}})\b"),
            |c| {
                normalize_date_point(&c[1]).map(|start| DateRange {
                    start,
                    end: String::new(),
                    is_current: false,
                })
            },
        ),
    ])
});

static DATE_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{MONTH}\s+)?(?:19|20)\d{{2}}\b|\b{OPEN_END}\b")).unwrap()
});

static TITLE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:engineer|developer|programmer|manager|designer|analyst|consultant|director|intern|specialist|scientist|architect|lead|officer|administrator|coordinator|assistant|associate|president|founder|co-founder|technician|accountant|representative|executive|supervisor|head of|vp|cto|ceo|cfo|coo|teacher|nurse|writer|editor|researcher|strategist|owner|partner|advisor|recruiter)s?\b",
    )
    .unwrap()
});

static TITLE_RULES: LazyLock<RuleChain<(String, String)>> = LazyLock::new(|| {
    RuleChain::new(vec![
        Rule::new(
            "title_at_employer",
            r"(?m)^[ \t]*([^\n|,@•]{2,60}?)[ \t]+(?:at|@)[ \t]+([^\n|,(•]{2,60}?)[ \t]*(?:[|,(].*)?$",
            title_at_employer,
        ),
        Rule::new(
            "separated",
            r"(?m)^[ \t]*([^\n|•]{2,80}?)[ \t]*(?:\||–|—| - |,)[ \t]*([^\n|•]{0,80}?)[ \t]*(?:\|.*)?$",
            either_order,
        ),
        Rule::new(
            "two_line",
            r"(?m)^[ \t]*([^\n|•]{2,80}?)[ \t]*\n[ \t]*([^\n|•]{2,80}?)[ \t]*$",
            either_order,
        ),
        Rule::new(
            "title_only",
            r"(?m)^[ \t]*([^\n|•]{2,80}?)[ \t]*$",
            |c| is_title(&c[1]).then(|| (tidy(&c[1]), String::new())),
        ),
    ])
});

static ENTRY_LOCATION_RULES: LazyLock<RuleChain<String>> = LazyLock::new(|| {
    RuleChain::new(vec![Rule::new(
        "city_state",
        r"\b([A-Z][a-zA-Z.]+(?: [A-Z][a-zA-Z.]+){0,2}),[ \t]*([A-Z]{2})\b",
        |c| is_us_state(&c[2]).then(|| format!("{}, {}", &c[1], &c[2])),
    )])
});

static REMOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:remote|work from home|wfh|fully distributed)\b").unwrap());

#[derive(Debug, Clone, Default)]
struct ParsedEntry {
    experience: WorkExperience,
    has_dates: bool,
}

impl ParsedEntry {
    fn has_title(&self) -> bool {
        !self.experience.job_title.is_empty()
    }

    /// Something that identifies a position, as opposed to a stray paragraph.
    fn is_anchored(&self) -> bool {
        self.has_title() || !self.experience.employer.is_empty() || self.has_dates
    }

    fn confidence(&self) -> f64 {
        let e = &self.experience;
        [
            (self.has_title(), TITLE_WEIGHT),
            (!e.employer.is_empty(), EMPLOYER_WEIGHT),
            (self.has_dates, DATES_WEIGHT),
            (!e.location.is_empty(), LOCATION_WEIGHT),
            (!e.accomplishments.is_empty(), ACCOMPLISHMENTS_WEIGHT),
            (e.remote, REMOTE_WEIGHT),
        ]
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, w)| w)
        .sum()
    }

    fn absorb(&mut self, block: &str) {
        let extra = remainder(block, &[]);
        if extra.is_empty() {
            return;
        }
        if !self.experience.accomplishments.is_empty() {
            self.experience.accomplishments.push('\n');
        }
        self.experience.accomplishments.push_str(&extra);
    }
}

/// Work history from the experience span, or from the whole text when there is none.
///
/// Section confidence is the mean of the entry confidences. A mean cannot be
/// non-decreasing under every addition, so the guarantee is narrower: adding an entry
/// whose own confidence is at least the current mean never lowers the result. A sparse
/// entry (say a bare title) does pull it down.
pub fn extract_experience(
    full_text: &str,
    span: Option<&SectionSpan>,
) -> ExtractionResult<Vec<WorkExperience>> {
    let (text, source) = match span {
        Some(span) if !span.content.is_empty() => (span.content.as_str(), ExtractionSource::Section),
        _ => (full_text, ExtractionSource::FullText),
    };

    let mut entries: Vec<ParsedEntry> = Vec::new();
    for block in split_blocks(text) {
        let parsed = parse_entry(&block);
        if source == ExtractionSource::FullText {
            // Without a section header only blocks that read clearly as positions count.
            if parsed.has_title() && parsed.has_dates {
                entries.push(parsed);
            }
            continue;
        }
        if parsed.is_anchored() {
            entries.push(parsed);
        } else if let Some(previous) = entries.last_mut() {
            previous.absorb(&block);
        }
    }

    let confidence = if entries.is_empty() {
        0.0
    } else {
        entries.iter().map(ParsedEntry::confidence).sum::<f64>() / entries.len() as f64
    };

    let mut warnings = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        if !entry.has_title() {
            warnings.push((format!("workExperiences[{i}].jobTitle"), "No job title found"));
        }
        if entry.experience.employer.is_empty() {
            warnings.push((format!("workExperiences[{i}].employer"), "No employer found"));
        }
        if !entry.has_dates {
            warnings.push((format!("workExperiences[{i}].dates"), "No employment dates found"));
        }
    }

    let mut result: ExtractionResult<Vec<WorkExperience>> = ExtractionResult::new(
        entries.into_iter().map(|e| e.experience).collect(),
        confidence,
        source,
    );
    if result.data.is_empty() {
        result.warn("entries", "No work experience entries found");
    }
    for (field, message) in warnings {
        result.warn(&field, message);
    }
    result
}

fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        let block_has_date = current.iter().any(|l| DATE_RULES.first_match(l).is_some());
        if block_has_date && current.len() > 1 && looks_like_title_line(line) {
            blocks.push(std::mem::take(&mut current));
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks.into_iter().map(|lines| lines.join("\n")).collect()
}

fn looks_like_title_line(line: &str) -> bool {
    !line.starts_with('•')
        && !line.ends_with('.')
        && line.split_whitespace().count() <= 12
        && TITLE_KEYWORDS.is_match(line)
}

fn parse_entry(block: &str) -> ParsedEntry {
    let mut consumed: Vec<Range<usize>> = Vec::new();
    let mut entry = ParsedEntry::default();

    if let Some(m) = DATE_RULES.first_match(block) {
        entry.experience.start_date = m.value.start;
        entry.experience.end_date = m.value.end;
        entry.experience.is_current = m.value.is_current;
        entry.has_dates = true;
        consumed.push(m.span);
    }

    let masked = mask(block, &consumed);
    let head = &masked[..head_end(&masked, HEAD_LINES)];
    if let Some(m) = TITLE_RULES.first_match(head) {
        entry.experience.job_title = m.value.0;
        entry.experience.employer = m.value.1;
        consumed.push(m.span);
    }

    let masked = mask(block, &consumed);
    if let Some(m) = ENTRY_LOCATION_RULES.first_match(&masked) {
        entry.experience.location = m.value;
        consumed.push(m.span);
    }

    entry.experience.remote = REMOTE.is_match(block);
    entry.experience.accomplishments = remainder(block, &consumed);
    entry
}

/// Byte offset of the end of the `n`th line.
fn head_end(text: &str, n: usize) -> usize {
    text.match_indices('\n')
        .nth(n.saturating_sub(1))
        .map_or(text.len(), |(i, _)| i)
}

/// Blanks out `ranges` with spaces, keeping byte offsets stable.
fn mask(text: &str, ranges: &[Range<usize>]) -> String {
    let mut bytes = text.as_bytes().to_vec();
    for range in ranges {
        for b in &mut bytes[range.clone()] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
    }
    // Ranges come from regex matches, so they sit on char boundaries.
    String::from_utf8(bytes).unwrap_or_else(|_| text.to_string())
}

/// Text outside `ranges`, line by line, without separator-only leftovers.
fn remainder(text: &str, ranges: &[Range<usize>]) -> String {
    let masked = mask(text, ranges);
    masked
        .lines()
        .map(|l| l.trim().trim_matches(|c: char| matches!(c, '|' | ',' | '-' | '–' | '—')).trim())
        .filter(|l| l.chars().any(char::is_alphanumeric))
        .collect::<Vec<_>>()
        .join("\n")
}

fn date_range(caps: &Captures<'_>) -> Option<DateRange> {
    let start = normalize_date_point(&caps[1])?;
    let end_raw = caps[2].trim();
    if is_open_end(end_raw) {
        return Some(DateRange {
            start,
            end: String::new(),
            is_current: true,
        });
    }
    let end = normalize_date_point(end_raw)?;
    Some(DateRange {
        start,
        end,
        is_current: false,
    })
}

fn is_open_end(raw: &str) -> bool {
    matches!(
        raw.to_lowercase().as_str(),
        "present" | "current" | "now" | "today"
    )
}

/// `Jan 2019` / `January 2019` / `01/2019` → `2019-01`; `2019` → `2019`.
pub fn normalize_date_point(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Some((month, year)) = raw.split_once('/') {
        let month: u32 = month.trim().parse().ok()?;
        let year = plausible_year(year)?;
        return (1..=12).contains(&month).then(|| format!("{year}-{month:02}"));
    }
    let mut parts = raw.split_whitespace();
    let first = parts.next()?;
    match parts.next() {
        Some(year) => {
            let month = month_number(first)?;
            let year = plausible_year(year)?;
            Some(format!("{year}-{month:02}"))
        }
        None => plausible_year(first).map(|y| y.to_string()),
    }
}

fn plausible_year(raw: &str) -> Option<u16> {
    let year: u16 = raw.trim().parse().ok()?;
    (1950..=2100).contains(&year).then_some(year)
}

fn month_number(word: &str) -> Option<u32> {
    let key: String = word
        .trim_end_matches('.')
        .chars()
        .take(3)
        .collect::<String>()
        .to_lowercase();
    let months = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
    months.iter().position(|m| *m == key).map(|i| i as u32 + 1)
}

fn is_title(text: &str) -> bool {
    let text = text.trim();
    text.split_whitespace().count() <= 8 && TITLE_KEYWORDS.is_match(text) && !DATE_LIKE.is_match(text)
}

fn is_plausible_employer(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty()
        && text.chars().any(char::is_alphabetic)
        && text.split_whitespace().count() <= 10
        && !DATE_LIKE.is_match(text)
}

fn tidy(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| matches!(c, '|' | ',' | '-' | '–' | '—' | ':'))
        .trim()
        .to_string()
}

fn title_at_employer(caps: &Captures<'_>) -> Option<(String, String)> {
    let title = tidy(&caps[1]);
    let employer = tidy(&caps[2]);
    let starts_upper = title.chars().next().is_some_and(char::is_uppercase);
    (starts_upper && title.split_whitespace().count() <= 8 && is_plausible_employer(&employer))
        .then_some((title, employer))
}

/// Two candidate strings where either may be the title; the one with a title keyword wins.
fn either_order(caps: &Captures<'_>) -> Option<(String, String)> {
    let a = tidy(&caps[1]);
    let b = tidy(&caps[2]);
    if is_title(&a) && is_plausible_employer(&b) && !is_title(&b) {
        return Some((a, b));
    }
    if is_title(&b) && is_plausible_employer(&a) && !is_title(&a) {
        return Some((b, a));
    }
    None
}
