//! Canonical line-oriented text.
//!
//! Output guarantees: `\n` line breaks only, no trailing whitespace on any line, runs of
//! inline whitespace collapsed to one space, at most one blank line in a row, bullets
//! written as `• `.

use std::sync::LazyLock;

use regex::Regex;

static INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static BULLET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[•●○◦▪▫■□‣⁃∙·➢➤►▶✓✔❖]|[-*+](?:\s))\s*").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    pub lines: Vec<String>,
}

impl NormalizedText {
    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.is_empty())
    }
}

pub fn normalize(raw: &str) -> NormalizedText {
    let unified: String = raw
        .replace("\r\n", "\n")
        .chars()
        .filter_map(|c| match c {
            '\r' | '\u{000C}' | '\u{000B}' | '\u{2028}' | '\u{2029}' | '\u{0085}' => Some('\n'),
            '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => Some(' '),
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00AD}' => None,
            '\t' => Some(' '),
            c if c.is_control() && c != '\n' => None,
            c => Some(c),
        })
        .collect();

    let mut lines: Vec<String> = Vec::new();
    for line in unified.split('\n') {
        let collapsed = INLINE_SPACE.replace_all(line.trim(), " ");
        let bullet_end = BULLET_PREFIX.find(&collapsed).map(|m| m.end());
        let line = match bullet_end {
            Some(end) if end < collapsed.len() => format!("• {}", &collapsed[end..]),
            Some(_) => String::new(),
            None => collapsed.into_owned(),
        };
        if line.is_empty() && lines.last().map_or(true, |prev| prev.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    NormalizedText {
        text: lines.join("\n"),
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_endings_and_whitespace() {
        let out = normalize("John\r\nSmith\rEngineer\u{000C}Acme\t\tInc   \n");
        assert_eq!(out.lines, vec!["John", "Smith", "Engineer", "Acme Inc"]);
    }

    #[test]
    fn test_blank_lines_collapse() {
        let out = normalize("\n\n\nSKILLS\n\n\n\nRust\n\n");
        assert_eq!(out.text, "SKILLS\n\nRust");
    }

    #[test]
    fn test_unicode_spaces_and_zero_width() {
        let out = normalize("Jane\u{00A0}Doe\u{200B}\u{2003}PM");
        assert_eq!(out.text, "Jane Doe PM");
    }

    #[test]
    fn test_bullets_are_canonical() {
        let out = normalize("● Led team\n- Shipped v2\n* Cut costs\n➤Hired 5\n-5% churn");
        assert_eq!(
            out.lines,
            vec!["• Led team", "• Shipped v2", "• Cut costs", "• Hired 5", "-5% churn"]
        );
    }

    #[test]
    fn test_lone_bullet_becomes_blank() {
        let out = normalize("Rust\n•\nGo");
        assert_eq!(out.lines, vec!["Rust", "", "Go"]);
    }

    #[test]
    fn test_blank_input() {
        assert!(normalize(" \n\t\n").is_blank());
    }
}
