//! Ordered extraction rules.
//!
//! A `RuleChain` is a priority-ordered list of `(pattern, transform)` pairs. Rules are
//! tried in order and every match of a rule is offered to its transform; the first
//! transform that accepts a match wins. Put the most specific patterns first.

use std::ops::Range;

use regex::{Captures, Regex};

pub type Transform<T> = fn(&Captures<'_>) -> Option<T>;

pub struct Rule<T> {
    pub name: &'static str,
    pattern: Regex,
    transform: Transform<T>,
}

impl<T> Rule<T> {
    /// Rules are built from literal patterns inside `LazyLock` statics.
    pub fn new(name: &'static str, pattern: &str, transform: Transform<T>) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            transform,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch<T> {
    pub value: T,
    pub rule: &'static str,
    /// Byte range of the whole match in the searched text.
    pub span: Range<usize>,
}

pub struct RuleChain<T> {
    rules: Vec<Rule<T>>,
}

impl<T> RuleChain<T> {
    pub fn new(rules: Vec<Rule<T>>) -> Self {
        Self { rules }
    }

    pub fn first_match(&self, text: &str) -> Option<RuleMatch<T>> {
        for rule in &self.rules {
            for caps in rule.pattern.captures_iter(text) {
                if let Some(value) = (rule.transform)(&caps) {
                    let span = caps.get(0).map_or(0..0, |m| m.range());
                    return Some(RuleMatch {
                        value,
                        rule: rule.name,
                        span,
                    });
                }
            }
        }
        None
    }
}

/// Transform that returns the first capture group, trimmed, if non-empty.
pub fn group_one(caps: &Captures<'_>) -> Option<String> {
    caps.get(1)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn even_number(caps: &Captures<'_>) -> Option<u32> {
        caps[0].parse::<u32>().ok().filter(|n| n % 2 == 0)
    }

    fn chain() -> RuleChain<u32> {
        RuleChain::new(vec![
            Rule::new("labeled", r"id:\s*(\d+)", |c| c[1].parse().ok()),
            Rule::new("even", r"\d+", even_number),
        ])
    }

    #[test]
    fn test_earlier_rule_wins_even_if_later_in_text() {
        let m = chain().first_match("7 10 id: 3").unwrap();
        assert_eq!(m.value, 3);
        assert_eq!(m.rule, "labeled");
        assert_eq!(m.span, 5..10);
    }

    #[test]
    fn test_rejected_matches_fall_through() {
        let m = chain().first_match("7 9 12").unwrap();
        assert_eq!(m.value, 12);
        assert_eq!(m.rule, "even");
    }

    #[test]
    fn test_no_match() {
        assert!(chain().first_match("nothing here").is_none());
        assert!(chain().first_match("3 5").is_none());
    }
}
