use crate::parsing::sections::{ClassificationResult, SectionType};

const MIN_PROSE_WORDS: usize = 12;

/// The summary section text, or failing that the first prose line of the preamble.
pub fn extract_summary(lines: &[String], classification: &ClassificationResult) -> String {
    if let Some(span) = classification.sections.get(&SectionType::Summary) {
        if !span.content.is_empty() {
            return span.content.clone();
        }
    }

    let preamble_end = classification
        .sections
        .values()
        .filter(|s| !s.inferred)
        .map(|s| s.start_line)
        .min()
        .unwrap_or(lines.len());

    lines[..preamble_end.min(lines.len())]
        .iter()
        .map(|l| l.trim())
        .find(|l| is_prose(l))
        .map(str::to_string)
        .unwrap_or_default()
}

fn is_prose(line: &str) -> bool {
    line.split_whitespace().count() >= MIN_PROSE_WORDS
        && !line.contains('@')
        && !line.contains("http")
        && line.chars().filter(char::is_ascii_digit).count() < 7
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::sections::classify_sections;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_summary_section_wins() {
        let doc = lines("Jane Doe\nSUMMARY\nBackend engineer who likes queues.\nSKILLS\nRust");
        let classification = classify_sections(&doc);
        assert_eq!(
            extract_summary(&doc, &classification),
            "Backend engineer who likes queues."
        );
    }

    #[test]
    fn test_preamble_prose_fallback() {
        let doc = lines(
            "Jane Doe\njane@doe.dev | 555-123-4567\nSeasoned platform engineer with a decade of experience running large distributed systems in production.\nEXPERIENCE\nEngineer at Acme",
        );
        let classification = classify_sections(&doc);
        assert!(extract_summary(&doc, &classification).starts_with("Seasoned platform engineer"));
    }

    #[test]
    fn test_no_summary() {
        let doc = lines("Jane Doe\nEXPERIENCE\nEngineer at Acme, responsible for many many things in many many places");
        let classification = classify_sections(&doc);
        assert_eq!(extract_summary(&doc, &classification), "");
    }
}
