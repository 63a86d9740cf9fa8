//! Plain text and RTF decoding.

use crate::diagnostics::error::{ErrorCode, ParserError};

/// Decodes a plain-text upload. UTF-8 (with or without BOM) and BOM-marked UTF-16 are
/// decoded exactly; anything else is read as Windows-1252, which is what legacy
/// word processors emit for "Save as text".
pub fn decode_text(bytes: &[u8]) -> Result<String, ParserError> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return utf8(rest);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return utf16(rest, u16::from_be_bytes);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => check_not_binary(s.to_string()),
        Err(_) => check_not_binary(bytes.iter().map(|&b| cp1252(b)).collect()),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, ParserError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| text_error(format!("Invalid UTF-8 after BOM: {e}")))
        .and_then(check_not_binary)
}

fn utf16(bytes: &[u8], read: fn([u8; 2]) -> u16) -> Result<String, ParserError> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| read([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units)
        .map_err(|e| text_error(format!("Invalid UTF-16: {e}")))
        .and_then(check_not_binary)
}

fn check_not_binary(text: String) -> Result<String, ParserError> {
    let total = text.chars().count();
    if total == 0 {
        return Ok(text);
    }
    let control = text
        .chars()
        .filter(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\u{c}'))
        .count();
    if control * 10 > total {
        return Err(text_error(format!(
            "Content looks binary ({control} control characters in {total})"
        )));
    }
    Ok(text)
}

fn cp1252(byte: u8) -> char {
    match byte {
        0x80 => '€',
        0x91 => '\'',
        0x92 => '\'',
        0x93 => '"',
        0x94 => '"',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        b => char::from(b),
    }
}

/// Strips RTF control words and groups, keeping the document text.
///
/// Destination groups that never hold body text (font and colour tables, stylesheets,
/// `\*` ignorable destinations, pictures) are skipped wholesale.
pub fn strip_rtf(rtf: &str) -> String {
    const SKIPPED_DESTINATIONS: &[&str] = &[
        "fonttbl", "colortbl", "stylesheet", "info", "pict", "header", "footer", "listtable",
        "listoverridetable", "rsidtbl", "generator", "themedata", "datastore", "xmlnstbl",
    ];

    let chars: Vec<char> = rtf.chars().collect();
    let mut out = String::new();
    // Depth at which a skipped destination started; text is dropped while set.
    let mut skip_until_depth: Option<usize> = None;
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                depth += 1;
                i += 1;
            }
            '}' => {
                if skip_until_depth == Some(depth) {
                    skip_until_depth = None;
                }
                depth = depth.saturating_sub(1);
                i += 1;
            }
            '\\' => {
                i += 1;
                let Some(&next) = chars.get(i) else { break };
                if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();
                    // Optional numeric parameter.
                    if i < chars.len() && (chars[i] == '-' || chars[i].is_ascii_digit()) {
                        i += 1;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                    // A single space delimiter belongs to the control word.
                    if i < chars.len() && chars[i] == ' ' {
                        i += 1;
                    }
                    if skip_until_depth.is_some() {
                        continue;
                    }
                    if SKIPPED_DESTINATIONS.contains(&word.as_str()) {
                        skip_until_depth = Some(depth);
                        continue;
                    }
                    match word.as_str() {
                        "par" | "line" | "row" | "sect" | "page" => out.push('\n'),
                        "tab" | "cell" => out.push(' '),
                        "bullet" => out.push('•'),
                        "emdash" => out.push('—'),
                        "endash" => out.push('–'),
                        "lquote" | "rquote" => out.push('\''),
                        "ldblquote" | "rdblquote" => out.push('"'),
                        _ => {}
                    }
                } else {
                    match next {
                        '*' => {
                            if skip_until_depth.is_none() {
                                skip_until_depth = Some(depth);
                            }
                            i += 1;
                        }
                        '\'' => {
                            let hex: String = chars.iter().skip(i + 1).take(2).collect();
                            i += 1 + hex.len();
                            if skip_until_depth.is_none() {
                                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                                    out.push(cp1252(byte));
                                }
                            }
                        }
                        '\\' | '{' | '}' => {
                            if skip_until_depth.is_none() {
                                out.push(next);
                            }
                            i += 1;
                        }
                        '~' => {
                            if skip_until_depth.is_none() {
                                out.push(' ');
                            }
                            i += 1;
                        }
                        '\n' | '\r' => {
                            if skip_until_depth.is_none() {
                                out.push('\n');
                            }
                            i += 1;
                        }
                        _ => i += 1,
                    }
                }
            }
            '\n' | '\r' => i += 1,
            _ => {
                if skip_until_depth.is_none() && depth > 0 {
                    out.push(c);
                }
                i += 1;
            }
        }
    }
    out
}

fn text_error(message: String) -> ParserError {
    ParserError::new(ErrorCode::TextExtractionFailed, message).with_stage("plaintext")
}
