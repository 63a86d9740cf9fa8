//! DOCX text extraction.
//!
//! A DOCX file is a ZIP archive of Open XML parts. Body text lives in
//! `word/document.xml`; many résumé templates put the name and contact line in
//! `word/header*.xml`, so headers are read first and prepended.

use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::diagnostics::error::{ErrorCode, ParserError};

pub fn extract_docx_text(bytes: &[u8]) -> Result<String, ParserError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| docx_error(format!("Failed to open DOCX archive: {e}")))?;

    let mut header_parts: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("word/header") && name.ends_with(".xml"))
        .map(String::from)
        .collect();
    header_parts.sort();

    let mut sections = Vec::new();
    for part in &header_parts {
        let xml = read_part(&mut archive, part)?;
        let text = paragraphs_to_text(&xml)?;
        if !text.trim().is_empty() {
            sections.push(text);
        }
    }

    let body = read_part(&mut archive, "word/document.xml")?;
    sections.push(paragraphs_to_text(&body)?);

    Ok(sections.join("\n"))
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, ParserError> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| docx_error(format!("Missing part {name}: {e}")))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| docx_error(format!("Failed to read {name}: {e}")))?;
    Ok(content)
}

/// Flattens WordprocessingML to one line per paragraph.
/// `<w:tab/>` becomes a space and `<w:br/>` a line break; table cells are separated by
/// ` | ` so multi-column layouts keep their fields on one line.
pub fn paragraphs_to_text(xml: &str) -> Result<String, ParserError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut out = String::new();
    let mut paragraph = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => paragraph.push(' '),
                b"br" | b"cr" => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| docx_error(format!("Invalid XML text: {err}")))?;
                paragraph.push_str(&text);
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    out.push_str(paragraph.trim_end());
                    out.push('\n');
                    paragraph.clear();
                }
                b"tc" => {
                    if out.ends_with('\n') {
                        out.pop();
                    }
                    out.push_str(" | ");
                }
                b"tr" => {
                    if out.ends_with(" | ") {
                        out.truncate(out.len() - 3);
                    }
                    out.push('\n');
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(docx_error(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !paragraph.trim().is_empty() {
        out.push_str(paragraph.trim_end());
        out.push('\n');
    }
    Ok(out)
}

fn docx_error(message: String) -> ParserError {
    ParserError::new(ErrorCode::DocxParsingFailed, message).with_stage("docx")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    pub(crate) fn build_docx(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, content) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn document(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        )
    }

    #[test]
    fn test_paragraphs_become_lines() {
        let xml = document(
            "<w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>\
             <w:p><w:r><w:t xml:space=\"preserve\">Senior </w:t></w:r><w:r><w:t>Engineer</w:t></w:r></w:p>",
        );
        let text = paragraphs_to_text(&xml).unwrap();
        assert_eq!(text, "Jane Doe\nSenior Engineer\n");
    }

    #[test]
    fn test_tabs_breaks_and_entities() {
        let xml = document(
            "<w:p><w:r><w:t>R&amp;D</w:t><w:tab/><w:t>Lead</w:t><w:br/><w:t>2020</w:t></w:r></w:p>",
        );
        let text = paragraphs_to_text(&xml).unwrap();
        assert_eq!(text, "R&D Lead\n2020\n");
    }

    #[test]
    fn test_headers_are_prepended() {
        let body = document("<w:p><w:r><w:t>EXPERIENCE</w:t></w:r></w:p>");
        let bytes = build_docx(&[
            ("word/document.xml", body.as_str()),
            (
                "word/header1.xml",
                r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p><w:r><w:t>jane@example.com</w:t></w:r></w:p></w:hdr>"#,
            ),
        ]);
        let text = extract_docx_text(&bytes).unwrap();
        assert!(text.starts_with("jane@example.com\n"));
        assert!(text.contains("EXPERIENCE"));
    }

    #[test]
    fn test_table_cells_share_a_line() {
        let xml = document(
            "<w:tbl><w:tr>\
             <w:tc><w:p><w:r><w:t>Acme Inc</w:t></w:r></w:p></w:tc>\
             <w:tc><w:p><w:r><w:t>2019 - Present</w:t></w:r></w:p></w:tc>\
             </w:tr></w:tbl>",
        );
        let text = paragraphs_to_text(&xml).unwrap();
        assert_eq!(text, "Acme Inc | 2019 - Present\n");
    }

    #[test]
    fn test_missing_document_part_fails() {
        let bytes = build_docx(&[("word/styles.xml", "<w:styles/>")]);
        let err = extract_docx_text(&bytes).unwrap_err();
        assert_eq!(err.code, ErrorCode::DocxParsingFailed);
        assert!(err.recoverable);
    }

    #[test]
    fn test_not_a_zip_fails() {
        let err = extract_docx_text(b"definitely not a zip").unwrap_err();
        assert_eq!(err.code, ErrorCode::DocxParsingFailed);
    }
}
