//! File-kind detection.
//!
//! Magic bytes win over the declared MIME type, which wins over the extension.
//! Browsers routinely send `application/octet-stream` for résumé uploads, so the
//! declared type alone is never trusted.

use serde::{Deserialize, Serialize};

use crate::diagnostics::error::{ErrorCode, ParserError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Tiff,
    Bmp,
    Webp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Pdf,
    Docx,
    PlainText,
    Rtf,
    Image(ImageFormat),
}

impl FileKind {
    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::PlainText => "plaintext",
            FileKind::Rtf => "rtf",
            FileKind::Image(_) => "image",
        }
    }
}

pub fn detect_file_kind(
    bytes: &[u8],
    declared_mime: Option<&str>,
    filename: &str,
) -> Result<FileKind, ParserError> {
    if let Some(kind) = sniff_magic(bytes) {
        return Ok(kind);
    }

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if extension == "doc" || declared_mime == Some("application/msword") {
        return Err(unsupported(
            "Legacy .doc files are not supported; save the document as DOCX or PDF",
            declared_mime,
            filename,
        ));
    }

    if let Some(kind) = declared_mime.and_then(kind_from_mime) {
        return Ok(kind);
    }
    if let Some(kind) = kind_from_extension(&extension) {
        return Ok(kind);
    }
    if looks_like_text(bytes) {
        return Ok(FileKind::PlainText);
    }

    Err(unsupported(
        "Could not determine a supported document type",
        declared_mime,
        filename,
    ))
}

fn sniff_magic(bytes: &[u8]) -> Option<FileKind> {
    let head = &bytes[..bytes.len().min(1024)];
    if find(head, b"%PDF-").is_some() {
        return Some(FileKind::Pdf);
    }
    if bytes.starts_with(b"PK\x03\x04") {
        // Any OOXML container carries its part names in the local headers.
        if find(bytes, b"word/").is_some() {
            return Some(FileKind::Docx);
        }
        return None;
    }
    if head.starts_with(b"{\\rtf") {
        return Some(FileKind::Rtf);
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(FileKind::Image(ImageFormat::Png));
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(FileKind::Image(ImageFormat::Jpeg));
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(FileKind::Image(ImageFormat::Gif));
    }
    if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        return Some(FileKind::Image(ImageFormat::Tiff));
    }
    if is_bmp(bytes) {
        return Some(FileKind::Image(ImageFormat::Bmp));
    }
    if bytes.len() > 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(FileKind::Image(ImageFormat::Webp));
    }
    None
}

/// "BM" alone is too weak: plain text can start with it. Requires zeroed reserved
/// bytes and a known DIB header size.
fn is_bmp(bytes: &[u8]) -> bool {
    if bytes.len() < 18 || !bytes.starts_with(b"BM") || bytes[6..10] != [0, 0, 0, 0] {
        return false;
    }
    let dib_size = u32::from_le_bytes([bytes[14], bytes[15], bytes[16], bytes[17]]);
    matches!(dib_size, 12 | 40 | 52 | 56 | 64 | 108 | 124)
}

fn kind_from_mime(mime: &str) -> Option<FileKind> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence {
        "application/pdf" => Some(FileKind::Pdf),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            Some(FileKind::Docx)
        }
        "application/rtf" | "text/rtf" => Some(FileKind::Rtf),
        "text/plain" | "text/markdown" => Some(FileKind::PlainText),
        "image/png" => Some(FileKind::Image(ImageFormat::Png)),
        "image/jpeg" | "image/jpg" => Some(FileKind::Image(ImageFormat::Jpeg)),
        "image/gif" => Some(FileKind::Image(ImageFormat::Gif)),
        "image/tiff" => Some(FileKind::Image(ImageFormat::Tiff)),
        "image/bmp" => Some(FileKind::Image(ImageFormat::Bmp)),
        "image/webp" => Some(FileKind::Image(ImageFormat::Webp)),
        _ => None,
    }
}

fn kind_from_extension(ext: &str) -> Option<FileKind> {
    match ext {
        "pdf" => Some(FileKind::Pdf),
        "docx" => Some(FileKind::Docx),
        "rtf" => Some(FileKind::Rtf),
        "txt" | "text" | "md" => Some(FileKind::PlainText),
        "png" => Some(FileKind::Image(ImageFormat::Png)),
        "jpg" | "jpeg" => Some(FileKind::Image(ImageFormat::Jpeg)),
        "gif" => Some(FileKind::Image(ImageFormat::Gif)),
        "tif" | "tiff" => Some(FileKind::Image(ImageFormat::Tiff)),
        "bmp" => Some(FileKind::Image(ImageFormat::Bmp)),
        "webp" => Some(FileKind::Image(ImageFormat::Webp)),
        _ => None,
    }
}

/// Heuristic for extension-less uploads: mostly printable, no NULs in the sample.
fn looks_like_text(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(4096)];
    if sample.is_empty() || sample.contains(&0) {
        return false;
    }
    let printable = sample
        .iter()
        .filter(|b| b.is_ascii_graphic() || b.is_ascii_whitespace() || **b >= 0x80)
        .count();
    printable * 100 / sample.len() >= 95
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn unsupported(message: &str, declared_mime: Option<&str>, filename: &str) -> ParserError {
    ParserError::new(ErrorCode::FileTypeUnsupported, message)
        .with_stage("detect")
        .with_detail("declared_mime", declared_mime.unwrap_or("none"))
        .with_detail("filename", filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_magic_beats_wrong_mime() {
        let kind = detect_file_kind(b"%PDF-1.7\n...", Some("text/plain"), "cv.txt").unwrap();
        assert_eq!(kind, FileKind::Pdf);
    }

    #[test]
    fn test_png_magic() {
        let bytes = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        let kind = detect_file_kind(bytes, None, "scan").unwrap();
        assert_eq!(kind, FileKind::Image(ImageFormat::Png));
    }

    #[test]
    fn test_rtf_magic() {
        let kind = detect_file_kind(b"{\\rtf1\\ansi hello}", None, "cv.rtf").unwrap();
        assert_eq!(kind, FileKind::Rtf);
    }

    #[test]
    fn test_zip_without_word_part_falls_back_to_extension() {
        let kind = detect_file_kind(b"PK\x03\x04xl/workbook.xml", None, "cv.docx").unwrap();
        assert_eq!(kind, FileKind::Docx);
    }

    #[test]
    fn test_text_starting_with_bm_is_not_a_bitmap() {
        let text = b"BMW Group Software Engineer\nJane Doe\njane@example.com\n";
        let kind = detect_file_kind(text, Some("text/plain"), "resume.txt").unwrap();
        assert_eq!(kind, FileKind::PlainText);
    }

    #[test]
    fn test_bmp_magic_with_dib_header() {
        let mut bytes = b"BM".to_vec();
        bytes.extend_from_slice(&[0x46, 0, 0, 0]); // file size
        bytes.extend_from_slice(&[0, 0, 0, 0]); // reserved
        bytes.extend_from_slice(&[0x36, 0, 0, 0]); // pixel offset
        bytes.extend_from_slice(&[40, 0, 0, 0]); // BITMAPINFOHEADER
        bytes.extend_from_slice(&[0; 8]);
        let kind = detect_file_kind(&bytes, None, "scan").unwrap();
        assert_eq!(kind, FileKind::Image(ImageFormat::Bmp));
    }

    #[test]
    fn test_legacy_doc_rejected() {
        let err = detect_file_kind(b"\xD0\xCF\x11\xE0garbage", None, "resume.DOC").unwrap_err();
        assert_eq!(err.code, ErrorCode::FileTypeUnsupported);
    }

    #[test]
    fn test_mime_with_parameters() {
        let kind = detect_file_kind(b"John Smith", Some("text/plain; charset=utf-8"), "x").unwrap();
        assert_eq!(kind, FileKind::PlainText);
    }

    #[test]
    fn test_extensionless_text_sniffed() {
        let kind = detect_file_kind(b"Jane Doe\njane@example.com\n", None, "upload").unwrap();
        assert_eq!(kind, FileKind::PlainText);
    }

    #[test]
    fn test_binary_garbage_is_unsupported() {
        let err = detect_file_kind(&[0u8, 1, 2, 3, 0, 0, 7], None, "blob.bin").unwrap_err();
        assert_eq!(err.code, ErrorCode::FileTypeUnsupported);
    }
}
