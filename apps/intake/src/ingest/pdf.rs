//! Native PDF text-layer extraction via `pdf-extract`.
//!
//! `pdf-extract` is synchronous and may panic on malformed content streams, so the
//! call runs on the blocking pool; a panic surfaces as a `JoinError` and becomes
//! `PDF_EXTRACTION_FAILED` instead of taking the worker down.

use bytes::Bytes;

use crate::diagnostics::error::{ErrorCode, ParserError};
use crate::ingest::detect::find;

pub async fn extract_text_layer(bytes: Bytes) -> Result<String, ParserError> {
    precheck(&bytes)?;

    let size = bytes.len();
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| {
            ParserError::new(
                ErrorCode::PdfExtractionFailed,
                format!("PDF text extraction aborted: {e}"),
            )
            .with_stage("pdf")
        })?;

    let text = extracted.map_err(|e| {
        ParserError::new(
            ErrorCode::PdfExtractionFailed,
            format!("Failed to extract text layer: {e}"),
        )
        .with_stage("pdf")
        .with_detail("size_bytes", size)
    })?;

    if text.trim().is_empty() {
        return Err(ParserError::new(
            ErrorCode::PdfNoTextContent,
            "PDF has no extractable text layer",
        )
        .with_stage("pdf"));
    }

    Ok(text)
}

/// Cheap structural checks before handing bytes to the parser.
pub fn precheck(bytes: &[u8]) -> Result<(), ParserError> {
    let head = &bytes[..bytes.len().min(1024)];
    if find(head, b"%PDF-").is_none() {
        return Err(ParserError::new(
            ErrorCode::PdfInvalidFormat,
            "Missing %PDF- header",
        )
        .with_stage("pdf"));
    }
    if is_encrypted(bytes) {
        return Err(ParserError::new(
            ErrorCode::PdfPasswordProtected,
            "PDF trailer declares an /Encrypt dictionary",
        )
        .with_stage("pdf"));
    }
    Ok(())
}

fn is_encrypted(bytes: &[u8]) -> bool {
    // The /Encrypt key lives in the trailer (or xref stream dictionary), near the end.
    let tail_start = bytes.len().saturating_sub(64 * 1024);
    find(&bytes[tail_start..], b"/Encrypt").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precheck_rejects_missing_header() {
        let err = precheck(b"this is not a pdf").unwrap_err();
        assert_eq!(err.code, ErrorCode::PdfInvalidFormat);
    }

    #[test]
    fn test_precheck_detects_encryption() {
        let pdf = b"%PDF-1.4\n1 0 obj<<>>endobj\ntrailer\n<< /Root 1 0 R /Encrypt 5 0 R >>\n%%EOF";
        let err = precheck(pdf).unwrap_err();
        assert_eq!(err.code, ErrorCode::PdfPasswordProtected);
        assert!(!err.recoverable);
    }

    #[test]
    fn test_precheck_accepts_plain_header() {
        assert!(precheck(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n").is_ok());
    }

    #[tokio::test]
    async fn test_garbage_body_fails_extraction() {
        let err = extract_text_layer(Bytes::from_static(b"%PDF-1.4\nnot really a pdf"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.code,
            ErrorCode::PdfExtractionFailed | ErrorCode::PdfNoTextContent
        ));
    }
}
