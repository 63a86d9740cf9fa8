//! Parser error taxonomy.
//!
//! Every failure the pipeline can raise maps to one `ErrorCode`. The code fixes the
//! severity, the default recoverability, and the message shown to end users, so the
//! HTTP layer and the builder UI never need to interpret internal messages.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FileNotProvided,
    FileEmpty,
    FileTooLarge,
    FileTypeUnsupported,
    PdfInvalidFormat,
    PdfPasswordProtected,
    PdfNoTextContent,
    PdfExtractionFailed,
    OcrInitializationFailed,
    OcrProcessingFailed,
    DocxParsingFailed,
    TextExtractionFailed,
    InsufficientData,
    ContactInfoMissing,
    TimeoutExceeded,
    MemoryLimitExceeded,
    UnknownError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FileNotProvided => "FILE_NOT_PROVIDED",
            ErrorCode::FileEmpty => "FILE_EMPTY",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::FileTypeUnsupported => "FILE_TYPE_UNSUPPORTED",
            ErrorCode::PdfInvalidFormat => "PDF_INVALID_FORMAT",
            ErrorCode::PdfPasswordProtected => "PDF_PASSWORD_PROTECTED",
            ErrorCode::PdfNoTextContent => "PDF_NO_TEXT_CONTENT",
            ErrorCode::PdfExtractionFailed => "PDF_EXTRACTION_FAILED",
            ErrorCode::OcrInitializationFailed => "OCR_INITIALIZATION_FAILED",
            ErrorCode::OcrProcessingFailed => "OCR_PROCESSING_FAILED",
            ErrorCode::DocxParsingFailed => "DOCX_PARSING_FAILED",
            ErrorCode::TextExtractionFailed => "TEXT_EXTRACTION_FAILED",
            ErrorCode::InsufficientData => "INSUFFICIENT_DATA",
            ErrorCode::ContactInfoMissing => "CONTACT_INFO_MISSING",
            ErrorCode::TimeoutExceeded => "TIMEOUT_EXCEEDED",
            ErrorCode::MemoryLimitExceeded => "MEMORY_LIMIT_EXCEEDED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::InsufficientData | ErrorCode::ContactInfoMissing => Severity::Low,
            ErrorCode::PdfNoTextContent
            | ErrorCode::OcrProcessingFailed
            | ErrorCode::DocxParsingFailed
            | ErrorCode::TextExtractionFailed => Severity::Medium,
            ErrorCode::MemoryLimitExceeded => Severity::Critical,
            _ => Severity::High,
        }
    }

    /// Whether the caller may retry the upload with different options.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCode::OcrInitializationFailed
                | ErrorCode::OcrProcessingFailed
                | ErrorCode::DocxParsingFailed
                | ErrorCode::TextExtractionFailed
                | ErrorCode::InsufficientData
                | ErrorCode::ContactInfoMissing
                | ErrorCode::TimeoutExceeded
                | ErrorCode::UnknownError
        )
    }

    /// Whether the ingestion retry loop should try the same strategy again.
    /// Deterministic rejections (bad header, encryption, oversize) never change on retry.
    pub fn retryable(&self) -> bool {
        !matches!(
            self,
            ErrorCode::FileNotProvided
                | ErrorCode::FileEmpty
                | ErrorCode::FileTooLarge
                | ErrorCode::FileTypeUnsupported
                | ErrorCode::PdfInvalidFormat
                | ErrorCode::PdfPasswordProtected
                | ErrorCode::PdfNoTextContent
                | ErrorCode::OcrInitializationFailed
                | ErrorCode::MemoryLimitExceeded
                | ErrorCode::TimeoutExceeded
        )
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::FileNotProvided => "Please choose a resume file to upload.",
            ErrorCode::FileEmpty => "The uploaded file is empty. Please check the file and try again.",
            ErrorCode::FileTooLarge => "The file is too large. Please upload a smaller resume file.",
            ErrorCode::FileTypeUnsupported => {
                "This file type is not supported. Please upload a PDF, DOCX, TXT, RTF, or image file."
            }
            ErrorCode::PdfInvalidFormat => "This PDF appears to be damaged or is not a valid PDF file.",
            ErrorCode::PdfPasswordProtected => {
                "This PDF is password protected. Please remove the password and upload it again."
            }
            ErrorCode::PdfNoTextContent => {
                "We could not find any text in this PDF. Try enabling text recognition or upload a different file."
            }
            ErrorCode::PdfExtractionFailed => "We could not read the text in this PDF.",
            ErrorCode::OcrInitializationFailed => {
                "Text recognition is unavailable right now. Please try again or upload a text-based file."
            }
            ErrorCode::OcrProcessingFailed => {
                "We could not recognise text in this document. A clearer scan or a text-based file may work better."
            }
            ErrorCode::DocxParsingFailed => {
                "We could not read this Word document. Try saving it again or exporting it as PDF."
            }
            ErrorCode::TextExtractionFailed => "We could not read this text file.",
            ErrorCode::InsufficientData => {
                "We found very little resume information in this file. Please review and fill in the missing sections."
            }
            ErrorCode::ContactInfoMissing => {
                "We could not find your contact details. Please add them manually."
            }
            ErrorCode::TimeoutExceeded => {
                "Processing took too long. Please try again, or upload a simpler file."
            }
            ErrorCode::MemoryLimitExceeded => "This document is too complex to process.",
            ErrorCode::UnknownError => "Something went wrong while reading your resume. Please try again.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an error happened. Filled in by the stage that raises it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message}")]
pub struct ParserError {
    pub code: ErrorCode,
    pub message: String,
    pub severity: Severity,
    pub context: ErrorContext,
    pub recoverable: bool,
    pub user_message: String,
}

impl ParserError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: code.severity(),
            context: ErrorContext::default(),
            recoverable: code.recoverable(),
            user_message: code.user_message().to_string(),
        }
    }

    pub fn with_stage(mut self, stage: &str) -> Self {
        self.context.stage = Some(stage.to_string());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl ToString) -> Self {
        self.context.details.insert(key.to_string(), value.to_string());
        self
    }

    /// Binds the error to a document, keeping any stage/details already set.
    pub fn for_document(mut self, document_id: Uuid, filename: &str) -> Self {
        self.context.document_id.get_or_insert(document_id);
        if self.context.filename.is_none() {
            self.context.filename = Some(filename.to_string());
        }
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.code.retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_validation_errors_are_not_recoverable() {
        for code in [
            ErrorCode::FileNotProvided,
            ErrorCode::FileEmpty,
            ErrorCode::FileTooLarge,
            ErrorCode::FileTypeUnsupported,
        ] {
            assert!(!code.recoverable(), "{code} should not be recoverable");
            assert!(!code.retryable());
        }
    }

    #[test]
    fn test_ocr_errors_are_recoverable() {
        assert!(ErrorCode::OcrProcessingFailed.recoverable());
        assert!(ErrorCode::OcrInitializationFailed.recoverable());
    }

    #[test]
    fn test_password_protected_is_final() {
        let err = ParserError::new(ErrorCode::PdfPasswordProtected, "encrypted");
        assert!(!err.recoverable);
        assert!(!err.is_retryable());
        assert_eq!(err.severity, Severity::High);
    }

    #[test]
    fn test_user_message_is_independent_of_internal_message() {
        let err = ParserError::new(ErrorCode::DocxParsingFailed, "zip: invalid central directory");
        assert!(!err.user_message.contains("zip"));
        assert!(err.user_message.contains("Word document"));
    }

    #[test]
    fn test_code_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::OcrProcessingFailed).unwrap();
        assert_eq!(json, "\"OCR_PROCESSING_FAILED\"");
        assert_eq!(ErrorCode::OcrProcessingFailed.to_string(), "OCR_PROCESSING_FAILED");
    }

    #[test]
    fn test_for_document_keeps_existing_stage() {
        let id = Uuid::new_v4();
        let err = ParserError::new(ErrorCode::FileEmpty, "zero bytes")
            .with_stage("validate")
            .for_document(id, "cv.pdf");
        assert_eq!(err.context.stage.as_deref(), Some("validate"));
        assert_eq!(err.context.document_id, Some(id));
        assert_eq!(err.context.filename.as_deref(), Some("cv.pdf"));
    }

    #[test]
    fn test_data_sufficiency_errors_are_low_severity() {
        assert_eq!(ErrorCode::InsufficientData.severity(), Severity::Low);
        assert_eq!(ErrorCode::ContactInfoMissing.severity(), Severity::Low);
        assert_eq!(ErrorCode::MemoryLimitExceeded.severity(), Severity::Critical);
    }
}
