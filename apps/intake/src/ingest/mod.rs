//! Document ingestion: file validation, kind detection, text recovery.
//!
//! ```text
//! RawDocument ─ validate ─ detect ─┬─ pdf ──── native text layer ─(<100 chars)─ OCR
//!                                  ├─ docx ─── markup extraction
//!                                  ├─ txt/rtf ─ decode (+ strip RTF)
//!                                  └─ image ── OCR
//! ```
//!
//! Every strategy runs under the retry policy and the whole extraction races one
//! deadline.

pub mod detect;
pub mod docx;
pub mod ocr;
pub mod pdf;
pub mod plaintext;
pub mod retry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::diagnostics::context::ParsingContext;
use crate::diagnostics::error::{ErrorCode, ParserError};
use detect::{detect_file_kind, FileKind};
use ocr::{run_ocr, OcrEngine, OcrInput, OcrSource};
use retry::{retry_with_backoff, with_deadline, RetryPolicy, Strategy};

/// Native text shorter than this (trimmed, in characters) triggers OCR escalation.
pub const ESCALATION_MIN_CHARS: usize = 100;
pub const MAX_TEXT_CHARS: usize = 2_000_000;

#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Bytes,
    pub filename: String,
    pub declared_mime_type: Option<String>,
    pub size_bytes: u64,
}

impl RawDocument {
    pub fn new(bytes: impl Into<Bytes>, filename: &str, declared_mime_type: Option<String>) -> Self {
        let bytes = bytes.into();
        Self {
            size_bytes: bytes.len() as u64,
            bytes,
            filename: filename.to_string(),
            declared_mime_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    NativePdf,
    Ocr,
    Docx,
    Plaintext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedText {
    pub text: String,
    pub method: ExtractionMethod,
    pub char_count: usize,
}

impl ExtractedText {
    pub fn new(text: String, method: ExtractionMethod) -> Self {
        Self {
            char_count: text.chars().count(),
            text,
            method,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    pub timeout: Duration,
    pub max_file_size_bytes: u64,
    pub enable_ocr: bool,
    pub ocr_language: String,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(60_000),
            max_file_size_bytes: 50 * 1024 * 1024,
            enable_ocr: true,
            ocr_language: "eng".to_string(),
            retry_attempts: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl IngestOptions {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_retries(self.retry_attempts, self.retry_base_delay)
    }
}

pub struct DocumentIngestor {
    ocr: Arc<dyn OcrEngine>,
}

impl DocumentIngestor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    pub async fn ingest(
        &self,
        doc: &RawDocument,
        opts: &IngestOptions,
        ctx: &mut ParsingContext,
    ) -> Result<ExtractedText, ParserError> {
        validate(doc, opts).map_err(|e| ctx.record_error("ingest", &e))?;

        let kind = detect_file_kind(&doc.bytes, doc.declared_mime_type.as_deref(), &doc.filename)
            .map_err(|e| ctx.record_error("ingest", &e))?;
        ctx.info_with(
            "ingest",
            format!("Detected {} document", kind.label()),
            json!({ "kind": kind, "sizeBytes": doc.size_bytes }),
        );

        let started = Instant::now();
        let result = with_deadline(opts.timeout, self.extract(kind, doc, opts, ctx)).await;
        let extracted = match result {
            Ok(extracted) => extracted,
            Err(err) if err.code == ErrorCode::TimeoutExceeded => {
                return Err(ctx.record_error("ingest", &err));
            }
            Err(err) => return Err(err.for_document(ctx.document_id(), ctx.filename())),
        };
        ctx.finish_span("ingest", "extract_text", started);

        if extracted.char_count > MAX_TEXT_CHARS {
            let err = ParserError::new(
                ErrorCode::MemoryLimitExceeded,
                format!(
                    "Recovered text has {} characters (limit {MAX_TEXT_CHARS})",
                    extracted.char_count
                ),
            )
            .with_stage("ingest");
            return Err(ctx.record_error("ingest", &err));
        }

        ctx.info_with(
            "ingest",
            "Text recovered",
            json!({ "method": extracted.method, "chars": extracted.char_count }),
        );
        Ok(extracted)
    }

    async fn extract(
        &self,
        kind: FileKind,
        doc: &RawDocument,
        opts: &IngestOptions,
        ctx: &mut ParsingContext,
    ) -> Result<ExtractedText, ParserError> {
        let policy = opts.retry_policy();
        match kind {
            FileKind::Pdf => {
                let native = retry_with_backoff(
                    policy,
                    &NativePdfStrategy {
                        bytes: doc.bytes.clone(),
                    },
                    ctx,
                )
                .await;
                let input = OcrInput {
                    bytes: doc.bytes.clone(),
                    source: OcrSource::Pdf,
                };
                self.escalate(native, ExtractionMethod::NativePdf, input, opts, ctx)
                    .await
            }
            FileKind::Image(format) => {
                if !opts.enable_ocr {
                    let err = ParserError::new(
                        ErrorCode::OcrProcessingFailed,
                        "OCR required but disabled",
                    )
                    .with_stage("ingest")
                    .with_detail("file_kind", kind.label());
                    return Err(ctx.record_error("ingest", &err));
                }
                let strategy = self.ocr_strategy(doc, OcrSource::Image(format), opts);
                let text = retry_with_backoff(policy, &strategy, ctx).await?;
                Ok(ExtractedText::new(text, ExtractionMethod::Ocr))
            }
            FileKind::Docx => {
                let text = retry_with_backoff(
                    policy,
                    &DocxStrategy {
                        bytes: doc.bytes.clone(),
                    },
                    ctx,
                )
                .await?;
                Ok(ExtractedText::new(text, ExtractionMethod::Docx))
            }
            FileKind::PlainText | FileKind::Rtf => {
                let strategy = PlaintextStrategy {
                    bytes: doc.bytes.clone(),
                    rtf: kind == FileKind::Rtf,
                };
                let text = retry_with_backoff(policy, &strategy, ctx).await?;
                Ok(ExtractedText::new(text, ExtractionMethod::Plaintext))
            }
        }
    }

    /// Falls back to OCR when the primary result is short or failed.
    ///
    /// OCR is adopted only when it is strictly longer than the primary text (or the
    /// primary produced nothing); a tie keeps the primary. Structural rejections
    /// (encrypted or malformed PDFs) are returned as-is since OCR cannot read them either.
    async fn escalate(
        &self,
        primary: Result<String, ParserError>,
        primary_method: ExtractionMethod,
        input: OcrInput,
        opts: &IngestOptions,
        ctx: &mut ParsingContext,
    ) -> Result<ExtractedText, ParserError> {
        let primary = match primary {
            Ok(text) if trimmed_len(&text) >= ESCALATION_MIN_CHARS => {
                return Ok(ExtractedText::new(text, primary_method));
            }
            Err(err)
                if matches!(
                    err.code,
                    ErrorCode::PdfPasswordProtected | ErrorCode::PdfInvalidFormat
                ) =>
            {
                return Err(err);
            }
            other => other,
        };

        if !opts.enable_ocr {
            ctx.debug("ingest", "Primary text is short but OCR is disabled");
            return primary.map(|text| ExtractedText::new(text, primary_method));
        }

        let primary_len = primary.as_ref().map(|t| trimmed_len(t)).unwrap_or(0);
        ctx.info(
            "ingest",
            format!("Primary text has {primary_len} characters, escalating to OCR"),
        );

        let strategy = OcrStrategy {
            engine: self.ocr.clone(),
            input,
            language: opts.ocr_language.clone(),
        };
        let ocr = retry_with_backoff(opts.retry_policy(), &strategy, ctx).await;

        match (primary, ocr) {
            (Ok(native), Ok(recognized)) => {
                if trimmed_len(&recognized) > trimmed_len(&native) {
                    Ok(ExtractedText::new(recognized, ExtractionMethod::Ocr))
                } else {
                    ctx.info("ingest", "OCR was not longer than the primary text; keeping primary");
                    Ok(ExtractedText::new(native, primary_method))
                }
            }
            (Err(_), Ok(recognized)) => Ok(ExtractedText::new(recognized, ExtractionMethod::Ocr)),
            (Ok(native), Err(_)) if trimmed_len(&native) > 0 => {
                ctx.warn("ingest", "OCR failed; keeping the short primary text");
                Ok(ExtractedText::new(native, primary_method))
            }
            (Ok(_), Err(ocr_err)) => Err(ocr_err),
            (Err(native_err), Err(ocr_err)) => {
                Err(ocr_err.with_detail("native_error", native_err.code))
            }
        }
    }

    fn ocr_strategy(&self, doc: &RawDocument, source: OcrSource, opts: &IngestOptions) -> OcrStrategy {
        OcrStrategy {
            engine: self.ocr.clone(),
            input: OcrInput {
                bytes: doc.bytes.clone(),
                source,
            },
            language: opts.ocr_language.clone(),
        }
    }
}

/// Size checks that run before any strategy.
fn validate(doc: &RawDocument, opts: &IngestOptions) -> Result<(), ParserError> {
    if doc.bytes.is_empty() || doc.size_bytes == 0 {
        return Err(ParserError::new(ErrorCode::FileEmpty, "Uploaded file has zero bytes")
            .with_stage("validate"));
    }
    if doc.size_bytes > opts.max_file_size_bytes {
        return Err(ParserError::new(
            ErrorCode::FileTooLarge,
            format!(
                "File is {} bytes, limit is {}",
                doc.size_bytes, opts.max_file_size_bytes
            ),
        )
        .with_stage("validate")
        .with_detail("size_bytes", doc.size_bytes)
        .with_detail("max_file_size_bytes", opts.max_file_size_bytes));
    }
    Ok(())
}

fn trimmed_len(text: &str) -> usize {
    text.trim().chars().count()
}

struct NativePdfStrategy {
    bytes: Bytes,
}

#[async_trait]
impl Strategy for NativePdfStrategy {
    type Output = String;

    fn name(&self) -> &'static str {
        "native-pdf"
    }

    async fn run(&self, _attempt: u32, _ctx: &mut ParsingContext) -> Result<String, ParserError> {
        pdf::extract_text_layer(self.bytes.clone()).await
    }
}

struct DocxStrategy {
    bytes: Bytes,
}

#[async_trait]
impl Strategy for DocxStrategy {
    type Output = String;

    fn name(&self) -> &'static str {
        "docx"
    }

    async fn run(&self, _attempt: u32, _ctx: &mut ParsingContext) -> Result<String, ParserError> {
        docx::extract_docx_text(&self.bytes)
    }
}

struct PlaintextStrategy {
    bytes: Bytes,
    rtf: bool,
}

#[async_trait]
impl Strategy for PlaintextStrategy {
    type Output = String;

    fn name(&self) -> &'static str {
        if self.rtf {
            "rtf"
        } else {
            "plaintext"
        }
    }

    async fn run(&self, _attempt: u32, _ctx: &mut ParsingContext) -> Result<String, ParserError> {
        let text = plaintext::decode_text(&self.bytes)?;
        let text = if self.rtf {
            plaintext::strip_rtf(&text)
        } else {
            text
        };
        if text.trim().is_empty() {
            return Err(ParserError::new(
                ErrorCode::TextExtractionFailed,
                "Text file contains no readable characters",
            )
            .with_stage("plaintext"));
        }
        Ok(text)
    }
}

struct OcrStrategy {
    engine: Arc<dyn OcrEngine>,
    input: OcrInput,
    language: String,
}

#[async_trait]
impl Strategy for OcrStrategy {
    type Output = String;

    fn name(&self) -> &'static str {
        "ocr"
    }

    async fn run(&self, _attempt: u32, ctx: &mut ParsingContext) -> Result<String, ParserError> {
        let output = run_ocr(self.engine.as_ref(), &self.input, &self.language, ctx).await?;
        ctx.info(
            "ocr",
            format!("OCR confidence {:.1}", output.confidence),
        );
        Ok(output.text)
    }
}
