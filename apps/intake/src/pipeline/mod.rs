//! End-to-end résumé processing.
//!
//! `process` runs ingestion and then `analyze`; `analyze_text` enters at the analysis
//! step with text that was already recovered. Each call owns one `ParsingContext`.

pub mod handlers;
pub mod merge;
pub mod progress;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::confidence::uncertainty::UncertaintyDetector;
use crate::confidence::validation::{validate, ValidationReport};
use crate::confidence::{
    decide, ConfidenceScore, ConfidenceScorer, PlacementDecision, PlacementThresholds,
    ScoringWeights, UncertaintyReport,
};
use crate::diagnostics::context::DEFAULT_LOG_CAPACITY;
use crate::diagnostics::{DiagnosticsReport, ErrorCode, ParserError, ParsingContext};
use crate::ingest::ocr::OcrEngine;
use crate::ingest::{DocumentIngestor, ExtractedText, ExtractionMethod, IngestOptions, RawDocument};
use crate::models::resume::ParsedResumeData;
use crate::parsing::extract_all;
use crate::parsing::models::ExtractionBundle;
use crate::parsing::normalize::normalize;
use crate::parsing::sections::{classify_sections, ClassificationResult};
use crate::parsing::summary::extract_summary;
use progress::ProgressReporter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseOptions {
    pub timeout_ms: u64,
    pub max_file_size_bytes: u64,
    #[serde(rename = "enableOCR")]
    pub enable_ocr: bool,
    pub ocr_language: String,
    pub strict_validation: bool,
    pub retry_attempts: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        let ingest = IngestOptions::default();
        Self {
            timeout_ms: ingest.timeout.as_millis() as u64,
            max_file_size_bytes: ingest.max_file_size_bytes,
            enable_ocr: ingest.enable_ocr,
            ocr_language: ingest.ocr_language,
            strict_validation: false,
            retry_attempts: ingest.retry_attempts,
        }
    }
}

/// Request-supplied options; unset fields keep the service defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseOptionsOverride {
    pub timeout_ms: Option<u64>,
    pub max_file_size_bytes: Option<u64>,
    #[serde(rename = "enableOCR")]
    pub enable_ocr: Option<bool>,
    pub ocr_language: Option<String>,
    pub strict_validation: Option<bool>,
    pub retry_attempts: Option<u32>,
}

impl ParseOptionsOverride {
    pub fn apply(self, base: &ParseOptions) -> ParseOptions {
        ParseOptions {
            timeout_ms: self.timeout_ms.unwrap_or(base.timeout_ms),
            max_file_size_bytes: self.max_file_size_bytes.unwrap_or(base.max_file_size_bytes),
            enable_ocr: self.enable_ocr.unwrap_or(base.enable_ocr),
            ocr_language: self.ocr_language.unwrap_or_else(|| base.ocr_language.clone()),
            strict_validation: self.strict_validation.unwrap_or(base.strict_validation),
            retry_attempts: self.retry_attempts.unwrap_or(base.retry_attempts),
        }
    }
}

/// Service-level pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub defaults: ParseOptions,
    pub retry_base_delay: Duration,
    pub log_capacity: usize,
    pub weights: ScoringWeights,
    pub thresholds: PlacementThresholds,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            defaults: ParseOptions::default(),
            retry_base_delay: IngestOptions::default().retry_base_delay,
            log_capacity: DEFAULT_LOG_CAPACITY,
            weights: ScoringWeights::default(),
            thresholds: PlacementThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub document_id: Uuid,
    pub filename: String,
    pub extraction_method: ExtractionMethod,
    pub char_count: usize,
    pub processing_time_ms: u64,
    pub warnings: Vec<String>,
    pub diagnostics: DiagnosticsReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelligentPlacementResult {
    pub classification: ClassificationResult,
    pub extraction: ExtractionBundle,
    pub validation: ValidationReport,
    pub confidence: ConfidenceScore,
    pub uncertainty: UncertaintyReport,
    pub placement: PlacementDecision,
    pub processed_data: ParsedResumeData,
    pub metadata: ResultMetadata,
}

pub struct ResumePipeline {
    ingestor: DocumentIngestor,
    scorer: ConfidenceScorer,
    detector: UncertaintyDetector,
    thresholds: PlacementThresholds,
    settings: PipelineSettings,
}

impl ResumePipeline {
    pub fn new(ocr: Arc<dyn OcrEngine>, settings: PipelineSettings) -> Self {
        let thresholds = settings.thresholds.clamped();
        Self {
            ingestor: DocumentIngestor::new(ocr),
            scorer: ConfidenceScorer::new(settings.weights),
            detector: UncertaintyDetector::new(&thresholds),
            thresholds,
            settings,
        }
    }

    pub fn defaults(&self) -> &ParseOptions {
        &self.settings.defaults
    }

    fn ingest_options(&self, opts: &ParseOptions) -> IngestOptions {
        IngestOptions {
            timeout: Duration::from_millis(opts.timeout_ms),
            max_file_size_bytes: opts.max_file_size_bytes,
            enable_ocr: opts.enable_ocr,
            ocr_language: opts.ocr_language.clone(),
            retry_attempts: opts.retry_attempts,
            retry_base_delay: self.settings.retry_base_delay,
        }
    }

    pub async fn process(
        &self,
        doc: RawDocument,
        opts: &ParseOptions,
        progress: &mut ProgressReporter,
    ) -> Result<IntelligentPlacementResult, ParserError> {
        let mut ctx = ParsingContext::new(&doc.filename, self.settings.log_capacity);
        ctx.info_with(
            "pipeline",
            "Processing document",
            json!({ "sizeBytes": doc.size_bytes, "strict": opts.strict_validation }),
        );
        progress.report(5, "Validating file");

        let extracted = self
            .ingestor
            .ingest(&doc, &self.ingest_options(opts), &mut ctx)
            .await?;
        // The raw bytes are not needed past text recovery.
        drop(doc);
        progress.report(40, "Text recovered");

        self.analyze(extracted, opts, &mut ctx, progress)
    }

    /// Analysis of already-recovered text.
    pub fn analyze_text(
        &self,
        text: &str,
        filename: &str,
        opts: &ParseOptions,
        progress: &mut ProgressReporter,
    ) -> Result<IntelligentPlacementResult, ParserError> {
        let mut ctx = ParsingContext::new(filename, self.settings.log_capacity);
        progress.report(40, "Text received");
        let extracted = ExtractedText::new(text.to_string(), ExtractionMethod::Plaintext);
        self.analyze(extracted, opts, &mut ctx, progress)
    }

    fn analyze(
        &self,
        extracted: ExtractedText,
        opts: &ParseOptions,
        ctx: &mut ParsingContext,
        progress: &mut ProgressReporter,
    ) -> Result<IntelligentPlacementResult, ParserError> {
        progress.report(45, "Normalizing text");
        let started = Instant::now();
        let normalized = normalize(&extracted.text);
        ctx.finish_span("normalize", "normalize", started);
        if normalized.is_blank() {
            let err = ParserError::new(ErrorCode::InsufficientData, "No readable text after normalization")
                .with_stage("normalize");
            return Err(ctx.record_error("normalize", &err));
        }

        progress.report(55, "Classifying sections");
        let started = Instant::now();
        let classification = classify_sections(&normalized.lines);
        ctx.finish_span("classify", "classify_sections", started);
        ctx.info_with(
            "classify",
            format!("Located {} of 4 expected sections", classification.found.len()),
            json!({ "found": classification.found, "missing": classification.missing }),
        );

        progress.report(70, "Extracting fields");
        let started = Instant::now();
        let extraction = extract_all(&normalized, &classification);
        let summary = extract_summary(&normalized.lines, &classification);
        ctx.finish_span("extract", "extract_fields", started);

        let mut warnings = classification.warnings.clone();
        self.check_sufficiency(&extraction, opts, ctx, &mut warnings)?;

        progress.report(85, "Scoring confidence");
        let validation = validate(&extraction);
        for check in validation.critical_failures() {
            warnings.push(format!(
                "Critical check failed: {}.{}",
                check.section.as_str(),
                check.field
            ));
        }
        let confidence = self.scorer.score(&classification, &extraction, &validation);
        ctx.info_with(
            "score",
            format!("Overall confidence {:.2}", confidence.overall),
            json!(confidence.breakdown),
        );

        progress.report(95, "Deciding placement");
        let uncertainty = self.detector.detect(&extraction, &validation, &confidence);
        let placement = decide(confidence.overall, &uncertainty.fields, &self.thresholds);
        ctx.info("placement", placement.reasoning.clone());

        let processed_data = ParsedResumeData {
            contact: extraction.contact.data.clone(),
            work_experiences: extraction.experience.data.clone(),
            education: extraction.education.data.clone(),
            skills: extraction.skills.data.clone(),
            summary,
        };

        progress.report(100, "Done");
        Ok(IntelligentPlacementResult {
            metadata: ResultMetadata {
                document_id: ctx.document_id(),
                filename: ctx.filename().to_string(),
                extraction_method: extracted.method,
                char_count: extracted.char_count,
                processing_time_ms: ctx.elapsed_ms(),
                warnings,
                diagnostics: ctx.report(),
            },
            classification,
            extraction,
            validation,
            confidence,
            uncertainty,
            placement,
            processed_data,
        })
    }

    /// Missing contact channels or experience: warnings normally, errors in strict mode.
    fn check_sufficiency(
        &self,
        extraction: &ExtractionBundle,
        opts: &ParseOptions,
        ctx: &mut ParsingContext,
        warnings: &mut Vec<String>,
    ) -> Result<(), ParserError> {
        let mut problems = Vec::new();
        if !extraction.contact.data.has_any_channel() {
            problems.push(ParserError::new(
                ErrorCode::ContactInfoMissing,
                "No email address or phone number found",
            ));
        }
        if extraction.experience.data.is_empty() {
            problems.push(ParserError::new(ErrorCode::InsufficientData, "No work experience found"));
        }

        for problem in problems {
            let problem = problem.with_stage("extract");
            if opts.strict_validation {
                return Err(ctx.record_error("extract", &problem));
            }
            ctx.warn("extract", problem.message.clone());
            warnings.push(problem.message);
        }
        Ok(())
    }
}
