//! OCR recognition.
//!
//! The recognizer sits behind `OcrEngine` so the escalation logic can run against a
//! scripted engine in tests. The production engine shells out to the `tesseract` CLI
//! (TSV output, which carries per-word confidence) and rasterises scanned PDFs with
//! `pdftoppm` first.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use serde_json::json;
use tokio::process::Command;

use crate::diagnostics::context::ParsingContext;
use crate::diagnostics::error::{ErrorCode, ParserError};
use crate::ingest::detect::ImageFormat;

/// Recovered text shorter than this is treated as a failed recognition.
pub const MIN_OCR_CHARS: usize = 20;
pub const GOOD_ENOUGH_MIN_CHARS: usize = 200;
pub const GOOD_ENOUGH_MIN_CONFIDENCE: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrConfig {
    pub name: &'static str,
    /// tesseract `--psm`
    pub page_seg_mode: u8,
    /// tesseract `--oem`
    pub engine_mode: u8,
    /// Rasterisation resolution for PDF pages.
    pub dpi: u32,
}

/// Tried in order. Accuracy first, then a mode for column-heavy layouts, then a
/// sparse-text fallback that finds something on noisy scans.
pub const OCR_CONFIGS: [OcrConfig; 3] = [
    OcrConfig {
        name: "high_accuracy",
        page_seg_mode: 3,
        engine_mode: 1,
        dpi: 300,
    },
    OcrConfig {
        name: "document_layout",
        page_seg_mode: 4,
        engine_mode: 1,
        dpi: 300,
    },
    OcrConfig {
        name: "fallback",
        page_seg_mode: 11,
        engine_mode: 3,
        dpi: 200,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrSource {
    Image(ImageFormat),
    Pdf,
}

#[derive(Debug, Clone)]
pub struct OcrInput {
    pub bytes: Bytes,
    pub source: OcrSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    /// Mean word confidence, 0–100.
    pub confidence: f64,
}

impl OcrOutput {
    fn text_len(&self) -> usize {
        self.text.trim().chars().count()
    }
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(
        &self,
        input: &OcrInput,
        config: &OcrConfig,
        language: &str,
    ) -> Result<OcrOutput, ParserError>;

    fn name(&self) -> &'static str;
}

/// Passes the length and confidence bar that ends the configuration sweep early.
pub fn is_good_enough(output: &OcrOutput) -> bool {
    output.text_len() >= GOOD_ENOUGH_MIN_CHARS && output.confidence >= GOOD_ENOUGH_MIN_CONFIDENCE
}

/// Longer text wins; confidence breaks ties.
pub fn is_better(candidate: &OcrOutput, current: &OcrOutput) -> bool {
    match candidate.text_len().cmp(&current.text_len()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate.confidence > current.confidence,
    }
}

/// Runs every configuration in `OCR_CONFIGS` until one is good enough, keeping the best
/// cleaned result. An initialization failure aborts the sweep since no other
/// configuration can succeed without the engine.
pub async fn run_ocr(
    engine: &dyn OcrEngine,
    input: &OcrInput,
    language: &str,
    ctx: &mut ParsingContext,
) -> Result<OcrOutput, ParserError> {
    let mut best: Option<OcrOutput> = None;
    let mut last_error: Option<ParserError> = None;

    for config in OCR_CONFIGS.iter() {
        let started = Instant::now();
        match engine.recognize(input, config, language).await {
            Ok(raw) => {
                let output = OcrOutput {
                    text: clean_ocr_text(&raw.text),
                    confidence: raw.confidence.clamp(0.0, 100.0),
                };
                ctx.finish_span("ocr", config.name, started);
                ctx.info_with(
                    "ocr",
                    format!("{} pass finished", config.name),
                    json!({
                        "engine": engine.name(),
                        "chars": output.text_len(),
                        "confidence": output.confidence,
                    }),
                );
                let good_enough = is_good_enough(&output);
                if best.as_ref().map_or(true, |current| is_better(&output, current)) {
                    best = Some(output);
                }
                if good_enough {
                    ctx.debug("ocr", format!("{} result is good enough, stopping", config.name));
                    break;
                }
            }
            Err(err) => {
                let err = ctx.record_error("ocr", &err.with_detail("config", config.name));
                if err.code == ErrorCode::OcrInitializationFailed {
                    return Err(err);
                }
                last_error = Some(err);
            }
        }
    }

    match best {
        Some(output) if output.text_len() >= MIN_OCR_CHARS => Ok(output),
        Some(output) => Err(ParserError::new(
            ErrorCode::OcrProcessingFailed,
            format!(
                "OCR recovered only {} characters (minimum {MIN_OCR_CHARS})",
                output.text_len()
            ),
        )
        .with_stage("ocr")),
        None => Err(last_error.unwrap_or_else(|| {
            ParserError::new(ErrorCode::OcrProcessingFailed, "OCR produced no output")
                .with_stage("ocr")
        })),
    }
}

const CHARACTER_FIXES: [(&str, &str); 9] = [
    ("\u{FB00}", "ff"),
    ("\u{FB01}", "fi"),
    ("\u{FB02}", "fl"),
    ("\u{FB03}", "ffi"),
    ("\u{FB04}", "ffl"),
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("\u{201C}", "\""),
    ("\u{201D}", "\""),
];

static INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static EXTRA_BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Repairs common recognizer confusions and strips scanner noise.
pub fn clean_ocr_text(raw: &str) -> String {
    let mut text = raw.to_string();
    for (from, to) in CHARACTER_FIXES {
        text = text.replace(from, to);
    }

    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            let line = INLINE_SPACE.replace_all(line.trim(), " ");
            line.split(' ').map(fix_digit_confusions).collect::<Vec<_>>().join(" ")
        })
        .filter(|line| !is_noise_line(line))
        .collect();

    let joined = lines.join("\n");
    EXTRA_BLANK_LINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// In tokens that are otherwise numeric (years, phone numbers, dates), letters the
/// recognizer commonly confuses with digits are mapped back.
fn fix_digit_confusions(token: &str) -> String {
    let digits = token.chars().filter(char::is_ascii_digit).count();
    let numeric_shape = token
        .chars()
        .all(|c| c.is_ascii_digit() || is_confusable(c) || "-/.()+".contains(c));
    if digits < 2 || !numeric_shape {
        return token.to_string();
    }
    token
        .chars()
        .map(|c| match c {
            'O' | 'o' => '0',
            'l' | 'I' | '|' => '1',
            'S' => '5',
            other => other,
        })
        .collect()
}

fn is_confusable(c: char) -> bool {
    matches!(c, 'O' | 'o' | 'l' | 'I' | '|' | 'S')
}

fn is_noise_line(line: &str) -> bool {
    let visible: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    if visible.is_empty() {
        return false;
    }
    let alnum = visible.iter().filter(|c| c.is_alphanumeric()).count();
    // Bullets alone are layout, not noise.
    if visible.len() == 1 && visible[0] == '•' {
        return false;
    }
    alnum * 10 < visible.len() * 3
}

/// Parses tesseract TSV output into line-ordered text and the mean word confidence.
/// Words are grouped by (page, block, paragraph, line); a new block or paragraph
/// starts a blank line.
pub fn parse_tsv(tsv: &str) -> OcrOutput {
    let mut text = String::new();
    let mut current_line: Option<(u32, u32, u32, u32)> = None;
    let mut confidence_sum = 0.0;
    let mut words = 0usize;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let word = cols[11].trim();
        let conf: f64 = cols[10].trim().parse().unwrap_or(-1.0);
        if word.is_empty() || conf < 0.0 {
            continue;
        }
        let key = (
            cols[1].parse().unwrap_or(0),
            cols[2].parse().unwrap_or(0),
            cols[3].parse().unwrap_or(0),
            cols[4].parse().unwrap_or(0),
        );
        match current_line {
            Some(prev) if prev == key => text.push(' '),
            Some(prev) => {
                text.push('\n');
                if (prev.0, prev.1, prev.2) != (key.0, key.1, key.2) {
                    text.push('\n');
                }
            }
            None => {}
        }
        current_line = Some(key);
        text.push_str(word);
        confidence_sum += conf;
        words += 1;
    }

    OcrOutput {
        text,
        confidence: if words == 0 {
            0.0
        } else {
            confidence_sum / words as f64
        },
    }
}

/// Production engine backed by the tesseract and pdftoppm command-line tools.
#[derive(Debug, Clone)]
pub struct TesseractCliEngine {
    tesseract_path: PathBuf,
    pdftoppm_path: PathBuf,
}

impl TesseractCliEngine {
    pub fn new(tesseract_path: impl Into<PathBuf>, pdftoppm_path: impl Into<PathBuf>) -> Self {
        Self {
            tesseract_path: tesseract_path.into(),
            pdftoppm_path: pdftoppm_path.into(),
        }
    }

    async fn rasterize_pdf(
        &self,
        pdf: &Path,
        out_dir: &Path,
        dpi: u32,
    ) -> Result<Vec<PathBuf>, ParserError> {
        let prefix = out_dir.join("page");
        run_tool(
            &self.pdftoppm_path,
            vec![
                "-r".into(),
                dpi.to_string().into(),
                "-png".into(),
                pdf.as_os_str().to_owned(),
                prefix.as_os_str().to_owned(),
            ],
        )
        .await?;

        let mut pages = Vec::new();
        let mut entries = tokio::fs::read_dir(out_dir).await.map_err(io_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            let is_page = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("page") && n.ends_with(".png"));
            if is_page {
                pages.push(path);
            }
        }
        // pdftoppm zero-pads page numbers to a fixed width, so lexical order is page order.
        pages.sort();
        if pages.is_empty() {
            return Err(ParserError::new(
                ErrorCode::OcrProcessingFailed,
                "pdftoppm produced no page images",
            )
            .with_stage("ocr"));
        }
        Ok(pages)
    }

    async fn recognize_file(
        &self,
        image: &Path,
        config: &OcrConfig,
        language: &str,
    ) -> Result<OcrOutput, ParserError> {
        let stdout = run_tool(
            &self.tesseract_path,
            vec![
                image.as_os_str().to_owned(),
                "stdout".into(),
                "-l".into(),
                language.into(),
                "--psm".into(),
                config.page_seg_mode.to_string().into(),
                "--oem".into(),
                config.engine_mode.to_string().into(),
                "tsv".into(),
            ],
        )
        .await?;
        Ok(parse_tsv(&String::from_utf8_lossy(&stdout)))
    }
}

#[async_trait]
impl OcrEngine for TesseractCliEngine {
    async fn recognize(
        &self,
        input: &OcrInput,
        config: &OcrConfig,
        language: &str,
    ) -> Result<OcrOutput, ParserError> {
        let scratch = tempfile::tempdir().map_err(io_error)?;
        let extension = match input.source {
            OcrSource::Pdf => "pdf",
            OcrSource::Image(ImageFormat::Png) => "png",
            OcrSource::Image(ImageFormat::Jpeg) => "jpg",
            OcrSource::Image(ImageFormat::Gif) => "gif",
            OcrSource::Image(ImageFormat::Tiff) => "tif",
            OcrSource::Image(ImageFormat::Bmp) => "bmp",
            OcrSource::Image(ImageFormat::Webp) => "webp",
        };
        let source_path = scratch.path().join(format!("input.{extension}"));
        tokio::fs::write(&source_path, &input.bytes)
            .await
            .map_err(io_error)?;

        let images = match input.source {
            OcrSource::Pdf => {
                self.rasterize_pdf(&source_path, scratch.path(), config.dpi)
                    .await?
            }
            OcrSource::Image(_) => vec![source_path],
        };

        let mut pages = Vec::with_capacity(images.len());
        for image in &images {
            pages.push(self.recognize_file(image, config, language).await?);
        }

        let confidence = if pages.is_empty() {
            0.0
        } else {
            pages.iter().map(|p| p.confidence).sum::<f64>() / pages.len() as f64
        };
        let text = pages
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(OcrOutput { text, confidence })
    }

    fn name(&self) -> &'static str {
        "tesseract-cli"
    }
}

async fn run_tool(program: &Path, args: Vec<OsString>) -> Result<Vec<u8>, ParserError> {
    let output = Command::new(program)
        .args(&args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            let code = if e.kind() == std::io::ErrorKind::NotFound {
                ErrorCode::OcrInitializationFailed
            } else {
                ErrorCode::OcrProcessingFailed
            };
            ParserError::new(code, format!("Failed to run {}: {e}", program.display()))
                .with_stage("ocr")
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ParserError::new(
            ErrorCode::OcrProcessingFailed,
            format!("{} exited with {}", program.display(), output.status),
        )
        .with_stage("ocr")
        .with_detail("stderr", stderr.trim()));
    }
    Ok(output.stdout)
}

fn io_error(e: std::io::Error) -> ParserError {
    ParserError::new(ErrorCode::OcrProcessingFailed, format!("OCR scratch I/O failed: {e}"))
        .with_stage("ocr")
}
