//! Document-level extraction entry points.
//!
//! [`Extractor`] owns the configuration and the model handle; it is built
//! once (at startup, or per test) and shared by reference or `Arc`. Each call
//! runs one document through render → model → parse → aggregate.
//!
//! Errors before the page loop (missing file, corrupt PDF, pdfium
//! unavailable) are returned as `Err`, as is a page that fails to rasterise.
//! Model errors only drop the affected page, so a call can succeed with a
//! partial or empty record list.

use crate::config::ExtractionConfig;
use crate::error::ChallanError;
use crate::output::{ExtractionOutput, ExtractionStats, PageDisposition, PageResult};
use crate::pipeline::aggregate::aggregate;
use crate::pipeline::encode::PageImage;
use crate::pipeline::gemini::GeminiModel;
use crate::pipeline::model::VisionModel;
use crate::pipeline::provider::ProviderModel;
use crate::pipeline::llm::{self, PageLoop};
use crate::pipeline::{input, render};
use crate::progress::ProgressCallback;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A configured extraction pipeline.
pub struct Extractor {
    config: ExtractionConfig,
    model: Arc<dyn VisionModel>,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("config", &self.config)
            .field("model", &self.model.name())
            .finish()
    }
}

impl Extractor {
    /// Build an extractor, resolving the model backend from the config.
    pub fn new(config: ExtractionConfig) -> Result<Self, ChallanError> {
        let model = resolve_model(&config)?;
        info!("Using vision model {}", model.name());
        Ok(Self { config, model })
    }

    /// Build an extractor around an explicit model, ignoring
    /// `config.model` / `config.provider_name`.
    pub fn with_model(config: ExtractionConfig, model: Arc<dyn VisionModel>) -> Self {
        Self { config, model }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<dyn VisionModel> {
        &self.model
    }

    /// Extract records from a PDF on disk.
    ///
    /// Rendering and model calls are interleaved: each page is sent as soon
    /// as it is encoded and its image is freed once the call returns.
    pub async fn extract(&self, pdf_path: impl AsRef<Path>) -> Result<ExtractionOutput, ChallanError> {
        let total_start = Instant::now();
        let pdf_path = input::resolve_local(pdf_path)?;
        info!("Starting extraction: {}", pdf_path.display());

        let mut stream = render::stream_pages(&pdf_path, &self.config);
        let shape = stream.opened().await?;
        self.start(shape.selected);

        let mut pages = self.page_loop(shape.selected);
        while let Some(image) = stream.next_page().await? {
            pages.send(image).await;
        }
        let render_duration_ms = stream.finish().await?;
        info!("Rendered {} pages in {}ms", shape.selected, render_duration_ms);

        let mut output = self.complete(pages.finish());
        output.stats.total_pages = shape.page_count;
        output.stats.render_duration_ms = render_duration_ms;
        output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        Ok(output)
    }

    /// Extract records from PDF bytes held in memory.
    ///
    /// The bytes are spooled to a [`tempfile::NamedTempFile`] for pdfium; the
    /// file is removed when this returns, on success and on error.
    pub async fn extract_bytes(&self, bytes: &[u8]) -> Result<ExtractionOutput, ChallanError> {
        let mut tmp = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| ChallanError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(bytes)
            .map_err(|e| ChallanError::Internal(format!("tempfile write: {e}")))?;
        tmp.flush()
            .map_err(|e| ChallanError::Internal(format!("tempfile flush: {e}")))?;
        self.extract(tmp.path()).await
    }

    /// Run already-rendered pages through the model and aggregate.
    ///
    /// This is the page loop without rasterisation; `stats.total_pages` is
    /// the number of pages given.
    pub async fn extract_images(&self, pages: Vec<PageImage>) -> ExtractionOutput {
        let total = pages.len();
        self.start(total);
        let model_start = Instant::now();
        let results =
            llm::process_pages(self.model.as_ref(), pages, &self.config.prompts, self.progress())
                .await;

        let mut output = self.complete(results);
        output.stats.total_pages = total;
        output.stats.total_duration_ms = model_start.elapsed().as_millis() as u64;
        output
    }

    fn progress(&self) -> Option<&ProgressCallback> {
        self.config.progress_callback.as_ref()
    }

    fn page_loop(&self, total: usize) -> PageLoop<'_> {
        PageLoop::new(self.model.as_ref(), &self.config.prompts, self.progress(), total)
    }

    fn start(&self, total: usize) {
        if let Some(cb) = self.progress() {
            cb.on_extraction_start(total);
        }
    }

    fn complete(&self, results: Vec<PageResult>) -> ExtractionOutput {
        let replied = results.iter().filter(|r| r.reply().is_some()).count();
        if let Some(cb) = self.progress() {
            cb.on_extraction_complete(results.len(), replied);
        }
        let mut output = assemble(&results);
        output.stats.model_duration_ms = results.iter().map(|r| r.duration_ms).sum();
        output
    }
}

/// Convenience wrapper: build an [`Extractor`] and run one document.
pub async fn extract(
    pdf_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ChallanError> {
    Extractor::new(config.clone())?.extract(pdf_path).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    pdf_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ChallanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ChallanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(pdf_path, config))
}

/// Pick the model backend, most specific first:
///
/// 1. a pre-built `config.model`;
/// 2. a named `edgequake-llm` provider (`config.provider_name`);
/// 3. the native Gemini client.
pub fn resolve_model(config: &ExtractionConfig) -> Result<Arc<dyn VisionModel>, ChallanError> {
    if let Some(ref model) = config.model {
        return Ok(Arc::clone(model));
    }

    if let Some(ref name) = config.provider_name {
        if !name.eq_ignore_ascii_case("gemini") {
            return Ok(Arc::new(ProviderModel::from_config(name, config)?));
        }
    }

    let gemini = GeminiModel::from_config(config).map_err(|e| ChallanError::ProviderNotConfigured {
        provider: "gemini".to_string(),
        hint: e.to_string(),
    })?;
    Ok(Arc::new(gemini))
}

fn assemble(results: &[PageResult]) -> ExtractionOutput {
    let agg = aggregate(results);

    let failed = agg.count(|d| matches!(d, PageDisposition::ModelFailed { .. }));
    let extracted = agg.count(|d| matches!(d, PageDisposition::Extracted { .. }));
    let unparsed = agg.count(|d| matches!(d, PageDisposition::NoJson | PageDisposition::EmptyReply));

    if failed > 0 {
        warn!("{}/{} pages failed and were skipped", failed, results.len());
    }
    info!(
        "Extraction complete: {} records from {}/{} pages",
        agg.records.len(),
        extracted,
        results.len()
    );

    ExtractionOutput {
        stats: ExtractionStats {
            processed_pages: results.len(),
            extracted_pages: extracted,
            failed_pages: failed,
            unparsed_pages: unparsed,
            total_records: agg.records.len(),
            ..Default::default()
        },
        records: agg.records,
        pages: agg.reports,
    }
}
