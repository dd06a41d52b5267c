//! # challan-reader
//!
//! Extract shipment records from scanned delivery-challan PDFs using a
//! vision language model.
//!
//! Each page is rasterised and sent to the model with a fixed extraction
//! prompt listing fifteen fields (dates, SC and invoice numbers, addresses,
//! serial numbers, ...). The model replies with a JSON array; every page's
//! array is collected into one flat record list for the document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      check the local file is a readable PDF
//!  ├─ 2. Render     rasterise pages via pdfium at 300 DPI (spawn_blocking)
//!  ├─ 3. Encode     PNG bytes held in memory
//!  ├─ 4. Model      one request per page, in page order (Gemini by default)
//!  ├─ 5. Parse      first '[' .. last ']' of the reply as a JSON array
//!  └─ 6. Aggregate  concatenate records; failed pages contribute nothing
//! ```
//!
//! A failed model call never aborts the document: the page is logged and
//! skipped, and the remaining pages are still processed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use challan_reader::{Extractor, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from GOOGLE_API_KEY
//!     let extractor = Extractor::new(ExtractionConfig::from_env())?;
//!     let output = extractor.extract("challan.pdf").await?;
//!     println!("{}", serde_json::to_string_pretty(&output.records)?);
//!     eprintln!("{} failed pages", output.stats.failed_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | The `challan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | The `/extract` HTTP endpoint (axum) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{BatchClient, BatchResult};
pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, GenerationParams, HarmBlockThreshold,
    HarmCategory, PageSelection, SafetySetting,
};
pub use error::{ChallanError, ClientError, ExportError, ModelError, PageError, UploadError};
pub use export::{build_table, default_output_name, write_csv, write_csv_file, Table};
pub use extract::{extract, extract_sync, Extractor};
pub use output::{
    ExtractionOutput, ExtractionStats, PageDisposition, PageOutcome, PageReport, PageResult,
    Record, SuccessEnvelope,
};
pub use pipeline::encode::PageImage;
pub use pipeline::gemini::GeminiModel;
pub use pipeline::provider::ProviderModel;
pub use pipeline::model::{PageRequest, VisionModel};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::PromptPair;
