//! Output types: per-page outcomes and the aggregated extraction result.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// One extracted shipment entry, exactly as it appeared in the model's
/// JSON array (normally an object keyed by [`crate::prompts::FIELD_NAMES`]).
pub type Record = serde_json::Value;

/// What the model call for one page produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PageOutcome {
    /// The model answered; the text may be empty.
    Reply(String),
    /// The call failed; the page contributes nothing.
    Failed(PageError),
}

/// Result of running one page through the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    pub outcome: PageOutcome,
    /// Wall-clock time spent in the model call.
    pub duration_ms: u64,
}

impl PageResult {
    /// The reply text, if the call succeeded.
    pub fn reply(&self) -> Option<&str> {
        match &self.outcome {
            PageOutcome::Reply(text) => Some(text),
            PageOutcome::Failed(_) => None,
        }
    }
}

/// Why a page contributed the records it did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageDisposition {
    /// The reply held a JSON array with this many elements.
    Extracted { records: usize },
    /// The model answered with empty text.
    EmptyReply,
    /// The reply had no JSON array, or it did not parse.
    NoJson,
    /// The model call failed.
    ModelFailed { error: PageError },
}

/// Per-page summary for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub page_num: usize,
    pub disposition: PageDisposition,
    pub duration_ms: u64,
}

/// Counters over a whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the PDF.
    pub total_pages: usize,
    /// Pages sent to the model.
    pub processed_pages: usize,
    /// Pages whose reply yielded a JSON array.
    pub extracted_pages: usize,
    /// Pages whose model call failed.
    pub failed_pages: usize,
    /// Pages whose reply was empty or held no parsable array.
    pub unparsed_pages: usize,
    /// Records in the result set.
    pub total_records: usize,
    pub render_duration_ms: u64,
    pub model_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Complete output of extracting one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Records in page order, then in-array order.
    pub records: Vec<Record>,
    pub pages: Vec<PageReport>,
    pub stats: ExtractionStats,
}

/// The body the `/extract` endpoint returns on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope {
    pub status: String,
    pub data: Vec<Record>,
}

impl SuccessEnvelope {
    pub fn new(data: Vec<Record>) -> Self {
        Self {
            status: "success".to_string(),
            data,
        }
    }
}
