//! Configuration types for challan extraction.
//!
//! Everything the pipeline needs (render resolution, which model to call,
//! generation parameters, safety thresholds, prompts) lives in one
//! [`ExtractionConfig`] that is built once and passed down. Nothing is read
//! from module-level state, so several independently configured extractors
//! can coexist in one process (and in one test binary).

use crate::error::ChallanError;
use crate::pipeline::model::VisionModel;
use crate::progress::ProgressCallback;
use crate::prompts::PromptPair;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable holding the Gemini API key.
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Default Gemini REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration for extracting records from challan PDFs.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use challan_reader::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(200)
///     .api_key("my-key")
///     .build()
///     .unwrap();
/// assert_eq!(config.generation.top_k, 32);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI used when rasterising each page. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Optional cap on the longest rendered edge in pixels. Default: none.
    ///
    /// A 300-DPI render of an oversized page can be very large; when set,
    /// the page is scaled down so neither dimension exceeds this value.
    pub max_rendered_pixels: Option<u32>,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory containing the pdfium shared library.
    /// If None, `./` is tried first and then the system library path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Model identifier. Default: `gemini-1.5-flash-latest`.
    pub model_name: String,

    /// Name of an `edgequake-llm` provider ("openai", "anthropic", ...).
    /// If None, the native Gemini client is used.
    pub provider_name: Option<String>,

    /// Pre-constructed model. Takes precedence over `provider_name`.
    pub model: Option<Arc<dyn VisionModel>>,

    /// Gemini API key. Not validated here; a missing key fails each page
    /// at request time.
    pub api_key: Option<String>,

    /// Gemini REST base URL (up to and including the API version).
    pub api_base: String,

    /// Sampling parameters sent with every page request.
    pub generation: GenerationParams,

    /// Content-safety thresholds sent with every page request.
    pub safety: Vec<SafetySetting>,

    /// Prompt text sent with every page.
    pub prompts: PromptPair,

    /// Per-page model call timeout in seconds. Default: none (HTTP client default).
    pub api_timeout_secs: Option<u64>,

    /// Optional progress callback for per-page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: None,
            pages: PageSelection::default(),
            password: None,
            pdfium_lib_path: None,
            model_name: DEFAULT_MODEL.to_string(),
            provider_name: None,
            model: None,
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            generation: GenerationParams::default(),
            safety: SafetySetting::defaults(),
            prompts: PromptPair::default(),
            api_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pages", &self.pages)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("model_name", &self.model_name)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model.as_ref().map(|_| "<dyn VisionModel>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("generation", &self.generation)
            .field("safety", &self.safety)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Default configuration with the API key taken from `GOOGLE_API_KEY`.
    ///
    /// An unset or empty variable leaves `api_key` as None.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(GOOGLE_API_KEY_ENV)
                .ok()
                .filter(|k| !k.is_empty()),
            ..Self::default()
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = Some(px.max(100));
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.config.model_name = name.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.model = Some(model);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Read the API key from `GOOGLE_API_KEY`, if set.
    pub fn api_key_from_env(mut self) -> Self {
        self.config.api_key = std::env::var(GOOGLE_API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.generation.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.generation.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn top_k(mut self, k: u32) -> Self {
        self.config.generation.top_k = k;
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.generation.max_output_tokens = n;
        self
    }

    /// Apply one threshold to every default harm category.
    pub fn safety_threshold(mut self, threshold: HarmBlockThreshold) -> Self {
        self.config.safety = HarmCategory::ALL
            .iter()
            .map(|&category| SafetySetting {
                category,
                threshold,
            })
            .collect();
        self
    }

    pub fn prompts(mut self, prompts: PromptPair) -> Self {
        self.config.prompts = prompts;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    /// Attach a progress callback for per-page events.
    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ChallanError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ChallanError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.generation.max_output_tokens == 0 {
            return Err(ChallanError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.model_name.trim().is_empty() {
            return Err(ChallanError::InvalidConfig("model name is empty".into()));
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start > end {
                return Err(ChallanError::InvalidConfig(format!(
                    "page range {start}-{end}: start must be <= end"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Generation and safety ────────────────────────────────────────────────

/// Sampling parameters for each page request.
///
/// Low randomness keeps the model faithful to what is printed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Default: 0.1
    pub temperature: f32,
    /// Default: 1.0
    pub top_p: f32,
    /// Default: 32
    pub top_k: u32,
    /// Default: 4096
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 1.0,
            top_k: 32,
            max_output_tokens: 4096,
        }
    }
}

/// Harm categories filtered on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ];
}

/// Blocking threshold for a harm category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    #[default]
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

/// One `(category, threshold)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

impl SafetySetting {
    /// All four categories at `BLOCK_MEDIUM_AND_ABOVE`.
    pub fn defaults() -> Vec<SafetySetting> {
        HarmCategory::ALL
            .iter()
            .map(|&category| SafetySetting {
                category,
                threshold: HarmBlockThreshold::default(),
            })
            .collect()
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the PDF to extract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if (1..=total_pages).contains(p) {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|p| (1..=total_pages).contains(*p))
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl std::str::FromStr for PageSelection {
    type Err = ChallanError;

    /// Parse `all`, `5`, `3-15` or `1,3,5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let page = |p: &str| -> Result<usize, ChallanError> {
            let n: usize = p
                .trim()
                .parse()
                .map_err(|_| ChallanError::InvalidConfig(format!("invalid page number '{p}'")))?;
            if n < 1 {
                return Err(ChallanError::InvalidConfig(
                    "pages are 1-indexed, minimum is 1".into(),
                ));
            }
            Ok(n)
        };

        if s == "all" {
            return Ok(PageSelection::All);
        }
        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (page(start)?, page(end)?);
            if start > end {
                return Err(ChallanError::InvalidConfig(format!(
                    "page range {start}-{end}: start must be <= end"
                )));
            }
            return Ok(PageSelection::Range(start, end));
        }
        if s.contains(',') {
            return s
                .split(',')
                .map(page)
                .collect::<Result<Vec<_>, _>>()
                .map(PageSelection::Set);
        }
        page(&s).map(PageSelection::Single)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_extraction_contract() {
        let c = ExtractionConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.model_name, "gemini-1.5-flash-latest");
        assert_eq!(c.generation.temperature, 0.1);
        assert_eq!(c.generation.top_p, 1.0);
        assert_eq!(c.generation.top_k, 32);
        assert_eq!(c.generation.max_output_tokens, 4096);
        assert_eq!(c.safety.len(), 4);
        assert!(c
            .safety
            .iter()
            .all(|s| s.threshold == HarmBlockThreshold::BlockMediumAndAbove));
        assert!(c.api_timeout_secs.is_none());
    }

    #[test]
    fn build_rejects_out_of_range_dpi() {
        assert!(ExtractionConfig::builder().dpi(50).build().is_err());
        assert!(ExtractionConfig::builder().dpi(900).build().is_err());
        assert!(ExtractionConfig::builder().dpi(150).build().is_ok());
    }

    #[test]
    fn safety_threshold_applies_to_every_category() {
        let c = ExtractionConfig::builder()
            .safety_threshold(HarmBlockThreshold::BlockOnlyHigh)
            .build()
            .unwrap();
        assert_eq!(c.safety.len(), 4);
        assert!(c
            .safety
            .iter()
            .all(|s| s.threshold == HarmBlockThreshold::BlockOnlyHigh));
    }

    #[test]
    fn safety_setting_wire_names() {
        let json = serde_json::to_value(SafetySetting::defaults()[1]).unwrap();
        assert_eq!(json["category"], "HARM_CATEGORY_HATE_SPEECH");
        assert_eq!(json["threshold"], "BLOCK_MEDIUM_AND_ABOVE");
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ExtractionConfig::builder().api_key("secret-123").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-123"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let c = ExtractionConfig::builder()
            .api_base("http://localhost:8080/v1beta/")
            .build()
            .unwrap();
        assert_eq!(c.api_base, "http://localhost:8080/v1beta");
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::Single(2).to_indices(3), vec![1]);
        assert_eq!(PageSelection::Single(4).to_indices(3), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 9).to_indices(4), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2]
        );
    }

    #[test]
    fn page_selection_parsing() {
        assert_eq!("all".parse::<PageSelection>().unwrap(), PageSelection::All);
        assert_eq!("4".parse::<PageSelection>().unwrap(), PageSelection::Single(4));
        assert_eq!(
            "2-5".parse::<PageSelection>().unwrap(),
            PageSelection::Range(2, 5)
        );
        assert_eq!(
            "1, 3,5".parse::<PageSelection>().unwrap(),
            PageSelection::Set(vec![1, 3, 5])
        );
        assert!("0".parse::<PageSelection>().is_err());
        assert!("5-2".parse::<PageSelection>().is_err());
        assert!("x".parse::<PageSelection>().is_err());
    }
}
