//! The seam between the pipeline and whatever vision model answers it.

use crate::error::ModelError;
use crate::pipeline::encode::PageImage;
use async_trait::async_trait;

/// One page request: `[system, image, user]`, in that order.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub system_prompt: &'a str,
    pub image: &'a PageImage,
    pub user_prompt: &'a str,
}

/// A multimodal model that turns one page request into reply text.
///
/// Implementations make exactly one call per invocation; the pipeline never
/// retries. An `Ok` reply may be empty.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Short identifier for logs (e.g. `gemini/gemini-1.5-flash-latest`).
    fn name(&self) -> String;

    async fn generate(&self, request: PageRequest<'_>) -> Result<String, ModelError>;
}
