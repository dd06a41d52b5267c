//! Page loop: one model call per page, failures isolated per page.
//!
//! Pages are sent strictly one at a time in document order. A failed call is
//! logged and recorded as [`PageOutcome::Failed`]; it never aborts the
//! remaining pages and is never retried.

use crate::error::PageError;
use crate::output::{PageOutcome, PageResult};
use crate::pipeline::encode::PageImage;
use crate::pipeline::model::{PageRequest, VisionModel};
use crate::progress::ProgressCallback;
use crate::prompts::PromptPair;
use std::time::Instant;
use tracing::{debug, warn};

/// Run one page through the model.
///
/// Always returns a `PageResult`; errors are folded into the outcome.
pub async fn process_page(
    model: &dyn VisionModel,
    image: &PageImage,
    prompts: &PromptPair,
) -> PageResult {
    let start = Instant::now();
    let request = PageRequest {
        system_prompt: &prompts.system,
        image,
        user_prompt: &prompts.user,
    };

    let outcome = match model.generate(request).await {
        Ok(text) => {
            debug!("Page {}: reply of {} bytes", image.page_num, text.len());
            PageOutcome::Reply(text)
        }
        Err(e) => {
            let err = PageError::from_model(image.page_num, e);
            warn!("Error on page {}: {}", image.page_num, err);
            PageOutcome::Failed(err)
        }
    };

    PageResult {
        page_num: image.page_num,
        outcome,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Sequential page sender that fires progress events and keeps results.
///
/// Each image is taken by value and dropped as soon as its call returns.
pub struct PageLoop<'a> {
    model: &'a dyn VisionModel,
    prompts: &'a PromptPair,
    progress: Option<&'a ProgressCallback>,
    total: usize,
    results: Vec<PageResult>,
}

impl<'a> PageLoop<'a> {
    pub fn new(
        model: &'a dyn VisionModel,
        prompts: &'a PromptPair,
        progress: Option<&'a ProgressCallback>,
        total: usize,
    ) -> Self {
        Self {
            model,
            prompts,
            progress,
            total,
            results: Vec::with_capacity(total),
        }
    }

    pub async fn send(&mut self, image: PageImage) {
        let page_num = image.page_num;
        if let Some(cb) = self.progress {
            cb.on_page_start(page_num, self.total);
        }

        let result = process_page(self.model, &image, self.prompts).await;
        drop(image);

        if let Some(cb) = self.progress {
            match &result.outcome {
                PageOutcome::Reply(text) => cb.on_page_complete(page_num, self.total, text.len()),
                PageOutcome::Failed(e) => cb.on_page_error(page_num, self.total, &e.to_string()),
            }
        }
        self.results.push(result);
    }

    pub fn finish(self) -> Vec<PageResult> {
        self.results
    }
}

/// Run every page sequentially, in the order given.
pub async fn process_pages(
    model: &dyn VisionModel,
    pages: Vec<PageImage>,
    prompts: &PromptPair,
    progress: Option<&ProgressCallback>,
) -> Vec<PageResult> {
    let mut run = PageLoop::new(model, prompts, progress, pages.len());
    for image in pages {
        run.send(image).await;
    }
    run.finish()
}
