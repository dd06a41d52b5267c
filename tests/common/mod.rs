//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use challan_reader::{ModelError, PageImage, PageRequest, VisionModel};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A model that answers from a fixed script, one entry per call.
///
/// Once the script runs out every further call fails, so a test that
/// expects N calls notices an (N+1)th.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, usize, String)>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = Result<String, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for a script of successful replies.
    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(system_prompt, page_num, user_prompt)` for every call, in order.
    pub fn seen(&self) -> Vec<(String, usize, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    fn name(&self) -> String {
        "scripted".into()
    }

    async fn generate(&self, request: PageRequest<'_>) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((
            request.system_prompt.to_string(),
            request.image.page_num,
            request.user_prompt.to_string(),
        ));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Other("script exhausted".into())))
    }
}

/// `n` placeholder pages numbered from 1.
pub fn pages(n: usize) -> Vec<PageImage> {
    (1..=n)
        .map(|page_num| PageImage {
            page_num,
            mime_type: "image/png",
            bytes: vec![0x89, b'P', b'N', b'G'],
        })
        .collect()
}
