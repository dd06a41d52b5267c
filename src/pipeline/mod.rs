//! Pipeline stages for challan extraction.
//!
//! Each submodule implements one step; [`crate::extract`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ parse ──▶ aggregate
//! (path)    (pdfium)   (PNG)      (VLM)   (JSON)    (records)
//! ```
//!
//! 1. [`input`]:     validate the local path and PDF magic bytes
//! 2. [`render`]:    rasterise pages in `spawn_blocking` (pdfium is not async-safe)
//! 3. [`encode`]:    PNG-encode each bitmap into an in-memory [`encode::PageImage`]
//! 4. [`llm`]:       one model call per page through a [`model::VisionModel`];
//!    failures are captured per page, never propagated
//! 5. [`parse`]:     pull the JSON array out of the reply text
//! 6. [`aggregate`]: fold page replies into one ordered record list
//!
//! Model backends: [`gemini`] (native REST) and [`provider`] (edgequake-llm).

pub mod aggregate;
pub mod encode;
pub mod gemini;
pub mod input;
pub mod llm;
pub mod model;
pub mod parse;
pub mod provider;
pub mod render;
