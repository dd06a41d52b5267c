//! PDF rasterisation: render pages to PNG [`PageImage`]s via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async tasks. Rendering (and the PNG
//! encode that follows) is CPU-bound, so the whole document is handled on a
//! blocking-pool thread and only the encoded pages come back.
//!
//! Pages come back through a channel of capacity one. The renderer blocks
//! until the consumer takes the previous page, so at most two encoded pages
//! exist beyond the one being sent to the model.

use crate::config::ExtractionConfig;
use crate::error::ChallanError;
use crate::pipeline::encode::{encode_page, PageImage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// PDF user-space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Page counts known once the document is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentShape {
    /// Total pages in the PDF (before page selection).
    pub page_count: usize,
    /// Pages that will be rendered.
    pub selected: usize,
}

/// Pages rendered from one document.
#[derive(Debug)]
pub struct RenderedDocument {
    /// Total pages in the PDF (before page selection).
    pub page_count: usize,
    /// Encoded pages in page order.
    pub pages: Vec<PageImage>,
}

enum RenderMsg {
    Opened(DocumentShape),
    Page(PageImage),
}

type RenderSender = mpsc::Sender<Result<RenderMsg, ChallanError>>;

/// Encoded pages arriving one at a time from the blocking renderer.
///
/// Call [`opened`](Self::opened) first, then [`next_page`](Self::next_page)
/// until it yields `None`, then [`finish`](Self::finish).
pub struct PageStream {
    rx: mpsc::Receiver<Result<RenderMsg, ChallanError>>,
    task: JoinHandle<u64>,
}

impl PageStream {
    fn spawn<F>(work: F) -> Self
    where
        F: FnOnce(&RenderSender) -> Result<(), ChallanError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            if let Err(e) = work(&tx) {
                let _ = tx.blocking_send(Err(e));
            }
            start.elapsed().as_millis() as u64
        });
        Self { rx, task }
    }

    /// Wait for the document to open. Open and page-selection errors
    /// surface here, before any page is produced.
    pub async fn opened(&mut self) -> Result<DocumentShape, ChallanError> {
        match self.rx.recv().await {
            Some(Ok(RenderMsg::Opened(shape))) => Ok(shape),
            Some(Ok(RenderMsg::Page(page))) => Err(ChallanError::Internal(format!(
                "page {} arrived before the document was opened",
                page.page_num
            ))),
            Some(Err(e)) => Err(e),
            None => Err(ChallanError::Internal(
                "Render task stopped before opening the document".to_string(),
            )),
        }
    }

    /// The next encoded page, or `None` once every selected page was sent.
    ///
    /// A rasterisation failure ends the stream with `Err`.
    pub async fn next_page(&mut self) -> Result<Option<PageImage>, ChallanError> {
        match self.rx.recv().await {
            Some(Ok(RenderMsg::Page(page))) => Ok(Some(page)),
            Some(Ok(RenderMsg::Opened(_))) => Err(ChallanError::Internal(
                "document opened twice".to_string(),
            )),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Stop the renderer if it is still running and wait for it.
    ///
    /// Returns the time spent on the blocking thread in milliseconds.
    pub async fn finish(self) -> Result<u64, ChallanError> {
        let PageStream { rx, task } = self;
        drop(rx);
        task.await
            .map_err(|e| ChallanError::Internal(format!("Render task panicked: {}", e)))
    }
}

/// Start rasterising the selected pages of a PDF.
///
/// Any failure to open or render is fatal: there is no partial rendering of
/// a corrupt file.
pub fn stream_pages(pdf_path: &Path, config: &ExtractionConfig) -> PageStream {
    let path = pdf_path.to_path_buf();
    let settings = RenderSettings::from_config(config);
    PageStream::spawn(move |tx| render_pages_blocking(&path, &settings, tx))
}

/// Rasterise the selected pages of a PDF and collect them.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ExtractionConfig,
) -> Result<RenderedDocument, ChallanError> {
    let mut stream = stream_pages(pdf_path, config);
    let shape = stream.opened().await?;
    let mut pages = Vec::with_capacity(shape.selected);
    while let Some(page) = stream.next_page().await? {
        pages.push(page);
    }
    stream.finish().await?;
    Ok(RenderedDocument {
        page_count: shape.page_count,
        pages,
    })
}

/// The subset of [`ExtractionConfig`] the blocking renderer needs.
#[derive(Debug, Clone)]
struct RenderSettings {
    dpi: u32,
    max_pixels: Option<u32>,
    password: Option<String>,
    library_dir: Option<PathBuf>,
    selection: crate::config::PageSelection,
}

impl RenderSettings {
    fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
            library_dir: config.pdfium_lib_path.clone(),
            selection: config.pages.clone(),
        }
    }

    fn render_config(&self) -> PdfRenderConfig {
        let mut cfg = PdfRenderConfig::new().scale_page_by_factor(scale_for_dpi(self.dpi));
        if let Some(px) = self.max_pixels {
            cfg = cfg
                .set_maximum_width(px as i32)
                .set_maximum_height(px as i32);
        }
        cfg
    }
}

/// Scale factor that renders a page at `dpi`.
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / POINTS_PER_INCH
}

/// Bind to pdfium: the configured directory if any, else `./`, else the
/// system library path.
pub fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, ChallanError> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ChallanError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn render_pages_blocking(
    pdf_path: &Path,
    settings: &RenderSettings,
    tx: &RenderSender,
) -> Result<(), ChallanError> {
    let pdfium = bind_pdfium(settings.library_dir.as_deref())?;
    let password = settings.password.as_deref();

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ChallanError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ChallanError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ChallanError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    info!("PDF loaded: {} pages", page_count);

    let indices = settings.selection.to_indices(page_count);
    if indices.is_empty() && page_count > 0 {
        return Err(ChallanError::PageOutOfRange { total: page_count });
    }

    let render_config = settings.render_config();
    let shape = DocumentShape {
        page_count,
        selected: indices.len(),
    };

    pump(tx, shape, &indices, |idx| {
        let page_num = idx + 1;
        let page = pages
            .get(idx as u16)
            .map_err(|e| ChallanError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ChallanError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        encode_page(page_num, &image).map_err(|e| ChallanError::RasterisationFailed {
            page: page_num,
            detail: format!("PNG encoding failed: {}", e),
        })
    })
}

/// Send the shape, then render and send each page in turn.
///
/// Stops quietly when the receiver is gone.
fn pump<F>(
    tx: &RenderSender,
    shape: DocumentShape,
    indices: &[usize],
    mut render_one: F,
) -> Result<(), ChallanError>
where
    F: FnMut(usize) -> Result<PageImage, ChallanError>,
{
    if tx.blocking_send(Ok(RenderMsg::Opened(shape))).is_err() {
        return Ok(());
    }
    for &idx in indices {
        let page = render_one(idx)?;
        if tx.blocking_send(Ok(RenderMsg::Page(page))).is_err() {
            debug!("Page consumer went away after page {}", idx + 1);
            return Ok(());
        }
    }
    Ok(())
}
