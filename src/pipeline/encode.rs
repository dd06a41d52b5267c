//! Image encoding: `DynamicImage` → in-memory PNG [`PageImage`].
//!
//! PNG is lossless; JPEG artefacts around small print (serial numbers,
//! invoice numbers) confuse vision models. The bytes stay in memory and are
//! handed straight to the model client, which base64-wraps them for the
//! request body.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// MIME type of every encoded page.
pub const PNG_MIME: &str = "image/png";

/// One rasterised page, ready to send to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_num: usize,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl PageImage {
    /// Base64 (standard alphabet, padded) of the image bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Encode a rasterised page as PNG.
pub fn encode_page(page_num: usize, img: &DynamicImage) -> Result<PageImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded page {} → {} bytes PNG", page_num, buf.len());

    Ok(PageImage {
        page_num,
        mime_type: PNG_MIME,
        bytes: buf,
    })
}
