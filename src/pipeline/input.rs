//! Input validation: make sure a path names a readable PDF before pdfium
//! sees it.
//!
//! Checking the `%PDF` magic bytes up front gives callers a meaningful
//! [`ChallanError::NotAPdf`] instead of an opaque pdfium load failure.

use crate::error::ChallanError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable, and starts with `%PDF`.
pub fn resolve_local(path: impl AsRef<Path>) -> Result<PathBuf, ChallanError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(ChallanError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(ChallanError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ChallanError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ChallanError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}
