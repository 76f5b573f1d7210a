//! PDF text via pdfium.
//!
//! The library is bound at runtime: `PDFIUM_LIB_PATH` when set, otherwise
//! the system library search path. pdfium keeps thread-local state, so this
//! only ever runs inside `spawn_blocking`.

use super::malformed;
use crate::error::ExtractionError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Page texts separated by blank lines. Pages without text are skipped.
pub(super) fn pdf_text(path: &Path) -> Result<String, ExtractionError> {
    let pdfium = bind()?;
    let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
        let detail = format!("{:?}", e);
        if detail.to_lowercase().contains("password") {
            malformed(path, "the PDF is password protected")
        } else {
            malformed(path, detail)
        }
    })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::new();
    for (index, page) in pages.iter().enumerate() {
        match page.text() {
            Ok(text) => {
                let text = text.all();
                debug!("Page {}: {} chars", index + 1, text.chars().count());
                if !text.trim().is_empty() {
                    texts.push(text.trim().to_string());
                }
            }
            Err(e) => warn!("Skipping page {}: no text layer ({:?})", index + 1, e),
        }
    }

    if texts.is_empty() {
        warn!(
            "{} has no extractable text (scanned document?)",
            path.display()
        );
    }
    Ok(texts.join("\n\n"))
}

fn bind() -> Result<Pdfium, ExtractionError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(lib) if !lib.trim().is_empty() => Pdfium::bind_to_library(lib.trim()),
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractionError::PdfiumUnavailable(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}
