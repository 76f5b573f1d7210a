//! Text extraction: turn an uploaded document into plain text.
//!
//! The pipeline only ever sees a `String`; this module is the narrow adapter
//! in front of it.
//!
//! | Extension        | Reader                                   |
//! |------------------|------------------------------------------|
//! | `.txt` `.md`     | lossy UTF-8                              |
//! | `.docx`          | `word/document.xml`, one line per paragraph |
//! | `.pptx`          | `ppt/slides/slideN.xml`, one block per slide |
//! | `.xlsx`          | worksheets with shared strings resolved  |
//! | `.pdf`           | pdfium page text (feature `pdf`)         |
//!
//! ## Why spawn_blocking?
//!
//! Zip inflation and pdfium are synchronous and can take a while on large
//! files, so [`extract_file`] moves them off the async worker threads.

mod office;
#[cfg(feature = "pdf")]
mod pdf;

use crate::error::ExtractionError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Formats the extractor understands, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    /// Plain text or Markdown.
    Text,
}

impl DocumentFormat {
    /// Detect the format from the extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "pptx" => Ok(DocumentFormat::Pptx),
            "xlsx" => Ok(DocumentFormat::Xlsx),
            "txt" | "md" | "markdown" => Ok(DocumentFormat::Text),
            _ => Err(ExtractionError::UnsupportedFormat { extension }),
        }
    }
}

/// Extract the text of `path`, trimmed.
pub async fn extract_file(path: impl AsRef<Path>) -> Result<String, ExtractionError> {
    let path = path.as_ref().to_path_buf();
    let task_path = path.clone();
    tokio::task::spawn_blocking(move || extract_file_blocking(&task_path))
        .await
        .map_err(|e| ExtractionError::Io {
            path,
            source: std::io::Error::other(format!("extraction task failed: {e}")),
        })?
}

/// Blocking variant of [`extract_file`].
pub fn extract_file_blocking(path: &Path) -> Result<String, ExtractionError> {
    if !path.is_file() {
        return Err(ExtractionError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let format = DocumentFormat::from_path(path)?;
    debug!("Extracting {:?} from {}", format, path.display());

    let text = match format {
        DocumentFormat::Text => read_text(path)?,
        DocumentFormat::Docx => office::docx_text(path)?,
        DocumentFormat::Pptx => office::pptx_text(path)?,
        DocumentFormat::Xlsx => office::xlsx_text(path)?,
        DocumentFormat::Pdf => pdf_text(path)?,
    };

    let text = text.trim().to_string();
    info!(
        "Extracted {} chars from {}",
        text.chars().count(),
        path.display()
    );
    Ok(text)
}

fn read_text(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path).map_err(|source| io_error(path, source))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(feature = "pdf")]
fn pdf_text(path: &Path) -> Result<String, ExtractionError> {
    pdf::pdf_text(path)
}

#[cfg(not(feature = "pdf"))]
fn pdf_text(_path: &Path) -> Result<String, ExtractionError> {
    Err(ExtractionError::PdfiumUnavailable(
        "this build does not include the `pdf` feature".to_string(),
    ))
}

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> ExtractionError {
    ExtractionError::Io {
        path: PathBuf::from(path),
        source,
    }
}

pub(crate) fn malformed(path: &Path, detail: impl ToString) -> ExtractionError {
    ExtractionError::Malformed {
        path: PathBuf::from(path),
        detail: detail.to_string(),
    }
}
