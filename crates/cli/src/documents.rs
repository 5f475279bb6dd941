use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions read as UTF-8 plain text
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Tables ingested one entry per row
pub const CSV_EXTENSION: &str = "csv";

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("UnsupportedFormat: {} (supported: .txt, .md, .csv)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Prose, chunked by words
    Text,
    /// Header row plus data rows
    Csv,
}

/// A decoded document ready for ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub text: String,
}

pub fn kind_of(path: &Path) -> Option<DocumentKind> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case(CSV_EXTENSION) {
        Some(DocumentKind::Csv)
    } else if TEXT_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
    {
        Some(DocumentKind::Text)
    } else {
        None
    }
}

pub fn is_supported(path: &Path) -> bool {
    kind_of(path).is_some()
}

/// Read one document. Binary formats (PDF, DOCX) are rejected.
pub fn extract_text(path: &Path) -> Result<Document, DocumentError> {
    let Some(kind) = kind_of(path) else {
        return Err(DocumentError::UnsupportedFormat(path.to_path_buf()));
    };
    let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Document {
        path: path.to_path_buf(),
        kind,
        text,
    })
}

/// Expand the given paths into documents.
///
/// Files are read as given (an unsupported extension is an error). Directories contribute their
/// supported files, non-recursively, in name order.
pub fn collect(paths: &[PathBuf]) -> Result<Vec<Document>, DocumentError> {
    let mut documents = Vec::new();
    for path in paths {
        if path.is_dir() {
            let read_err = |source| DocumentError::Read {
                path: path.clone(),
                source,
            };
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(read_err)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported(p))
                .collect();
            files.sort();
            if files.is_empty() {
                log::warn!("No .txt, .md or .csv files in {}", path.display());
            }
            for file in files {
                documents.push(extract_text(&file)?);
            }
        } else {
            documents.push(extract_text(path)?);
        }
    }
    Ok(documents)
}
