//! Turning documents on disk into fact-sized index items.

use factrag_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use text_splitter::TextSplitter;
use walkdir::WalkDir;

/// File extensions picked up when walking a directory.
pub const TEXT_EXTENSIONS: [&str; 5] = ["txt", "md", "markdown", "rst", "text"];

/// One chunk of a source document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub source: PathBuf,
    pub position: usize,
    pub text: String,
}

/// Split `text` into chunks of at most `max_chars` characters, dropping
/// blank ones.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let splitter = TextSplitter::new(max_chars.max(1));
    splitter
        .chunks(text)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read and chunk every text file under `paths`.
///
/// Files are taken as given; directories are walked recursively, skipping
/// hidden entries and unknown extensions. Output is sorted by path so the
/// same tree always yields the same batch.
pub fn collect_documents(paths: &[PathBuf], max_chars: usize) -> AppResult<Vec<DocumentChunk>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() && has_text_extension(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            return Err(AppError::Validation(format!(
                "path does not exist: {}",
                path.display()
            )));
        }
    }

    files.sort();
    files.dedup();

    let mut chunks = Vec::new();
    for file in files {
        let text = std::fs::read_to_string(&file).map_err(|e| {
            AppError::Validation(format!("cannot read {}: {}", file.display(), e))
        })?;

        let pieces = chunk_text(&text, max_chars);
        tracing::debug!("Chunked {:?} into {} pieces", file, pieces.len());

        chunks.extend(
            pieces
                .into_iter()
                .enumerate()
                .map(|(position, text)| DocumentChunk {
                    source: file.clone(),
                    position,
                    text,
                }),
        );
    }

    Ok(chunks)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
