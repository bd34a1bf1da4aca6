//! Index command handler.
//!
//! Indexes inline facts and/or chunked documents in one batch.

use clap::Args;
use factrag_core::{config::AppConfig, AppError, AppResult};
use factrag_knowledge::{collect_documents, ItemOutcome, RagService};
use std::path::PathBuf;

/// Index facts and documents
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Facts to index, one per argument
    pub facts: Vec<String>,

    /// Files or directories to chunk and index
    #[arg(long)]
    pub path: Vec<PathBuf>,

    /// Maximum characters per document chunk (overrides index.chunkSize)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command");

        let mut items = self.facts.clone();
        if !self.path.is_empty() {
            let chunk_size = self.chunk_size.unwrap_or(config.index.chunk_size);
            let chunks = collect_documents(&self.path, chunk_size)?;
            tracing::info!(
                "Collected {} chunks from {} path(s)",
                chunks.len(),
                self.path.len()
            );
            items.extend(chunks.into_iter().map(|c| c.text));
        }

        if items.is_empty() {
            return Err(AppError::Validation(
                "Nothing to index: pass facts or --path".to_string(),
            ));
        }

        let service = RagService::from_config(config).await?;
        let report = service.index(&items).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!(
            "Indexed {} of {} items ({} failed)",
            report.indexed(),
            items.len(),
            report.failed()
        );
        for (item, outcome) in items.iter().zip(&report.outcomes) {
            match outcome {
                ItemOutcome::Indexed { .. } => {}
                ItemOutcome::StoreFailed { error } => {
                    println!("- not stored: {} ({})", preview(item), error)
                }
                ItemOutcome::VectorInsertFailed { id, error } => {
                    println!("- fact {} has no vector: {} ({})", id, preview(item), error)
                }
            }
        }

        Ok(())
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 60;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("short"), "short");
        let long = "é".repeat(80);
        let shown = preview(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), 63);
    }
}
