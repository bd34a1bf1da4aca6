//! Stats command handler.
//!
//! Shows fact and vector counts for the configured collection.

use clap::Args;
use factrag_core::{config::AppConfig, AppResult};
use factrag_knowledge::RagService;

/// Show fact store and vector index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let service = RagService::from_config(config).await?;
        let stats = service.stats().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Collection: {} ({})", stats.collection, stats.backend);
        println!("Facts:      {}", stats.facts);
        println!("Vectors:    {}", stats.vectors);
        if stats.facts > stats.vectors {
            println!(
                "Note: {} fact(s) have no vector entry",
                stats.facts - stats.vectors
            );
        }
        println!("Embedding:  {}", stats.embedding_provider);
        println!("LLM:        {}", stats.llm_provider);

        Ok(())
    }
}
