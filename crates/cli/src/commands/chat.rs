//! Chat command handler.
//!
//! Answers a question from the indexed facts, paced token by token unless
//! `--no-stream` is given.

use clap::Args;
use factrag_core::{config::AppConfig, AppResult};
use factrag_knowledge::RagService;
use futures::StreamExt;
use std::io::Write;

/// Ask a question answered from the indexed facts
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// The question to ask
    pub query: String,

    /// Print the whole answer at once
    #[arg(long)]
    pub no_stream: bool,

    /// Output as JSON (implies --no-stream)
    #[arg(long)]
    pub json: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let service = RagService::from_config(config).await?;
        let answer = service.answer(&self.query).await?;

        tracing::debug!(
            facts = answer.facts.len(),
            top_score = answer.hits.first().map(|h| h.score).unwrap_or(0.0),
            "Answer ready"
        );

        if self.json {
            let output = serde_json::json!({
                "answer": answer.answer,
                "facts": answer.facts,
                "hits": answer.hits,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if self.no_stream {
            println!("{}", answer.answer);
            return Ok(());
        }

        let mut tokens = service.paced(&answer);
        let mut stdout = std::io::stdout();
        let mut first = true;
        while let Some(token) = tokens.next().await {
            if !first {
                write!(stdout, " ")?;
            }
            write!(stdout, "{}", token)?;
            stdout.flush()?;
            first = false;
        }
        writeln!(stdout)?;

        Ok(())
    }
}
