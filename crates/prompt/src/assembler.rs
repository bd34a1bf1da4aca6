//! Prompt assembly: facts + query -> one grounded instruction string.
//!
//! Rendering depends only on the definition, the fact list and the query,
//! so the same inputs always produce byte-identical output.

use crate::types::PromptDefinition;
use factrag_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde::Serialize;

const TEMPLATE_NAME: &str = "prompt";

#[derive(Serialize)]
struct PromptVars<'a> {
    facts: String,
    #[serde(rename = "factCount")]
    fact_count: usize,
    query: &'a str,
}

/// A compiled prompt definition, shareable across requests.
pub struct PromptAssembler {
    definition: PromptDefinition,
    registry: Handlebars<'static>,
}

impl PromptAssembler {
    /// Compile the definition's template.
    pub fn new(definition: PromptDefinition) -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Plain text prompt
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(TEMPLATE_NAME, &definition.template)
            .map_err(|e| {
                AppError::Prompt(format!(
                    "Failed to register template {}: {}",
                    definition.id, e
                ))
            })?;

        Ok(Self {
            definition,
            registry,
        })
    }

    pub fn definition(&self) -> &PromptDefinition {
        &self.definition
    }

    /// Build the instruction string for `facts` (ranked) and `query`.
    pub fn assemble(&self, facts: &[String], query: &str) -> AppResult<String> {
        let vars = PromptVars {
            facts: number_facts(facts),
            fact_count: facts.len(),
            query,
        };

        self.registry
            .render(TEMPLATE_NAME, &vars)
            .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
    }
}

/// One-shot assembly without keeping the compiled template.
pub fn assemble(definition: &PromptDefinition, facts: &[String], query: &str) -> AppResult<String> {
    PromptAssembler::new(definition.clone())?.assemble(facts, query)
}

/// Enumerate facts 1-based, one per line.
pub fn number_facts(facts: &[String]) -> String {
    facts
        .iter()
        .enumerate()
        .map(|(i, fact)| format!("{}. {}", i + 1, fact))
        .collect::<Vec<_>>()
        .join("\n")
}
