//! Prompt definition types.

use serde::{Deserialize, Serialize};

/// Identifier of the built-in grounded-answer prompt.
pub const DEFAULT_PROMPT_ID: &str = "rag.answer.default";

const DEFAULT_TEMPLATE: &str = "You are a helpful assistant. Answer the question using only the facts listed below.
If the facts do not contain the answer, say clearly that you do not have enough information to answer.
Do not use any knowledge that is not in the facts.

Facts:
{{facts}}

Question: {{query}}";

/// A prompt definition loaded from YAML.
///
/// The template sees three variables: `facts` (the numbered fact block,
/// one `"{n}. {fact}"` per line), `factCount` and `query`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Behavioral settings
    #[serde(default)]
    pub behavior: PromptBehavior,

    /// Template string with Handlebars syntax
    pub template: String,
}

/// Sampling hints carried with a prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PromptBehavior {
    /// Sampling temperature forwarded to the model, if set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum answer tokens forwarded to the model, if set
    #[serde(rename = "maxTokens", default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl PromptDefinition {
    /// The built-in grounded-answer definition.
    pub fn builtin_default() -> Self {
        Self {
            id: DEFAULT_PROMPT_ID.to_string(),
            title: "Grounded answer".to_string(),
            api_version: "1.0".to_string(),
            created_by: "factrag".to_string(),
            behavior: PromptBehavior::default(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: support.answer
title: Support answer
apiVersion: "1.0"
createdBy: ops
behavior:
  temperature: 0.1
  maxTokens: 256
template: "{{facts}}\n{{query}}"
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "support.answer");
        assert_eq!(def.behavior.temperature, Some(0.1));
        assert_eq!(def.behavior.max_tokens, Some(256));
    }

    #[test]
    fn test_behavior_is_optional() {
        let yaml = "id: x\ntitle: X\napiVersion: \"1.0\"\ntemplate: \"{{query}}\"\n";
        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.behavior, PromptBehavior::default());
        assert!(def.created_by.is_empty());
    }

    #[test]
    fn test_builtin_default_ends_with_query() {
        let def = PromptDefinition::builtin_default();
        assert_eq!(def.id, DEFAULT_PROMPT_ID);
        assert!(def.template.ends_with("{{query}}"));
        assert!(def.template.contains("{{facts}}"));
    }
}
