//! Ollama text-generation provider.
//!
//! Talks to a locally running Ollama instance over its generate API.

use super::{ProviderError, TextGenerator};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Answer returned when the model produces an empty reply.
const NO_ANSWER: &str = "No answer generated.";

/// Instruction preamble prepended when context passages are supplied.
const CONTEXT_INSTRUCTIONS: &str = "You are a helpful assistant. \
Based on the context below, answer the user's question. \
If the user asks for a count, count the number of items in the context. \
If the user asks for a list, list the items. \
If the user asks for details, provide details from the context.";

/// Ollama provider configuration.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Full URL of the generate endpoint.
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/api/generate".to_string(),
            model: "deepseek-coder".to_string(),
        }
    }
}

/// Text generator backed by Ollama.
pub struct OllamaTextGenerator {
    config: OllamaConfig,
    client: Client,
}

impl OllamaTextGenerator {
    pub fn new(config: OllamaConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;

        Ok(Self { config, client })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Assemble the full prompt: instruction preamble, bulleted context, question.
pub(crate) fn build_prompt(question: &str, context: Option<&[String]>) -> String {
    match context {
        Some(docs) if !docs.is_empty() => {
            let context_text = docs
                .iter()
                .map(|doc| format!("- {}", doc))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "{}\n\nContext:\n{}\n\nQuestion: {}\nAnswer:",
                CONTEXT_INSTRUCTIONS, context_text, question
            )
        }
        _ => question.to_string(),
    }
}

#[async_trait]
impl TextGenerator for OllamaTextGenerator {
    async fn generate(
        &self,
        prompt: &str,
        context: Option<&[String]>,
    ) -> Result<String, ProviderError> {
        let full_prompt = build_prompt(prompt, context);

        let request = GenerateRequest {
            model: &self.config.model,
            prompt: &full_prompt,
            stream: false,
        };

        tracing::debug!(
            model = %self.config.model,
            prompt_len = full_prompt.len(),
            "Sending request to Ollama"
        );

        let response = self
            .client
            .post(&self.config.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Invalid Ollama response: {}", e)))?;

        Ok(match data.response {
            Some(text) if !text.is_empty() => text,
            _ => NO_ANSWER.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_includes_bulleted_context() {
        let context = vec!["Chai: 10 boxes".to_string(), "Chang: 24 bottles".to_string()];
        let prompt = build_prompt("How many beverages?", Some(&context));

        assert!(prompt.starts_with("You are a helpful assistant."));
        assert!(prompt.contains("- Chai: 10 boxes\n- Chang: 24 bottles"));
        assert!(prompt.ends_with("Question: How many beverages?\nAnswer:"));
    }

    #[test]
    fn test_prompt_without_context_is_passthrough() {
        assert_eq!(build_prompt("hello", None), "hello");
        assert_eq!(build_prompt("hello", Some(&[])), "hello");
    }
}
