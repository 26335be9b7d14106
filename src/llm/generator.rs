//! Code generation on top of an LLM provider.
//!
//! The pipeline treats the model as an opaque `(task) -> code_text`
//! collaborator; [`ScriptGenerator`] is the production implementation,
//! tests substitute scripted fakes.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::client::{GenerationRequest, LlmProvider, Message};
use crate::prompts;

/// Turns a natural-language task description into Python source text.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Returns the model's raw response text for the given task.
    ///
    /// Callers must still strip any surrounding code fences before treating
    /// the response as executable source.
    async fn generate_code(&self, task: &str) -> Result<String, LlmError>;
}

/// LLM-backed script generator.
pub struct ScriptGenerator {
    provider: Box<dyn LlmProvider>,
    /// Model identifier; empty defers to the provider's default.
    model: String,
    temperature: f64,
}

impl ScriptGenerator {
    /// Creates a generator on top of any LLM provider.
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self {
            provider,
            model: String::new(),
            temperature: 0.2,
        }
    }

    /// Sets the model identifier used for requests.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl CodeGenerator for ScriptGenerator {
    async fn generate_code(&self, task: &str) -> Result<String, LlmError> {
        let prompt = prompts::build_codegen_prompt(task);
        let request = GenerationRequest::new(
            self.model.clone(),
            vec![Message::system(prompt.system), Message::user(prompt.user)],
        )
        .with_temperature(self.temperature);

        let response = self.provider.generate(request).await?;
        let content = response.first_content().ok_or(LlmError::EmptyResponse)?;

        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::{Choice, GenerationResponse};
    use std::sync::{Arc, Mutex};

    struct CannedProvider {
        content: String,
        seen: Arc<Mutex<Vec<GenerationRequest>>>,
    }

    impl CannedProvider {
        fn new(content: impl Into<String>) -> Self {
            Self {
                content: content.into(),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.seen.lock().unwrap().push(request);
            if self.content.is_empty() {
                return Ok(GenerationResponse {
                    model: "fake".to_string(),
                    choices: Vec::new(),
                });
            }
            Ok(GenerationResponse {
                model: "fake".to_string(),
                choices: vec![Choice {
                    message: Message {
                        role: "assistant".to_string(),
                        content: self.content.clone(),
                    },
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_generate_code_returns_raw_response() {
        let generator = ScriptGenerator::new(Box::new(CannedProvider::new(
            "```python\nprint(1)\n```",
        )));

        let code = generator.generate_code("print the number one").await.unwrap();

        // Fence stripping is the caller's job, not the generator's.
        assert!(code.contains("```python"));
    }

    #[tokio::test]
    async fn test_generate_code_sends_task_and_temperature() {
        let provider = CannedProvider::new("print(1)");
        let seen = provider.seen.clone();
        let generator = ScriptGenerator::new(Box::new(provider))
            .with_model("test-model")
            .with_temperature(0.7);

        generator.generate_code("scrape the table").await.unwrap();

        let requests = seen.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[1].content.contains("scrape the table"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let generator = ScriptGenerator::new(Box::new(CannedProvider::new("")));
        let err = generator.generate_code("anything").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
