use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::error::{BotError, Result};
use crate::types::MessageRole;

// Discord caps a message at 2000 characters, roughly 500 tokens.
const MAX_TOKENS: u32 = 500;

const TEMPERATURE: f64 = 0.7;

/// Anything that can turn a system prompt and user content into a reply.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the completion service fails or answers with no text.
    async fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: MessageRole,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct CompletionClient {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
    model: String,
}

impl CompletionClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            client,
            model: config.model.clone(),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: MessageRole::System,
                    content: system_prompt,
                },
                Message {
                    role: MessageRole::User,
                    content: user_content,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        debug!(
            "Sending completion request to {} (model {}, system prompt {} chars)",
            self.api_url,
            self.model,
            system_prompt.len()
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {e}"));
            return Err(BotError::CompletionApi { status, message });
        }

        let api_response: CompletionResponse = response.json().await?;
        let reply = extract_reply(api_response)?;

        debug!("Received completion of {} characters", reply.len());
        Ok(reply)
    }
}

fn extract_reply(response: CompletionResponse) -> Result<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BotError::CompletionResponse("No choices in response".to_string()))?
        .message
        .content
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(BotError::CompletionResponse(
            "Completion contained no text".to_string(),
        ));
    }
    Ok(content)
}
