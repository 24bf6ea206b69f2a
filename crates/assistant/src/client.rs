//! Chat-completion client for the hosted model.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::AssistantConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Model API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// No answer within the turn's time limit.
    #[error("Model did not answer within {}s", .0.as_secs())]
    Timeout(std::time::Duration),

    /// The service answered 2xx without any message content.
    #[error("Model returned no content")]
    EmptyResponse,
}

/// Anything that can complete a chat. Production uses [`MistralClient`];
/// tests substitute canned replies.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the full message list and return the raw text of the first choice.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AssistantError>;
}

/// HTTP client for the Mistral API.
///
/// Uses the agents route when an agent id is configured, otherwise the plain
/// chat route with the configured model.
pub struct MistralClient {
    client: reqwest::Client,
    config: AssistantConfig,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<Value>,
}

impl MistralClient {
    pub fn new(config: AssistantConfig) -> Result<Self, AssistantError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn request_target(&self, messages: &[ChatMessage]) -> (String, Value) {
        match &self.config.agent_id {
            Some(agent_id) => (
                format!("{}/v1/agents/completions", self.config.api_url),
                json!({ "agent_id": agent_id, "messages": messages }),
            ),
            None => (
                format!("{}/v1/chat/completions", self.config.api_url),
                json!({
                    "model": self.config.model,
                    "messages": messages,
                    "response_format": { "type": "json_object" },
                }),
            ),
        }
    }
}

#[async_trait]
impl LlmClient for MistralClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AssistantError> {
        let (url, body) = self.request_target(messages);
        tracing::debug!(url = %url, message_count = messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AssistantError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);

        content_to_text(content)
    }
}

/// Chunked content (an array of parts) is re-serialized as JSON text so the
/// reply parser still sees everything the model produced.
fn content_to_text(content: Option<Value>) -> Result<String, AssistantError> {
    let text = match content {
        None | Some(Value::Null) => return Err(AssistantError::EmptyResponse),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    };
    if text.trim().is_empty() {
        return Err(AssistantError::EmptyResponse);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn config(agent_id: Option<&str>) -> AssistantConfig {
        AssistantConfig {
            api_key: "k".into(),
            agent_id: agent_id.map(str::to_string),
            model: "mistral-large-latest".into(),
            api_url: "https://api.mistral.ai".into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn agent_route_when_agent_configured() {
        let client = MistralClient::new(config(Some("ag-123"))).unwrap();
        let (url, body) = client.request_target(&[ChatMessage::user("hi")]);
        assert_eq!(url, "https://api.mistral.ai/v1/agents/completions");
        assert_eq!(body["agent_id"], "ag-123");
        assert_eq!(body["messages"][0], json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn chat_route_without_agent() {
        let client = MistralClient::new(config(None)).unwrap();
        let (url, body) = client.request_target(&[ChatMessage::system("s")]);
        assert_eq!(url, "https://api.mistral.ai/v1/chat/completions");
        assert_eq!(body["model"], "mistral-large-latest");
        assert!(body.get("agent_id").is_none());
    }

    #[test]
    fn content_extraction() {
        assert_eq!(content_to_text(Some(json!("hello"))).unwrap(), "hello");
        assert_matches!(content_to_text(None), Err(AssistantError::EmptyResponse));
        assert_matches!(content_to_text(Some(json!("  "))), Err(AssistantError::EmptyResponse));
        assert_eq!(
            content_to_text(Some(json!([{"type": "text", "text": "x"}]))).unwrap(),
            r#"[{"type":"text","text":"x"}]"#
        );
    }
}
