use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request to chat API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("chat API returned no completion")]
    EmptyResponse,
}

/// Trait for chat-completion backends (OpenAI, OpenRouter, test stubs, etc.)
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    /// Send one request and return the first choice's message content, untrimmed.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiService {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiService {
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait::async_trait]
impl ChatClient for OpenAiService {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        log::info!(
            "🤖 Sending request to chat API with model: {} (max_tokens: {})",
            request.model,
            request.max_tokens
        );

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 Chat API response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("❌ Chat API error ({}): {}", status, body);
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ChatError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![
                ChatMessage::system("You are a nutritionist AI assistant."),
                ChatMessage::user("How is oatmeal?"),
            ],
            max_tokens: 300,
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn test_complete_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test_key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "max_tokens": 300,
                "temperature": 0.7,
                "messages": [
                    {"role": "system", "content": "You are a nutritionist AI assistant."},
                    {"role": "user", "content": "How is oatmeal?"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Oatmeal is great."}}]}"#)
            .create_async()
            .await;

        let service = OpenAiService::with_base_url("test_key".to_string(), server.url());
        let content = service.complete(&request()).await.unwrap();

        assert_eq!(content, "Oatmeal is great.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let service = OpenAiService::with_base_url("bad_key".to_string(), server.url());
        let err = service.complete(&request()).await.unwrap_err();

        match err {
            ChatError::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Incorrect API key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_without_choices() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let service = OpenAiService::with_base_url("test_key".to_string(), format!("{}/", server.url()));
        let err = service.complete(&request()).await.unwrap_err();

        assert!(matches!(err, ChatError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_complete_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let service = OpenAiService::with_base_url("test_key".to_string(), server.url());
        let err = service.complete(&request()).await.unwrap_err();

        assert!(matches!(err, ChatError::Http(_)));
    }
}
