//! Bedrock-backed chat model client

use super::{strip_reasoning, user_message, ChatModel, Message};
use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::primitives::Blob;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Chat-completion request body
#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

/// Chat-completion response body
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Chat client bound to a single Bedrock model id
pub struct BedrockChat {
    client: aws_sdk_bedrockruntime::Client,
    model_id: String,
    config: LlmConfig,
}

impl BedrockChat {
    pub fn new(
        client: aws_sdk_bedrockruntime::Client,
        model_id: impl Into<String>,
        config: LlmConfig,
    ) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            config,
        }
    }

    /// The model id this client invokes
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl ChatModel for BedrockChat {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model_id, chars = prompt.len(), "invoking chat model");

        let request = ChatRequest {
            messages: vec![user_message(prompt)],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
        };

        let response = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(serde_json::to_vec(&request)?))
            .send()
            .await
            .map_err(|e| LlmError::InvocationFailed(e.to_string()))?;

        let parsed: ChatResponse = serde_json::from_slice(response.body().as_ref())
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::EmptyCompletion(self.model_id.clone()))?;

        Ok(strip_reasoning(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_body_shape() {
        let request = ChatRequest {
            messages: vec![user_message("hola")],
            max_tokens: 2048,
            temperature: 0.1,
            top_p: 0.5,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hola");
        assert_eq!(value["max_tokens"], 2048);
    }

    #[test]
    fn test_chat_response_content_path() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hola"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hola");
    }
}
