use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

use super::provider::{ConversationHandle, EmbeddingProvider, GenerationProvider};
use super::types::ChatMessage;
use crate::core::config::ProviderSettings;
use crate::core::errors::{scrub_secret, RagError};

/// OpenAI-compatible backend (LM Studio, llama.cpp server, vLLM, ...).
#[derive(Clone)]
pub struct LmStudioProvider {
    base_url: String,
    api_key: Option<String>,
    embedding_model: String,
    generation_model: String,
    client: Client,
}

impl LmStudioProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| RagError::InvalidArgument(format!("http client: {}", e)))?;

        Ok(Self {
            base_url: settings.resolved_base_url(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            embedding_model: settings.embedding_model.clone(),
            generation_model: settings.generation_model.clone(),
            client,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, String> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| self.scrub(&e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(self.scrub(&format!("{} returned HTTP {}: {}", path, status, text)));
        }

        res.json::<Value>()
            .await
            .map_err(|e| self.scrub(&format!("malformed response: {}", e)))
    }

    fn scrub(&self, message: &str) -> String {
        match &self.api_key {
            Some(key) => scrub_secret(message, key),
            None => message.to_string(),
        }
    }
}

fn parse_embedding(payload: &Value) -> Result<Vec<f32>, String> {
    let vals = payload["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| "response has no embedding".to_string())?;
    let vec: Vec<f32> = vals
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect();
    if vec.is_empty() {
        return Err("embedding is empty".to_string());
    }
    Ok(vec)
}

fn parse_chat(payload: &Value) -> Result<String, String> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .filter(|content| !content.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| "response has no message content".to_string())
}

#[async_trait]
impl EmbeddingProvider for LmStudioProvider {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    fn model(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let body = json!({
            "model": self.embedding_model,
            "input": [text],
        });

        let payload = self
            .post("/v1/embeddings", &body)
            .await
            .map_err(RagError::EmbeddingUnavailable)?;
        parse_embedding(&payload).map_err(RagError::EmbeddingUnavailable)
    }
}

#[async_trait]
impl GenerationProvider for LmStudioProvider {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    fn model(&self) -> &str {
        &self.generation_model
    }

    async fn start_conversation(&self) -> Result<Box<dyn ConversationHandle>, RagError> {
        Ok(Box::new(LmStudioConversation {
            provider: self.clone(),
        }))
    }
}

struct LmStudioConversation {
    provider: LmStudioProvider,
}

#[async_trait]
impl ConversationHandle for LmStudioConversation {
    async fn send(&self, history: &[ChatMessage], prompt: &str) -> Result<String, RagError> {
        let mut messages: Vec<ChatMessage> = history.to_vec();
        messages.push(ChatMessage::user(prompt));

        let body = json!({
            "model": self.provider.generation_model,
            "messages": messages,
            "stream": false,
        });

        let payload = self
            .provider
            .post("/v1/chat/completions", &body)
            .await
            .map_err(RagError::GenerationUnavailable)?;
        parse_chat(&payload).map_err(RagError::GenerationUnavailable)
    }
}
