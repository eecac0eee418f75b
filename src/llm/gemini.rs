//! Google Gemini REST client (`embedContent` / `generateContent`).
//!
//! The API key travels in the `x-goog-api-key` header and is scrubbed from
//! every error message, so it never reaches logs or user-visible replies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{ConversationHandle, EmbeddingProvider, GenerationProvider};
use super::types::{ChatMessage, ChatRole};
use crate::core::config::ProviderSettings;
use crate::core::errors::{scrub_secret, RagError};

#[derive(Clone)]
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    embedding_model: String,
    generation_model: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(settings: &ProviderSettings, api_key: String) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| RagError::InvalidArgument(format!("http client: {}", e)))?;

        Ok(Self {
            base_url: settings.resolved_base_url(),
            api_key,
            embedding_model: model_path(&settings.embedding_model),
            generation_model: model_path(&settings.generation_model),
            client,
        })
    }

    fn method_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/{}:{}", self.base_url, model, method)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, String> {
        let res = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.scrub(&e.without_url().to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(self.scrub(&error_message(status.as_u16(), &text)));
        }

        res.json::<Value>()
            .await
            .map_err(|e| self.scrub(&format!("malformed response: {}", e.without_url())))
    }

    fn scrub(&self, message: &str) -> String {
        scrub_secret(message, &self.api_key)
    }
}

/// Accepts both `text-embedding-004` and `models/text-embedding-004`.
fn model_path(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect());
    format!("Gemini returned HTTP {}: {}", status, detail)
}

fn parse_embedding(payload: &Value) -> Result<Vec<f32>, String> {
    let values = payload["embedding"]["values"]
        .as_array()
        .ok_or_else(|| "response has no embedding values".to_string())?;

    let vector: Vec<f32> = values
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect();
    if vector.is_empty() || vector.len() != values.len() {
        return Err("embedding values are empty or not numeric".to_string());
    }
    Ok(vector)
}

fn parse_generation(payload: &Value) -> Result<String, String> {
    if let Some(reason) = payload["promptFeedback"]["blockReason"].as_str() {
        return Err(format!("prompt blocked: {}", reason));
    }

    let parts = payload["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| {
            let finish = payload["candidates"][0]["finishReason"]
                .as_str()
                .unwrap_or("no candidates");
            format!("response has no content ({})", finish)
        })?;

    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.trim().is_empty() {
        return Err("response text is empty".to_string());
    }
    Ok(text)
}

fn build_contents(history: &[ChatMessage], prompt: &str) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|m| {
            let role = match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();
    contents.push(json!({ "role": "user", "parts": [{ "text": prompt }] }));
    Value::Array(contents)
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let url = self.method_url(&self.embedding_model, "embedContent");
        let body = json!({
            "model": self.embedding_model,
            "content": { "parts": [{ "text": text }] },
        });

        let payload = self
            .post(&url, &body)
            .await
            .map_err(RagError::EmbeddingUnavailable)?;
        parse_embedding(&payload).map_err(RagError::EmbeddingUnavailable)
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.generation_model
    }

    async fn start_conversation(&self) -> Result<Box<dyn ConversationHandle>, RagError> {
        Ok(Box::new(GeminiConversation {
            provider: self.clone(),
        }))
    }
}

struct GeminiConversation {
    provider: GeminiProvider,
}

#[async_trait]
impl ConversationHandle for GeminiConversation {
    async fn send(&self, history: &[ChatMessage], prompt: &str) -> Result<String, RagError> {
        let url = self
            .provider
            .method_url(&self.provider.generation_model, "generateContent");
        let body = json!({ "contents": build_contents(history, prompt) });

        let payload = self
            .provider
            .post(&url, &body)
            .await
            .map_err(RagError::GenerationUnavailable)?;
        parse_generation(&payload).map_err(RagError::GenerationUnavailable)
    }
}
