//! Client for OpenAI-compatible chat and embedding endpoints.

use super::{EmbeddingModel, GenerationRequest, LanguageModel, ModelReply};
use crate::core::EmbeddingVector;
use crate::errors::ProviderError;
use crate::tools::parse_openai_tool_calls;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Configuration for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer token. Local servers often need none.
    pub api_key: Option<String>,
    /// Chat model name.
    pub chat_model: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl OpenAiConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the chat model.
    #[must_use]
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Talks to `/chat/completions` and `/embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    config: OpenAiConfig,
    provider: String,
}

impl OpenAiCompatibleClient {
    /// Creates a client.
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::request("openai", e.to_string()))?;
        Ok(Self {
            client,
            config,
            provider: "openai".to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let url = self.url(path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await.map_err(|e| {
            ProviderError::request(&self.provider, format!("failed to reach {url}: {e}"))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::request(
                &self.provider,
                format!("{url} returned {status}: {text}"),
            ));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| ProviderError::invalid_response(&self.provider, e.to_string()))
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleClient {
    fn model_id(&self) -> &str {
        &self.config.chat_model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<ModelReply, ProviderError> {
        let mut body = json!({
            "model": self.config.chat_model,
            "messages": request.messages.iter().map(super::ChatMessage::to_openai).collect::<Vec<_>>(),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.clone());
        }

        let response = self.post("chat/completions", &body).await?;
        parse_chat_response(&self.provider, &response)
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiCompatibleClient {
    fn model_id(&self) -> &str {
        &self.config.embedding_model
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector, ProviderError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::invalid_response(&self.provider, "empty embedding list"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "model": self.config.embedding_model,
            "input": texts,
        });
        let response = self.post("embeddings", &body).await?;
        parse_embedding_response(&self.provider, &self.config.embedding_model, &response, texts.len())
    }
}

fn parse_chat_response(provider: &str, response: &Value) -> Result<ModelReply, ProviderError> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| ProviderError::invalid_response(provider, "missing choices[0].message"))?;

    let mut tool_calls = Vec::new();
    if let Some(raw) = message.get("tool_calls").and_then(Value::as_array) {
        for parsed in parse_openai_tool_calls(raw) {
            tool_calls.push(parsed.map_err(|e| ProviderError::invalid_response(provider, e))?);
        }
    }

    let usage = response.get("usage");
    let token_count = |key: &str| {
        usage
            .and_then(|u| u.get(key))
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    };

    Ok(ModelReply {
        content: message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        tool_calls,
        model: response
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        input_tokens: token_count("prompt_tokens"),
        output_tokens: token_count("completion_tokens"),
        finish_reason: response
            .pointer("/choices/0/finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[allow(clippy::cast_possible_truncation)]
fn parse_embedding_response(
    provider: &str,
    model: &str,
    response: &Value,
    expected: usize,
) -> Result<Vec<EmbeddingVector>, ProviderError> {
    let data = response
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::invalid_response(provider, "missing data array"))?;

    if data.len() != expected {
        return Err(ProviderError::invalid_response(
            provider,
            format!("expected {expected} embeddings, got {}", data.len()),
        ));
    }

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .map_or(position, |i| usize::try_from(i).unwrap_or(position));
        let values = item
            .get("embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::invalid_response(provider, "missing embedding"))?
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| ProviderError::invalid_response(provider, "non-numeric embedding"))?;
        indexed.push((index, EmbeddingVector::new(model, values)));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response_with_tool_calls() {
        let response = json!({
            "model": "gpt-test",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "calculate", "arguments": "{\"expression\": \"2*3\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        });

        let reply = parse_chat_response("openai", &response).unwrap();
        assert_eq!(reply.content, "");
        assert_eq!(reply.tool_calls[0].name, "calculate");
        assert_eq!(reply.tool_calls[0].arguments["expression"], "2*3");
        assert_eq!(reply.total_tokens(), 15);
        assert_eq!(reply.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn test_parse_chat_response_missing_choices() {
        assert!(parse_chat_response("openai", &json!({})).is_err());
    }

    #[test]
    fn test_parse_embedding_response_orders_by_index() {
        let response = json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let vectors = parse_embedding_response("openai", "emb", &response, 2).unwrap();
        assert_eq!(vectors[0].values(), &[1.0, 0.0]);
        assert_eq!(vectors[1].model(), "emb");
    }

    #[test]
    fn test_parse_embedding_response_count_mismatch() {
        let response = json!({"data": [{"index": 0, "embedding": [1.0]}]});
        assert!(parse_embedding_response("openai", "emb", &response, 2).is_err());
    }

    #[test]
    fn test_config_builder() {
        let cfg = OpenAiConfig::default()
            .with_base_url("http://localhost:11434/v1/")
            .with_chat_model("llama3");
        let client = OpenAiCompatibleClient::new(cfg).unwrap();
        assert_eq!(client.url("chat/completions"), "http://localhost:11434/v1/chat/completions");
        assert_eq!(LanguageModel::model_id(&client), "llama3");
    }
}
