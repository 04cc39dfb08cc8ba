use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::ProviderConfig;

/// A chat-style language model
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String>;
}

pub struct OllamaProvider {
    client: ollama_rs::Ollama,
}

impl OllamaProvider {
    pub fn new(client: ollama_rs::Ollama) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};

        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(ChatMessage::system(sys));
        }
        messages.push(ChatMessage::user(prompt));

        let res = self
            .client
            .send_chat_messages(ChatMessageRequest::new(model.to_string(), messages))
            .await
            .with_context(|| format!("Ollama model '{}' did not return an analysis", model))?;

        Ok(res.message.content)
    }
}

pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            temperature: 0.2,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json_mode_body(model, prompt, system, self.temperature);

        let mut request = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request
            .send()
            .await
            .with_context(|| format!("Could not reach the analysis backend at {}", url))?
            .error_for_status()
            .with_context(|| format!("Analysis backend rejected the request for model '{}'", model))?;
        let json: Value = res.json().await.context("Analysis backend sent a non-JSON body")?;

        completion_text(&json)
    }
}

/// Chat request asking for a single JSON object back
fn json_mode_body(model: &str, prompt: String, system: Option<String>, temperature: f32) -> Value {
    let mut messages = Vec::new();
    if let Some(sys) = system {
        messages.push(json!({ "role": "system", "content": sys }));
    }
    messages.push(json!({ "role": "user", "content": prompt }));

    json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
        "response_format": { "type": "json_object" },
    })
}

/// Text of the first choice. An empty reply counts as no reply.
fn completion_text(json: &Value) -> Result<String> {
    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .context("Chat completion carried no analysis text")?;
    Ok(content.to_string())
}

/// Build the provider named by the profile
pub fn provider_from_config(config: &ProviderConfig) -> Arc<dyn LLMProvider> {
    match config {
        ProviderConfig::Ollama { host, port } => {
            Arc::new(OllamaProvider::new(ollama_rs::Ollama::new(host.clone(), *port)))
        }
        ProviderConfig::OpenAiCompatible { base_url, api_key, temperature } => Arc::new(
            OpenAICompatibleProvider::new(base_url.clone(), api_key.clone()).with_temperature(*temperature),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mode_body_puts_system_first() {
        let body = json_mode_body("gpt-4o-mini", "Score this".to_string(), Some("Be strict".to_string()), 0.2);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Score this");

        let body = json_mode_body("gpt-4o-mini", "Score this".to_string(), None, 0.2);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_completion_text() {
        let reply = json!({"choices": [{"message": {"content": " {\"scores\": {}} "}}]});
        assert_eq!(completion_text(&reply).unwrap(), "{\"scores\": {}}");

        let blank = json!({"choices": [{"message": {"content": "  "}}]});
        assert!(completion_text(&blank).is_err());
        assert!(completion_text(&json!({"error": "overloaded"})).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_backend_names_the_url() {
        let provider = OpenAICompatibleProvider::new("http://127.0.0.1:9".to_string(), None);
        let err = provider.generate("llama3.2", "hi".to_string(), None).await.unwrap_err();
        assert!(format!("{:#}", err).contains("127.0.0.1:9/chat/completions"));
    }
}
