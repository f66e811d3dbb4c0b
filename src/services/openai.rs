use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use super::prompt::{Prompt, UserContent};
use super::secrets::Credentials;
use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: UserContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Per-call model settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub max_tokens: u32,
    /// 0.0 is deterministic, 1.0 creative.
    pub temperature: f32,
}

impl CompletionOptions {
    pub fn new(model: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            temperature,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// One HTTP POST with a bearer token and a JSON body.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &Url,
        api_key: &str,
        body: &ChatRequest,
    ) -> Result<TransportResponse, GatewayError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::TransportFailure(format!("could not build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &Url,
        api_key: &str,
        body: &ChatRequest,
    ) -> Result<TransportResponse, GatewayError> {
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}

/// Chat-completion client: resolves the credential, posts once, returns the assistant text.
///
/// Never retries. Network, rate-limit and auth failures all come back as `GatewayError`.
pub struct OpenAIGateway {
    endpoint: String,
    credentials: Arc<Credentials>,
    transport: Arc<dyn ChatTransport>,
}

impl OpenAIGateway {
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Arc<Credentials>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials,
            transport,
        }
    }

    pub async fn complete(
        &self,
        tag: &str,
        prompt: &Prompt,
        options: &CompletionOptions,
    ) -> Result<String, GatewayError> {
        let api_key = self.credentials.api_key().ok_or_else(|| {
            log::error!("❌ [{}] No API key configured", tag);
            GatewayError::MissingCredential
        })?;

        let url = parse_endpoint(&self.endpoint)?;

        let request = ChatRequest {
            model: options.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: UserContent::Text(prompt.system.clone()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        log::info!("🤖 [{}] Sending request with model: {}", tag, options.model);
        if log::log_enabled!(log::Level::Debug) {
            let size = serde_json::to_vec(&request).map(|b| b.len()).unwrap_or(0);
            log::debug!("📤 [{}] Request payload size: {} bytes", tag, size);
        }

        let response = self.transport.post_json(&url, &api_key, &request).await.map_err(|e| {
            log::error!("❌ [{}] Request failed: {}", tag, e);
            e
        })?;

        log::debug!("📥 [{}] Response status: {}", tag, response.status);

        if !(200..300).contains(&response.status) {
            log::error!("❌ [{}] API error response ({}): {}", tag, response.status, response.body);
            return Err(GatewayError::TransportFailure(format!(
                "API error ({}): {}",
                response.status, response.body
            )));
        }

        let content = extract_content(&response.body).map_err(|e| {
            log::warn!("⚠️ [{}] Unexpected response: {}", tag, response.body);
            e
        })?;

        log::debug!("💬 [{}] Response content: {}", tag, content);
        Ok(content)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, GatewayError> {
    let url = Url::parse(endpoint)
        .map_err(|e| GatewayError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(GatewayError::InvalidEndpoint(format!(
            "unsupported scheme '{}' in {}",
            other, endpoint
        ))),
    }
}

/// Walks `choices[0].message.content` of a chat-completion envelope.
pub fn extract_content(body: &str) -> Result<String, GatewayError> {
    if body.trim().is_empty() {
        return Err(GatewayError::NoResponseBody);
    }

    let envelope: Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::MalformedEnvelope(format!("body is not JSON: {}", e)))?;

    let choice = envelope
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::MalformedEnvelope("missing 'choices'".to_string()))?
        .first()
        .ok_or_else(|| GatewayError::MalformedEnvelope("'choices' is empty".to_string()))?;

    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::MalformedEnvelope("missing 'message.content'".to_string()))
}
