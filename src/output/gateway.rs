//! Transformation gateway: the remote service each chunk is sent to.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GatewayError;
use crate::types::{PipelineConfig, PipelineMode};

/// Instruction used in document mode when none is configured.
pub const DOCUMENTATION_INSTRUCTION: &str = "You document Java source code. \
Add Javadoc to every class, field and method and inline comments inside method bodies. \
Do not change any executable code. Return only the complete source code, without \
Markdown fences or any text before or after it.";

/// Instruction used in graph mode when none is configured.
pub const ANALYSIS_INSTRUCTION: &str = "You analyse Java source code for architectural \
relationships. Reply with a single JSON object of the form \
{\"classes\": [{\"name\": \"\", \"methods\": [], \"fields\": []}], \
\"relationships\": [{\"from\": \"Class.method\", \"to\": \"Class.method\", \"type\": \"method_call\"}], \
\"external_calls\": [{\"from\": \"Class.method\", \"to\": \"Library.call\", \"type\": \"external_call\"}]} \
and nothing else.";

/// A service that turns one chunk's text into new text.
///
/// Implementations receive raw chunk text and return raw text; callers own
/// retries, timeouts and fallback.
#[async_trait]
pub trait TransformGateway: Send + Sync {
    async fn transform(&self, chunk_text: &str) -> Result<String, GatewayError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Gateway for OpenAI-compatible `/chat/completions` endpoints.
pub struct HttpTransformGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    instruction: String,
    timeout: Duration,
}

impl HttpTransformGateway {
    /// Create a new gateway.
    pub fn new(
        base_url: &str,
        model: &str,
        instruction: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model: model.to_string(),
            instruction: instruction.into(),
            timeout,
        })
    }

    /// Gateway configured from the pipeline configuration and mode.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, GatewayError> {
        let instruction = config.instruction.clone().unwrap_or_else(|| {
            match config.mode {
                PipelineMode::Document => DOCUMENTATION_INSTRUCTION,
                PipelineMode::Graph => ANALYSIS_INSTRUCTION,
            }
            .to_string()
        });
        let model = wire_model(config);
        let gateway = Self::new(&config.api_base, &model, instruction, config.request_timeout())?;
        Ok(match &config.api_key {
            Some(key) => gateway.with_api_key(key),
            None => gateway,
        })
    }

    /// Set the bearer token.
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn classify(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Unavailable(err.to_string())
        }
    }
}

/// Model identifier sent on the wire: the preset's model name when the
/// configured name is a known preset, otherwise the name as given.
fn wire_model(config: &PipelineConfig) -> String {
    config
        .model_preset()
        .map(|p| p.model_name.to_string())
        .unwrap_or_else(|_| config.model.clone())
}

#[async_trait]
impl TransformGateway for HttpTransformGateway {
    async fn transform(&self, chunk_text: &str) -> Result<String, GatewayError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.instruction,
                },
                ChatMessage {
                    role: "user",
                    content: chunk_text,
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| self.classify(e))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GatewayError::InvalidResponse("reply carried no content".to_string()))?;

        debug!(bytes_in = chunk_text.len(), bytes_out = content.len(), "Chunk transformed");
        Ok(strip_code_fence(&content))
    }
}

/// Map a non-success HTTP status to a gateway error.
pub fn status_error(status: StatusCode, body: &str) -> GatewayError {
    let detail = format!("{status}: {}", body.chars().take(200).collect::<String>());
    if status == StatusCode::TOO_MANY_REQUESTS {
        GatewayError::RateLimited(detail)
    } else if status.is_server_error() {
        GatewayError::Unavailable(detail)
    } else {
        GatewayError::Rejected(detail)
    }
}

/// Remove a single Markdown code fence wrapping the whole reply.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !(trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() >= 6) {
        return text.to_string();
    }

    let inner = &trimmed[3..trimmed.len() - 3];
    // Drop the language tag on the opening fence line
    match inner.split_once('\n') {
        Some((_, body)) => body.trim_end_matches('\n').to_string(),
        None => inner.trim().to_string(),
    }
}
