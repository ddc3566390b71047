//! Provider for any endpoint speaking the `/v1/chat/completions` protocol
//! (OpenAI, Ollama, LM Studio, vLLM and similar).
//!
//! Wire types stay private: the pipeline hands in [`PromptTurn`]s and gets an
//! [`LlmResponse`] back. One call is one HTTP round-trip. Failures are
//! returned, never retried; the classifier and synthesizer decide what a
//! fault means for the turn.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::config::OpenAiConfig;
use crate::llm::{LlmResponse, LlmUsage, PromptTurn, ProviderError};

const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// `api_key` comes from `LLM_API_KEY`; `None` sends no `Authorization`.
    pub fn from_config(config: &OpenAiConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("http client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.api_base_url.clone(),
            model: config.model.clone(),
            temperature: sampling_temperature(&config.model, config.temperature),
            api_key,
        })
    }

    /// Any HTTP answer, even 4xx, counts as reachable.
    pub async fn ping(&self) -> Result<(), ProviderError> {
        self.authorized(self.client.head(&self.endpoint).timeout(PING_TIMEOUT))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| ProviderError::Request(format!("unreachable: {e}")))
    }

    pub async fn complete(&self, turns: &[PromptTurn]) -> Result<LlmResponse, ProviderError> {
        let body = self.request_body(turns);
        debug!(model = %body.model, turns = body.messages.len(), "llm request");
        if tracing::enabled!(tracing::Level::TRACE) {
            match serde_json::to_string_pretty(&body) {
                Ok(json) => trace!(payload = %json, "llm request payload"),
                Err(e) => trace!(error = %e, "llm request payload not serializable"),
            }
        }

        let response = self
            .authorized(self.client.post(&self.endpoint).json(&body))
            .send()
            .await
            .map_err(|e| {
                error!(endpoint = %self.endpoint, error = %e, "llm transport failure");
                ProviderError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text);
            error!(status = status.as_u16(), %message, "llm returned an error status");
            return Err(ProviderError::Status { status: status.as_u16(), message });
        }

        let reply: CompletionReply = response
            .json()
            .await
            .map_err(|e| ProviderError::Request(format!("unreadable reply body: {e}")))?;
        into_response(reply)
    }

    fn request_body<'a>(&'a self, turns: &'a [PromptTurn]) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages: turns
                .iter()
                .map(|t| WireMessage { role: t.role.as_str(), content: &t.content })
                .collect(),
            temperature: self.temperature,
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

/// The gpt-5 family rejects an explicit temperature.
fn sampling_temperature(model: &str, temperature: f32) -> Option<f32> {
    (!model.starts_with("gpt-5")).then_some(temperature)
}

fn into_response(reply: CompletionReply) -> Result<LlmResponse, ProviderError> {
    let usage = reply.usage.map(|u| LlmUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
        cached_input_tokens: u.prompt_tokens_details.map_or(0, |d| d.cached_tokens),
    });
    let text = reply
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ProviderError::EmptyReply)?;
    Ok(LlmResponse { text, usage })
}

/// Pull `error.message` (and `error.code` when present) out of an error
/// body; fall back to the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error: ErrorBody { message, code: Some(code) } }) => {
            let code = match code {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            format!("{message} [code={code}]")
        }
        Ok(ErrorEnvelope { error: ErrorBody { message, code: None } }) => message,
        Err(_) => body.trim().to_string(),
    }
}

// ── wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}
