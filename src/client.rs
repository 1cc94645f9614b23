//! HTTP client for the proxy chat and health endpoints

use crate::chat::{ChatRequest, ChatResponse, GuardrailViolation};
use crate::config::{ChatConfig, ProxyConfig};
use serde_json::Value;
use std::time::Duration;

/// Failure modes of one chat exchange
#[derive(Debug, Clone, PartialEq)]
pub enum ChatError {
    /// The proxy rejected the request after guardrail scanning
    Guardrail(Vec<GuardrailViolation>),

    /// Network or HTTP-level failure (no guardrail verdict involved)
    Transport {
        status: Option<u16>,
        detail: String,
    },
}

/// Client for the proxy's HTTP endpoints
pub struct ProxyClient {
    http: reqwest::Client,
    health_url: String,
    chat_url: String,
    api_key: String,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl ProxyClient {
    pub fn new(proxy: &ProxyConfig, chat: &ChatConfig) -> Self {
        let base_url = proxy.base_url();
        Self {
            http: reqwest::Client::new(),
            health_url: format!("{}{}", base_url, proxy.health_path),
            chat_url: format!("{}{}", base_url, proxy.chat_path),
            api_key: chat.api_key.clone(),
            probe_timeout: Duration::from_secs(proxy.probe_timeout_secs),
            request_timeout: Duration::from_secs(chat.request_timeout_secs),
        }
    }

    /// Whether the proxy answers its health endpoint
    pub async fn health_check(&self) -> bool {
        match self
            .http
            .get(&self.health_url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// One chat completion exchange against the proxy.
    pub async fn chat_completion(
        &self,
        request: &ChatRequest,
    ) -> std::result::Result<ChatResponse, ChatError> {
        let response = self
            .http
            .post(&self.chat_url)
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::Transport {
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<ChatResponse>()
                .await
                .map_err(|e| ChatError::Transport {
                    status: Some(status.as_u16()),
                    detail: format!("malformed completion body: {}", e),
                });
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, "proxy returned error");
        Err(classify_error(status.as_u16(), &body))
    }
}

/// Turn a non-2xx body into a guardrail rejection or a transport error.
fn classify_error(status: u16, body: &str) -> ChatError {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let violations = violations_from_error_body(&value);
        if !violations.is_empty() {
            return ChatError::Guardrail(violations);
        }

        let detail = value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| value.get("error").map(|e| e.to_string()))
            .unwrap_or_else(|| body.to_string());
        return ChatError::Transport {
            status: Some(status),
            detail,
        };
    }

    ChatError::Transport {
        status: Some(status),
        detail: body.to_string(),
    }
}

/// Extract guardrail violations from the shapes the proxy is known to emit:
/// the canonical `error.type = "guardrail_violation"` form, a top-level
/// scanner breakdown, the same breakdown embedded as a JSON string inside
/// `error.message`, and the legacy `error.lakera_ai_response` form.
pub(crate) fn violations_from_error_body(value: &Value) -> Vec<GuardrailViolation> {
    if let Some(error) = value.get("error") {
        if error.get("type").and_then(Value::as_str) == Some("guardrail_violation") {
            if let Some(list) = error.get("violations").and_then(Value::as_array) {
                let parsed: Vec<GuardrailViolation> = list
                    .iter()
                    .filter_map(|entry| {
                        Some(GuardrailViolation {
                            category: entry.get("category")?.as_str()?.to_string(),
                            score: entry.get("score").and_then(Value::as_f64).unwrap_or(0.0),
                        })
                    })
                    .collect();
                if !parsed.is_empty() {
                    return parsed;
                }
            }
        }
    }

    if let Some(found) = breakdown_violations(value) {
        return found;
    }

    if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
        if let Ok(embedded) = serde_json::from_str::<Value>(message) {
            if let Some(found) = breakdown_violations(&embedded) {
                return found;
            }
        }
    }

    if let Some(result) = value.pointer("/error/lakera_ai_response/results/0") {
        if result.get("flagged").and_then(Value::as_bool).unwrap_or(false) {
            let scores = result.get("category_scores");
            if let Some(categories) = result.get("categories").and_then(Value::as_object) {
                let flagged: Vec<GuardrailViolation> = categories
                    .iter()
                    .filter(|(_, flagged)| flagged.as_bool().unwrap_or(false))
                    .map(|(category, _)| GuardrailViolation {
                        category: category.clone(),
                        score: scores
                            .and_then(|s| s.get(category))
                            .and_then(Value::as_f64)
                            .unwrap_or(0.0),
                    })
                    .collect();
                if !flagged.is_empty() {
                    return flagged;
                }
            }
        }
    }

    Vec::new()
}

/// Detector breakdown as emitted by the scanning guardrail
fn breakdown_violations(value: &Value) -> Option<Vec<GuardrailViolation>> {
    let breakdown = value
        .pointer("/lakera_guardrail_response/breakdown")?
        .as_array()?;
    let found: Vec<GuardrailViolation> = breakdown
        .iter()
        .filter(|detector| {
            detector
                .get("detected")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
        .map(|detector| GuardrailViolation {
            category: detector
                .get("detector_type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            score: detector.get("score").and_then(Value::as_f64).unwrap_or(1.0),
        })
        .collect();
    (!found.is_empty()).then_some(found)
}
