//! Conversation state and the send/rollback contract

use crate::chat::types::{ChatRequest, GuardrailViolation, Role, SendOptions, Turn};
use crate::client::{ChatError, ProxyClient};
use crate::config::ChatConfig;

/// Outcome of one chat turn
///
/// A tagged result rather than an error type: guardrail rejections are an
/// expected outcome, not a system fault, and every caller has to handle
/// each case explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Assistant completion; the exchange was appended to history
    Reply(String),

    /// Guardrails rejected the message; history is unchanged
    Rejected(Vec<GuardrailViolation>),

    /// Transport or provider failure; history is unchanged
    Failed {
        status: Option<u16>,
        detail: String,
    },
}

/// A chat session with conversation history
pub struct ChatSession {
    client: ProxyClient,
    model: String,
    guardrails: Vec<String>,
    seed_system: Option<String>,
    turns: Vec<Turn>,
}

impl ChatSession {
    pub fn new(client: ProxyClient, config: &ChatConfig) -> Self {
        let mut turns = Vec::new();
        if let Some(system) = &config.system {
            turns.push(Turn::system(system));
        }
        Self {
            client,
            model: config.default_model.clone(),
            guardrails: config.guardrails.clone(),
            seed_system: config.system.clone(),
            turns,
        }
    }

    /// Ordered conversation history
    pub fn history(&self) -> &[Turn] {
        &self.turns
    }

    /// Send one user message and record the exchange.
    ///
    /// On a reply the user and assistant turns are appended (history grows
    /// by exactly two). On rejection or failure the appended user turn is
    /// rolled back: the model never saw it, so it must not occupy context
    /// on the next call.
    pub async fn send(&mut self, message: &str, options: &SendOptions) -> SendOutcome {
        if let Some(system) = &options.system {
            if !self.turns.iter().any(|turn| turn.role == Role::System) {
                self.turns.push(Turn::system(system));
            }
        }
        self.turns.push(Turn::user(message));

        let request = ChatRequest {
            model: options.model.clone().unwrap_or_else(|| self.model.clone()),
            messages: self.turns.clone(),
            stream: false,
            guardrails: if options.guardrails_enabled {
                Some(self.guardrails.clone())
            } else {
                // Explicit empty list: absent would fall back to the
                // proxy's default scanner
                Some(Vec::new())
            },
        };

        match self.client.chat_completion(&request).await {
            Ok(response) => match response.completion() {
                Some(content) => {
                    let content = content.to_string();
                    self.turns.push(Turn::assistant(&content));
                    SendOutcome::Reply(content)
                }
                None => {
                    self.rollback_user_turn();
                    SendOutcome::Failed {
                        status: None,
                        detail: "empty completion in proxy response".to_string(),
                    }
                }
            },
            Err(ChatError::Guardrail(violations)) => {
                tracing::info!(count = violations.len(), "message rejected by guardrails");
                self.rollback_user_turn();
                SendOutcome::Rejected(violations)
            }
            Err(ChatError::Transport { status, detail }) => {
                tracing::warn!(status = ?status, "chat request failed: {}", detail);
                self.rollback_user_turn();
                SendOutcome::Failed { status, detail }
            }
        }
    }

    /// Truncate history to empty, or to the seeded system message only.
    pub fn reset(&mut self) {
        self.turns.clear();
        if let Some(system) = &self.seed_system {
            self.turns.push(Turn::system(system));
        }
    }

    fn rollback_user_turn(&mut self) {
        if self.turns.last().map(|turn| turn.role) == Some(Role::User) {
            self.turns.pop();
        }
    }
}
