//! Wire types for the proxy chat endpoint

use serde::{Deserialize, Serialize};

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request body for the chat completions endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub stream: bool,

    /// Guardrail names the proxy should apply; an explicit empty list
    /// disables scanning (absent would fall back to the proxy default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardrails: Option<Vec<String>>,
}

/// Response body of a successful chat completion
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: AssistantMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: String,
}

impl ChatResponse {
    /// Completion text under the conventional field path, if non-empty
    pub fn completion(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .filter(|content| !content.is_empty())
    }
}

/// Per-call overrides for a chat turn
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Model override (None = session default)
    pub model: Option<String>,

    /// System message seeded once if the history has none yet
    pub system: Option<String>,

    /// Whether guardrail scanning is requested
    pub guardrails_enabled: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            model: None,
            system: None,
            guardrails_enabled: true,
        }
    }
}

/// One guardrail finding on a rejected request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailViolation {
    /// Detector category, e.g. `prompt_injection` or `pii/email`
    pub category: String,

    /// Detector confidence in [0, 1]; 0 when the proxy reported none
    pub score: f64,
}

impl GuardrailViolation {
    /// Human-readable name for the detector category
    pub fn display_name(&self) -> String {
        match self.category.as_str() {
            "moderated_content/crime" => "Crime-related content".to_string(),
            "moderated_content/hate" => "Hate speech".to_string(),
            "moderated_content/profanity" => "Profanity".to_string(),
            "moderated_content/sexual" => "Sexual content".to_string(),
            "moderated_content/violence" => "Violence".to_string(),
            "moderated_content/weapons" => "Weapons".to_string(),
            "pii/address" => "Personal address".to_string(),
            "pii/credit_card" => "Credit card number".to_string(),
            "pii/email" => "Email address".to_string(),
            "pii/iban_code" => "IBAN code".to_string(),
            "pii/ip_address" => "IP address".to_string(),
            "pii/name" => "Personal name".to_string(),
            "pii/phone_number" => "Phone number".to_string(),
            "pii/us_social_security_number" => "Social Security Number".to_string(),
            "prompt_attack" => "Prompt injection attack".to_string(),
            "jailbreak" => "Jailbreak attempt".to_string(),
            "prompt_injection" => "Prompt injection".to_string(),
            "unknown_links" => "Unknown links".to_string(),
            other => title_case(&other.replace('_', " ").replace('/', " - ")),
        }
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_serializes_lowercase_role() {
        let json = serde_json::to_string(&Turn::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn test_request_omits_absent_guardrails() {
        let request = ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![Turn::user("hi")],
            stream: false,
            guardrails: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("guardrails"));
    }

    #[test]
    fn test_request_keeps_empty_guardrail_list() {
        // An explicit empty list is meaningful: it disables scanning
        let request = ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![],
            stream: false,
            guardrails: Some(vec![]),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""guardrails":[]"#));
    }

    #[test]
    fn test_completion_extraction() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.completion(), Some("hello"));
    }

    #[test]
    fn test_completion_missing_or_empty() {
        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.completion(), None);

        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":""}}]}"#).unwrap();
        assert_eq!(blank.completion(), None);
    }

    #[test]
    fn test_display_name_known_categories() {
        let violation = GuardrailViolation {
            category: "prompt_injection".to_string(),
            score: 0.9,
        };
        assert_eq!(violation.display_name(), "Prompt injection");

        let pii = GuardrailViolation {
            category: "pii/credit_card".to_string(),
            score: 0.5,
        };
        assert_eq!(pii.display_name(), "Credit card number");
    }

    #[test]
    fn test_display_name_unknown_category() {
        let violation = GuardrailViolation {
            category: "custom/new_detector".to_string(),
            score: 0.1,
        };
        assert_eq!(violation.display_name(), "Custom - New Detector");
    }
}
