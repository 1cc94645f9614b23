//! Chat session driver
//!
//! Maintains conversation history across turns and translates each user
//! message into one exchange with the proxy. Guardrail rejections come back
//! as a distinct outcome, and rejected or failed turns are rolled back so
//! flagged content never leaks into later context.

mod session;
mod types;

pub use session::{ChatSession, SendOutcome};
pub use types::{
    AssistantMessage, ChatRequest, ChatResponse, Choice, GuardrailViolation, Role, SendOptions,
    Turn,
};
