//! GuardChat - guardrailed LLM chat through a locally managed proxy
//!
//! GuardChat is a command-line chat client for a locally running LLM proxy.
//! The proxy handles guardrail (content-safety) scanning and provider
//! routing; GuardChat owns the proxy's process lifecycle and the chat
//! session on top of it.
//!
//! ## Architecture
//!
//! ```text
//! CLI ──► ProxySupervisor ──spawn/health/stop──► proxy process
//!  │                                                  │
//!  └────► ChatSession ──► ProxyClient ──HTTP──────────┘
//! ```
//!
//! The supervisor guarantees at most one proxy instance per address:
//! `ensure_running` is an idempotent no-op while the health endpoint
//! answers, `stop` is best-effort and tolerates double-stop, and `restart`
//! always yields a fresh process. The session driver appends turns only for
//! exchanges the model actually saw; guardrail rejections and transport
//! failures are rolled back so flagged content never re-enters the context.
//!
//! ## Modules
//!
//! - [`supervisor`]: proxy process lifecycle (ensure/status/stop/restart)
//! - [`client`]: HTTP client for the health and chat endpoints
//! - [`chat`]: conversation state and the send/rollback contract
//! - [`repl`]: interactive loop and rendering
//! - [`config`]: TOML configuration

pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod repl;
pub mod supervisor;

pub use config::GuardChatConfig;
pub use error::{Error, Result};
