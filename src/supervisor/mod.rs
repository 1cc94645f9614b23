//! Proxy process lifecycle management
//!
//! Guarantees a single healthy proxy process is reachable at the configured
//! address: idempotent ensure-running, non-spawning status, best-effort stop,
//! and restart. Readiness is confirmed by polling the health endpoint.

mod handle;
mod manager;

pub use handle::{ProxyHandle, ReadinessState};
pub use manager::ProxySupervisor;
