//! Handle to the managed proxy process

use serde::{Deserialize, Serialize};
use std::fmt;

/// Readiness of the proxy process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    /// Process recorded but not yet probed
    Unknown,
    /// Process spawned, health not yet confirmed
    Starting,
    /// Health endpoint answered 2xx
    Ready,
    /// Process recorded but health endpoint no longer answers
    Unreachable,
    /// No process recorded
    Stopped,
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReadinessState::Unknown => "unknown",
            ReadinessState::Starting => "starting",
            ReadinessState::Ready => "ready",
            ReadinessState::Unreachable => "unreachable",
            ReadinessState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Identifies the managed proxy process
///
/// `pid` is `None` when the proxy answers health checks but was not started
/// by this supervisor (externally managed instance on the same port).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyHandle {
    /// Operating system process ID, when known
    pub pid: Option<u32>,

    /// Base URL the proxy listens on
    pub base_url: String,

    /// Last observed readiness
    pub state: ReadinessState,
}

impl ProxyHandle {
    /// Handle for an address with no recorded process
    pub fn stopped(base_url: impl Into<String>) -> Self {
        Self {
            pid: None,
            base_url: base_url.into(),
            state: ReadinessState::Stopped,
        }
    }

    /// Whether the proxy confirmed readiness on its last probe
    pub fn is_ready(&self) -> bool {
        self.state == ReadinessState::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_handle() {
        let handle = ProxyHandle::stopped("http://127.0.0.1:4000");
        assert_eq!(handle.state, ReadinessState::Stopped);
        assert!(handle.pid.is_none());
        assert!(!handle.is_ready());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ReadinessState::Ready.to_string(), "ready");
        assert_eq!(ReadinessState::Unreachable.to_string(), "unreachable");
    }

    #[test]
    fn test_handle_serialize() {
        let handle = ProxyHandle {
            pid: Some(4321),
            base_url: "http://127.0.0.1:4000".to_string(),
            state: ReadinessState::Ready,
        };
        let json = serde_json::to_string(&handle).unwrap();
        assert!(json.contains("\"ready\""));
        let parsed: ProxyHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, handle);
    }
}
