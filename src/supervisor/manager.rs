//! Proxy supervisor: spawn, readiness polling, stop, restart
//!
//! A `ProxySupervisor` is the sole mutator of the proxy process lifecycle.
//! Each instance owns its own process record (no ambient global state), and
//! a PID marker file lets a later invocation adopt a proxy started earlier.

use crate::config::{default_pid_file, ProxyConfig};
use crate::error::{Error, Result};
use crate::supervisor::handle::{ProxyHandle, ReadinessState};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};

/// Manages the lifecycle of a single proxy process
pub struct ProxySupervisor {
    config: ProxyConfig,
    http: reqwest::Client,
    pid_file: PathBuf,
    /// Child spawned by this supervisor instance
    child: Option<Child>,
    /// Last recorded handle (may describe an adopted process)
    handle: Option<ProxyHandle>,
}

impl ProxySupervisor {
    /// Create a supervisor, adopting a live proxy from the PID marker file
    /// when one exists.
    pub fn new(config: ProxyConfig) -> Self {
        let pid_file = config.pid_file.clone().unwrap_or_else(default_pid_file);
        let handle = read_pid_file(&pid_file).and_then(|pid| {
            if is_process_alive(pid) {
                tracing::debug!(pid, "adopting proxy process from pid file");
                Some(ProxyHandle {
                    pid: Some(pid),
                    base_url: config.base_url(),
                    state: ReadinessState::Unknown,
                })
            } else {
                tracing::debug!(pid, "removing stale pid file");
                let _ = std::fs::remove_file(&pid_file);
                None
            }
        });

        Self {
            http: reqwest::Client::new(),
            pid_file,
            config,
            child: None,
            handle,
        }
    }

    /// Base URL of the supervised proxy
    pub fn base_url(&self) -> String {
        self.config.base_url()
    }

    /// Guarantee a healthy proxy is reachable, launching one if necessary.
    ///
    /// If the health endpoint already answers, the recorded handle is
    /// returned unchanged (at-most-one-instance guarantee). A recorded
    /// process that stopped answering is torn down before the relaunch.
    pub async fn ensure_running(&mut self) -> Result<ProxyHandle> {
        if self.probe().await {
            let mut handle = self
                .handle
                .take()
                .unwrap_or_else(|| ProxyHandle::stopped(self.config.base_url()));
            handle.state = ReadinessState::Ready;
            handle.base_url = self.config.base_url();
            self.handle = Some(handle.clone());
            tracing::debug!(pid = ?handle.pid, url = %handle.base_url, "proxy already running");
            return Ok(handle);
        }

        if self.handle.is_some() {
            tracing::warn!("recorded proxy stopped answering health checks, relaunching");
            self.stop().await;
        }

        self.launch().await
    }

    /// Single health probe without starting anything.
    pub async fn status(&mut self) -> ProxyHandle {
        let healthy = self.probe().await;
        let base_url = self.config.base_url();

        let handle = match (&self.handle, healthy) {
            (Some(recorded), true) => ProxyHandle {
                state: ReadinessState::Ready,
                ..recorded.clone()
            },
            // Healthy but nothing recorded: an externally managed instance
            (None, true) => ProxyHandle {
                pid: None,
                base_url,
                state: ReadinessState::Ready,
            },
            (Some(recorded), false) => ProxyHandle {
                state: ReadinessState::Unreachable,
                ..recorded.clone()
            },
            (None, false) => ProxyHandle::stopped(base_url),
        };

        if self.handle.is_some() {
            self.handle = Some(handle.clone());
        }
        handle
    }

    /// Stop the recorded proxy process, best-effort.
    ///
    /// Sends a termination signal, waits up to the grace period, then force
    /// kills. Always clears the recorded handle and PID marker; tolerates
    /// double-stop and already-dead processes.
    pub async fn stop(&mut self) {
        let grace = Duration::from_secs(self.config.stop_grace_secs);

        if let Some(mut child) = self.child.take() {
            tracing::info!(pid = ?child.id(), "stopping proxy");
            request_exit(&mut child);
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => tracing::debug!(%status, "proxy exited"),
                Ok(Err(e)) => tracing::warn!("wait on proxy failed: {}", e),
                Err(_) => {
                    tracing::warn!("grace period expired, force killing proxy");
                    let _ = child.kill().await;
                }
            }
        } else if let Some(pid) = self.handle.as_ref().and_then(|h| h.pid) {
            // Adopted from a previous invocation: only the PID is known
            terminate_by_pid(pid, grace).await;
        }

        self.remove_pid_file();
        self.handle = None;
    }

    /// Stop the proxy and bring up a fresh process.
    ///
    /// Required after proxy configuration changes; the proxy has no live
    /// reload.
    pub async fn restart(&mut self) -> Result<ProxyHandle> {
        self.stop().await;
        self.ensure_running().await
    }

    /// Spawn the proxy and poll its health endpoint until ready.
    async fn launch(&mut self) -> Result<ProxyHandle> {
        let executable = self.resolve_executable()?;
        if let Some(config_file) = &self.config.config_file {
            if !config_file.exists() {
                return Err(Error::Config(format!(
                    "proxy config file not found: {}",
                    config_file.display()
                )));
            }
        }

        // Child output goes to a log file so it survives this process and
        // never blocks the child on a full pipe.
        let log_path = self.pid_file.with_extension("log");
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log = std::fs::File::create(&log_path)?;
        let log_err = log.try_clone()?;

        let mut command = Command::new(&executable);
        command.args(&self.config.extra_args);
        if let Some(config_file) = &self.config.config_file {
            command.arg("--config").arg(config_file);
        }
        command.arg("--port").arg(self.config.port.to_string());
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));

        tracing::info!(
            executable = %executable.display(),
            port = self.config.port,
            log = %log_path.display(),
            "spawning proxy"
        );

        let mut child = command.spawn().map_err(|e| {
            Error::Launch(format!("failed to spawn {}: {}", executable.display(), e))
        })?;
        let pid = child.id();
        self.write_pid_file(pid);

        let started = Instant::now();
        let timeout = Duration::from_secs(self.config.startup_timeout_secs);
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| Error::Launch(format!("wait on proxy failed: {}", e)))?
            {
                self.remove_pid_file();
                return Err(Error::Launch(format!(
                    "proxy exited during startup with {} (see {})",
                    status,
                    log_path.display()
                )));
            }

            if self.probe().await {
                let handle = ProxyHandle {
                    pid,
                    base_url: self.config.base_url(),
                    state: ReadinessState::Ready,
                };
                tracing::info!(
                    pid = ?pid,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "proxy ready"
                );
                self.child = Some(child);
                self.handle = Some(handle.clone());
                return Ok(handle);
            }

            if started.elapsed() >= timeout {
                let waited_secs = started.elapsed().as_secs();
                tracing::error!(waited_secs, "proxy never confirmed readiness, tearing it down");
                request_exit(&mut child);
                let grace = Duration::from_secs(self.config.stop_grace_secs);
                if tokio::time::timeout(grace, child.wait()).await.is_err() {
                    let _ = child.kill().await;
                }
                self.remove_pid_file();
                return Err(Error::StartupTimeout { waited_secs });
            }

            tokio::time::sleep(interval).await;
        }
    }

    /// One bounded GET against the health endpoint; 2xx = ready.
    async fn probe(&self) -> bool {
        let url = format!("{}{}", self.config.base_url(), self.config.health_path);
        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        match self.http.get(&url).timeout(timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn resolve_executable(&self) -> Result<PathBuf> {
        if let Some(executable) = &self.config.executable {
            return Ok(executable.clone());
        }

        // Check PATH via `which`
        if let Ok(output) = std::process::Command::new("which").arg("litellm").output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Ok(PathBuf::from(path));
                }
            }
        }

        // Check common locations
        let home = dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let candidates = [
            home.join(".local").join("bin").join("litellm"),
            PathBuf::from("/usr/local/bin/litellm"),
            PathBuf::from("/opt/homebrew/bin/litellm"),
        ];
        for candidate in &candidates {
            if candidate.exists() {
                return Ok(candidate.clone());
            }
        }

        Err(Error::Launch(
            "litellm executable not found; set proxy.executable in the configuration"
                .to_string(),
        ))
    }

    fn write_pid_file(&self, pid: Option<u32>) {
        let Some(pid) = pid else { return };
        if let Some(parent) = self.pid_file.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&self.pid_file, pid.to_string()) {
            tracing::warn!(path = %self.pid_file.display(), "cannot write pid file: {}", e);
        }
    }

    fn remove_pid_file(&self) {
        let _ = std::fs::remove_file(&self.pid_file);
    }
}

/// Ask a spawned child to exit (SIGTERM on unix, hard kill elsewhere)
fn request_exit(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            return;
        }
    }
    let _ = child.start_kill();
}

/// Terminate a process we did not spawn, identified only by PID
async fn terminate_by_pid(pid: u32, grace: Duration) {
    if !is_process_alive(pid) {
        return;
    }
    tracing::info!(pid, "stopping adopted proxy process");
    send_signal(pid, TERM_SIGNAL);

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !is_process_alive(pid) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    tracing::warn!(pid, "grace period expired, force killing adopted proxy");
    send_signal(pid, KILL_SIGNAL);
}

#[cfg(unix)]
const TERM_SIGNAL: i32 = libc::SIGTERM;
#[cfg(unix)]
const KILL_SIGNAL: i32 = libc::SIGKILL;
#[cfg(not(unix))]
const TERM_SIGNAL: i32 = 0;
#[cfg(not(unix))]
const KILL_SIGNAL: i32 = 0;

/// Check if a process is alive by sending signal 0
fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

fn send_signal(pid: u32, signal: i32) {
    #[cfg(unix)]
    {
        unsafe { libc::kill(pid as i32, signal) };
    }
    #[cfg(not(unix))]
    {
        let _ = (pid, signal);
    }
}

fn read_pid_file(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tokio::net::TcpListener;

    async fn spawn_health_server() -> (u16, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let app = Router::new().route("/health", get(|| async { "ok" }));
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (port, server)
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn test_config(port: u16, dir: &Path) -> ProxyConfig {
        ProxyConfig {
            port,
            // Any spawn attempt fails loudly unless a test overrides this
            executable: Some(PathBuf::from("/nonexistent/guardchat-test-proxy")),
            pid_file: Some(dir.join("proxy.pid")),
            startup_timeout_secs: 1,
            poll_interval_ms: 100,
            stop_grace_secs: 1,
            probe_timeout_secs: 1,
            ..ProxyConfig::default()
        }
    }

    #[tokio::test]
    async fn test_ensure_running_idempotent_when_healthy() {
        let dir = tempfile::TempDir::new().unwrap();
        let (port, _server) = spawn_health_server().await;
        let mut supervisor = ProxySupervisor::new(test_config(port, dir.path()));

        let first = supervisor.ensure_running().await.unwrap();
        assert_eq!(first.state, ReadinessState::Ready);
        assert!(first.pid.is_none()); // externally managed, never spawned

        let second = supervisor.ensure_running().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_status_without_process_is_stopped() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut supervisor = ProxySupervisor::new(test_config(free_port(), dir.path()));

        let handle = supervisor.status().await;
        assert_eq!(handle.state, ReadinessState::Stopped);
        assert!(handle.pid.is_none());
    }

    #[tokio::test]
    async fn test_status_sees_external_proxy() {
        let dir = tempfile::TempDir::new().unwrap();
        let (port, _server) = spawn_health_server().await;
        let mut supervisor = ProxySupervisor::new(test_config(port, dir.path()));

        let handle = supervisor.status().await;
        assert_eq!(handle.state, ReadinessState::Ready);
        assert!(handle.pid.is_none());
    }

    #[tokio::test]
    async fn test_launch_failure_missing_executable() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut supervisor = ProxySupervisor::new(test_config(free_port(), dir.path()));

        let err = supervisor.ensure_running().await.unwrap_err();
        assert!(matches!(err, Error::Launch(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_launch_failure_on_early_exit() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = test_config(free_port(), dir.path());
        config.executable = Some(PathBuf::from("/bin/false"));

        let mut supervisor = ProxySupervisor::new(config);
        let err = supervisor.ensure_running().await.unwrap_err();
        assert!(matches!(err, Error::Launch(_)), "got {err:?}");
        assert!(!dir.path().join("proxy.pid").exists());
    }

    #[tokio::test]
    async fn test_startup_timeout_when_health_never_answers() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = test_config(free_port(), dir.path());
        // Stays alive but never opens the port
        config.executable = Some(PathBuf::from("/bin/sh"));
        config.extra_args = vec!["-c".to_string(), "exec sleep 30".to_string()];

        let mut supervisor = ProxySupervisor::new(config);
        let err = supervisor.ensure_running().await.unwrap_err();
        assert!(
            matches!(err, Error::StartupTimeout { waited_secs } if waited_secs >= 1),
            "got {err:?}"
        );

        // Half-started child is torn down, nothing recorded
        let handle = supervisor.status().await;
        assert_eq!(handle.state, ReadinessState::Stopped);
        assert!(!dir.path().join("proxy.pid").exists());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut supervisor = ProxySupervisor::new(test_config(free_port(), dir.path()));

        supervisor.stop().await;
        supervisor.stop().await;

        let handle = supervisor.status().await;
        assert_eq!(handle.state, ReadinessState::Stopped);
    }

    #[tokio::test]
    async fn test_stale_pid_file_removed_on_construction() {
        let dir = tempfile::TempDir::new().unwrap();
        let pid_file = dir.path().join("proxy.pid");
        std::fs::write(&pid_file, "99999999").unwrap();

        let mut supervisor = ProxySupervisor::new(test_config(free_port(), dir.path()));
        assert!(!pid_file.exists());

        let handle = supervisor.status().await;
        assert_eq!(handle.state, ReadinessState::Stopped);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_adopted_process_reported_and_stopped() {
        let dir = tempfile::TempDir::new().unwrap();
        let pid_file = dir.path().join("proxy.pid");

        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id();
        std::fs::write(&pid_file, pid.to_string()).unwrap();

        let mut supervisor = ProxySupervisor::new(test_config(free_port(), dir.path()));

        // Recorded by PID but not answering health checks
        let handle = supervisor.status().await;
        assert_eq!(handle.state, ReadinessState::Unreachable);
        assert_eq!(handle.pid, Some(pid));

        supervisor.stop().await;
        // Reap our own child so the liveness check sees it gone
        let _ = child.wait();
        assert!(!is_process_alive(pid));
        assert!(!pid_file.exists());

        // Double stop after the fact is fine
        supervisor.stop().await;
        assert_eq!(supervisor.status().await.state, ReadinessState::Stopped);
    }

    /// Script that answers GET with 200, parsing `--port` like the real proxy.
    const FAKE_PROXY: &str = r#"
import sys
from http.server import BaseHTTPRequestHandler, HTTPServer

port = int(sys.argv[sys.argv.index("--port") + 1])

class Handler(BaseHTTPRequestHandler):
    def do_GET(self):
        self.send_response(200)
        self.end_headers()
        self.wfile.write(b"ok")
    def log_message(self, *args):
        pass

HTTPServer(("127.0.0.1", port), Handler).serve_forever()
"#;

    fn python3() -> Option<PathBuf> {
        let output = std::process::Command::new("which")
            .arg("python3")
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }

    #[tokio::test]
    async fn test_restart_spawns_new_process() {
        let Some(python) = python3() else {
            eprintln!("python3 not available, skipping");
            return;
        };

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("fake_proxy.py");
        std::fs::write(&script, FAKE_PROXY).unwrap();

        let mut config = test_config(free_port(), dir.path());
        config.executable = Some(python);
        config.extra_args = vec![script.to_string_lossy().to_string()];
        config.startup_timeout_secs = 10;

        let mut supervisor = ProxySupervisor::new(config);

        let first = supervisor.ensure_running().await.unwrap();
        assert_eq!(first.state, ReadinessState::Ready);
        let first_pid = first.pid.expect("spawned proxy has a pid");

        // Healthy proxy is reused, not duplicated
        let again = supervisor.ensure_running().await.unwrap();
        assert_eq!(again.pid, Some(first_pid));

        let restarted = supervisor.restart().await.unwrap();
        assert_eq!(restarted.state, ReadinessState::Ready);
        let new_pid = restarted.pid.expect("restarted proxy has a pid");
        assert_ne!(new_pid, first_pid);

        assert_eq!(supervisor.status().await.state, ReadinessState::Ready);

        supervisor.stop().await;
        assert_eq!(supervisor.status().await.state, ReadinessState::Stopped);
    }
}
