//! GuardChat - guardrailed LLM chat through a locally managed proxy
//!
//! Chats with an LLM through a local proxy that applies content-safety
//! guardrails before any provider sees the request. The proxy process is
//! supervised by the CLI: started on demand, health-checked, and stopped
//! or restarted via the `proxy` subcommand.

use anyhow::Result;
use clap::{Parser, Subcommand};
use guardchat::chat::{ChatSession, SendOptions};
use guardchat::client::ProxyClient;
use guardchat::config::GuardChatConfig;
use guardchat::repl;
use guardchat::supervisor::{ProxySupervisor, ReadinessState};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "guardchat")]
#[command(version)]
#[command(about = "Guardrailed LLM chat through a locally managed proxy")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GUARDCHAT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with an LLM (interactive when MESSAGE is omitted)
    Chat {
        /// Message to send; omit to start interactive mode
        message: Option<String>,

        /// Model to use
        #[arg(short, long)]
        model: Option<String>,

        /// System message to seed the conversation
        #[arg(short, long)]
        system: Option<String>,

        /// Disable guardrail scanning (not recommended)
        #[arg(long)]
        no_guardrails: bool,
    },

    /// Manage the proxy server process
    Proxy {
        #[command(subcommand)]
        action: ProxyAction,
    },
}

#[derive(Subcommand)]
enum ProxyAction {
    /// Start the proxy and wait until it is ready
    Start,
    /// Stop the proxy
    Stop,
    /// Stop the proxy and bring up a fresh process
    Restart,
    /// Check whether the proxy is running
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("guardchat={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = GuardChatConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Chat {
            message,
            model,
            system,
            no_guardrails,
        } => {
            let options = SendOptions {
                model,
                system,
                guardrails_enabled: !no_guardrails,
            };
            run_chat(config, message, options).await
        }
        Commands::Proxy { action } => run_proxy(config, action).await,
    }
}

async fn run_chat(
    config: GuardChatConfig,
    message: Option<String>,
    options: SendOptions,
) -> Result<ExitCode> {
    let mut supervisor = ProxySupervisor::new(config.proxy.clone());

    // No request is ever attempted against an unverified proxy
    let handle = supervisor.ensure_running().await?;
    tracing::debug!(pid = ?handle.pid, url = %handle.base_url, "proxy verified");

    let client = ProxyClient::new(&config.proxy, &config.chat);
    let mut session = ChatSession::new(client, &config.chat);

    match message {
        Some(message) => {
            let outcome = session.send(&message, &options).await;
            repl::render_outcome(&outcome);
            Ok(ExitCode::from(repl::outcome_exit_code(&outcome)))
        }
        None => {
            repl::run(&mut session, &options).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_proxy(
    config: GuardChatConfig,
    action: ProxyAction,
) -> Result<ExitCode> {
    let mut supervisor = ProxySupervisor::new(config.proxy);

    match action {
        ProxyAction::Start => {
            let handle = supervisor.ensure_running().await?;
            println!("✓ Proxy is running at {}", handle.base_url);
            Ok(ExitCode::SUCCESS)
        }
        ProxyAction::Stop => {
            let handle = supervisor.status().await;
            if handle.state == ReadinessState::Stopped {
                println!("Proxy is not running");
            } else {
                supervisor.stop().await;
                println!("✓ Proxy stopped");
            }
            Ok(ExitCode::SUCCESS)
        }
        ProxyAction::Restart => {
            let handle = supervisor.restart().await?;
            println!("✓ Proxy restarted at {}", handle.base_url);
            Ok(ExitCode::SUCCESS)
        }
        ProxyAction::Status => {
            let handle = supervisor.status().await;
            if handle.is_ready() {
                println!("✓ Proxy is running at {}", handle.base_url);
                Ok(ExitCode::SUCCESS)
            } else {
                println!("✗ Proxy is not running");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
