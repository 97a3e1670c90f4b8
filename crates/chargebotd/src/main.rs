//! chargebotd - The chargebot background service
//!
//! This is the main entry point for the chargebotd service.
//! It wires together all the components:
//! - Configuration loading
//! - Session manager
//! - IPC server
//! - HTTP status API and dashboard

mod dispatch;
mod http;
mod notifier;

use anyhow::{Context, Result};
use chargebot_api::{ErrorCode, ErrorInfo, Response};
use chargebot_config::{load_config, load_config_or_default, Policy};
use chargebot_core::{SessionManager, Timer};
use chargebot_ipc::{IpcServer, ServerMessage};
use chargebot_util::{default_config_path, format_remaining, ClientId, RateLimiter};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::http::AppState;
use crate::notifier::IpcNotifier;

/// Requests allowed per client per window
const RATE_LIMIT_REQUESTS: u32 = 30;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(1);

/// chargebotd - Arbitrates a shared charger between requesters
#[derive(Parser, Debug)]
#[command(name = "chargebotd")]
#[command(about = "Arbitrates a shared charger between requesters", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/chargebot/config.toml, optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket path override (or set CHARGEBOT_SOCKET env var)
    #[arg(short, long, env = "CHARGEBOT_SOCKET")]
    socket: Option<PathBuf>,

    /// Dashboard listen address override (or set CHARGEBOT_HTTP_ADDR env var)
    #[arg(long, env = "CHARGEBOT_HTTP_ADDR")]
    http_addr: Option<SocketAddr>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(short, long)]
    log_level: Option<String>,
}

/// Main service state
struct Service {
    manager: SessionManager,
    ipc: Arc<IpcServer>,
    http_addr: Option<SocketAddr>,
    rate_limiter: RateLimiter<ClientId>,
}

impl Service {
    async fn new(policy: Policy) -> Result<Self> {
        let socket_path = policy.service.socket_path.clone();

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start()
            .await
            .with_context(|| format!("Failed to listen on {:?}", socket_path))?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        let notifier = Arc::new(IpcNotifier::new(ipc.event_sender()));
        let timer = Timer::current().context("Timer needs a tokio runtime")?;
        let manager = SessionManager::new(policy.timing, timer, notifier);

        Ok(Self {
            manager,
            ipc: Arc::new(ipc),
            http_addr: policy.service.http_addr,
            rate_limiter: RateLimiter::new(RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW),
        })
    }

    async fn run(mut self) -> Result<()> {
        let mut ipc_messages = self
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        // Spawn IPC accept task
        let ipc_accept = self.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        // Spawn dashboard, if configured
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let http_task = self.http_addr.map(|addr| {
            let state = Arc::new(AppState {
                manager: self.manager.clone(),
                ipc: self.ipc.clone(),
            });
            tokio::spawn(async move {
                if let Err(e) = http::serve(addr, state, shutdown_rx).await {
                    error!(addr = %addr, error = %e, "Dashboard server error");
                }
            })
        });

        // Set up signal handlers
        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                Some(msg) = ipc_messages.recv() => {
                    self.handle_ipc_message(msg).await;
                }
            }
        }

        info!("Shutting down chargebotd");

        let status = self.manager.status();
        if let Some(holder) = &status.holder {
            info!(
                user_id = %holder.user_id,
                phase = holder.phase.label(),
                remaining = %format_remaining(holder.remaining),
                queue_len = status.waitlist.len(),
                "Dropping active session"
            );
        }
        self.manager.shutdown();

        let _ = shutdown_tx.send(true);
        if let Some(task) = http_task
            && let Err(e) = task.await
        {
            warn!(error = %e, "Dashboard task ended abnormally");
        }

        self.ipc.shutdown();

        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                let response = if self.rate_limiter.check(&client_id) {
                    let subscribers = self.ipc.subscriber_count().await;
                    dispatch::handle_command(
                        &self.manager,
                        &client_id,
                        subscribers,
                        request.request_id,
                        request.command,
                    )
                } else {
                    warn!(client_id = %client_id, "Rate limit exceeded");
                    Response::error(
                        request.request_id,
                        ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                    )
                };

                if let Err(e) = self.ipc.send_response(&client_id, response).await {
                    debug!(client_id = %client_id, error = %e, "Failed to send response");
                }
            }

            ServerMessage::ClientConnected { client_id } => {
                debug!(client_id = %client_id, "Client registered");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");
                self.rate_limiter.forget(&client_id);
            }
        }
    }
}

/// Load the policy and apply command-line overrides
fn load_policy(args: &Args) -> Result<Policy> {
    let mut policy = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            let path = default_config_path();
            load_config_or_default(&path)
                .with_context(|| format!("Failed to load config from {:?}", path))?
        }
    };

    if let Some(socket) = &args.socket {
        policy.service.socket_path = socket.clone();
    }
    if let Some(addr) = args.http_addr {
        policy.service.http_addr = Some(addr);
    }
    if let Some(level) = &args.log_level {
        policy.service.log_level = level.clone();
    }

    Ok(policy)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let policy = load_policy(&args)?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&policy.service.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        grace = %format_remaining(policy.timing.grace_period()),
        charge = %format_remaining(policy.timing.charge_duration()),
        warning_lead = %format_remaining(policy.timing.warning_lead()),
        "chargebotd starting"
    );

    let service = Service::new(policy).await?;
    service.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["chargebotd"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
config_version = 1

[service]
socket_path = "/tmp/from-file.sock"
http_addr = "127.0.0.1:5000"

[timing]
grace_period_seconds = 60
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let policy = load_policy(&args(&[
            "--config",
            path,
            "--socket",
            "/tmp/from-cli.sock",
            "--log-level",
            "debug",
        ]))
        .unwrap();

        assert_eq!(policy.service.socket_path, PathBuf::from("/tmp/from-cli.sock"));
        assert_eq!(policy.service.http_addr, Some("127.0.0.1:5000".parse().unwrap()));
        assert_eq!(policy.service.log_level, "debug");
        assert_eq!(policy.timing.grace_period(), Duration::from_secs(60));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let result = load_policy(&args(&["--config", "/nonexistent/chargebot.toml"]));
        assert!(result.is_err());
    }
}
