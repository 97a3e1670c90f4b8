//! chargectl - command-line client for chargebotd

use anyhow::{Context, Result};
use chargebot_api::{Command, EventPayload, ResponsePayload};
use chargebot_ipc::{IpcClient, IpcError};
use chargebot_util::{default_socket_path, UserId};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "chargectl", about = "Command-line client for chargebotd")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Socket path (or set CHARGEBOT_SOCKET env var)
    #[arg(short, long, global = true, env = "CHARGEBOT_SOCKET")]
    socket: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Take the charger if it is free
    Checkin { user: UserId },
    /// Take the charger if it is free, otherwise join the queue
    Request { user: UserId },
    /// End your charging session early
    End { user: UserId },
    /// Leave the queue
    Leave { user: UserId },
    /// Show who is charging and who is waiting
    Status,
    /// Follow notices as they are sent
    Watch {
        /// Only show notices for this requester
        #[arg(long)]
        user: Option<UserId>,
    },
    /// Check that the daemon is alive
    Health,
}

/// Reply text for a successful command
fn render(user: Option<&UserId>, payload: ResponsePayload) -> String {
    let who = user.map(UserId::as_str).unwrap_or("you");

    match payload {
        ResponsePayload::CheckedIn { grace_ends_at } => format!(
            "🟢 {}, you're checked in. Connect your car to the charger by {}.",
            who,
            grace_ends_at.format("%H:%M")
        ),
        ResponsePayload::Queued { position } => {
            format!("{} added to the charging queue at position {}.", who, position)
        }
        ResponsePayload::Ended { promoted } => {
            let mut msg = format!("{} has ended their charging session early.", who);
            if let Some(next) = promoted {
                msg.push_str(&format!("\n🔌 {} is up next.", next));
            }
            msg
        }
        ResponsePayload::LeftQueue => format!("{} left the queue.", who),
        ResponsePayload::Status(snapshot) => snapshot.summary(),
        ResponsePayload::Health(health) => format!(
            "chargebotd {} is {} ({} subscriber{})",
            health.version,
            if health.live { "live" } else { "not live" },
            health.subscribers,
            if health.subscribers == 1 { "" } else { "s" }
        ),
        ResponsePayload::Subscribed { .. } => "Subscribed.".to_string(),
        ResponsePayload::Unsubscribed => "Unsubscribed.".to_string(),
        ResponsePayload::Pong => "pong".to_string(),
    }
}

async fn watch(client: IpcClient, user: Option<UserId>) -> Result<()> {
    let mut events = client.subscribe().await.context("Failed to subscribe")?;

    loop {
        let event = tokio::select! {
            event = events.next() => event,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };

        let event = match event {
            Ok(event) => event,
            Err(IpcError::ConnectionClosed) => {
                println!("chargebotd closed the connection.");
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to read event"),
        };

        let at = event.timestamp.format("%H:%M:%S");
        match event.payload {
            EventPayload::Notice(notice) => {
                if user.as_ref().is_none_or(|u| *u == notice.user_id) {
                    println!("[{}] {}: {}", at, notice.user_id, notice.kind.message());
                }
            }
            EventPayload::StateChanged(snapshot) => {
                if user.is_none() {
                    println!("[{}] {}", at, snapshot.summary().replace('\n', "\n           "));
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let socket = cli.socket.unwrap_or_else(default_socket_path);
    debug!(socket = %socket.display(), "Connecting");

    let mut client = IpcClient::connect(&socket)
        .await
        .with_context(|| format!("Failed to connect to chargebotd at {:?}", socket))?;

    let (command, user) = match cli.command {
        Commands::Watch { user } => return watch(client, user).await,
        Commands::Checkin { user } => (Command::CheckIn { user_id: user.clone() }, Some(user)),
        Commands::Request { user } => (Command::Request { user_id: user.clone() }, Some(user)),
        Commands::End { user } => (Command::EndEarly { user_id: user.clone() }, Some(user)),
        Commands::Leave { user } => (Command::LeaveQueue { user_id: user.clone() }, Some(user)),
        Commands::Status => (Command::Status, None),
        Commands::Health => (Command::GetHealth, None),
    };

    match client.call(command).await {
        Ok(payload) => {
            println!("{}", render(user.as_ref(), payload));
            Ok(())
        }
        Err(IpcError::Refused(info)) => {
            eprintln!("{}", info.message);
            std::process::exit(1);
        }
        Err(e) => Err(e).context("Request failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    #[test]
    fn test_parse_rejects_bad_identity() {
        assert!(Cli::try_parse_from(["chargectl", "request", "U1"]).is_ok());
        assert!(Cli::try_parse_from(["chargectl", "request", ""]).is_err());
    }

    #[test]
    fn test_render_queued() {
        let text = render(Some(&user("U2")), ResponsePayload::Queued { position: 3 });
        assert_eq!(text, "U2 added to the charging queue at position 3.");
    }

    #[test]
    fn test_render_end_with_promotion() {
        let text = render(
            Some(&user("U1")),
            ResponsePayload::Ended {
                promoted: Some(user("U2")),
            },
        );
        assert!(text.starts_with("U1 has ended their charging session early."));
        assert!(text.contains("U2 is up next"));
    }

    #[test]
    fn test_render_end_without_queue() {
        let text = render(Some(&user("U1")), ResponsePayload::Ended { promoted: None });
        assert_eq!(text, "U1 has ended their charging session early.");
    }
}
