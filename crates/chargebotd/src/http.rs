//! Read-only HTTP status API and dashboard

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use chargebot_api::{HealthStatus, Phase, StatusSnapshot};
use chargebot_core::SessionManager;
use chargebot_ipc::IpcServer;
use chargebot_util::format_remaining;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// Shared state for HTTP handlers
pub struct AppState {
    pub manager: SessionManager,
    pub ipc: Arc<IpcServer>,
}

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/status", get(status))
        .route("/api/health", get(health))
        .with_state(state)
}

/// Serve until `shutdown` flips to `true`
pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Dashboard listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.manager.status())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        live: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        subscribers: state.ipc.subscriber_count().await,
    })
}

async fn dashboard(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_dashboard(&state.manager.status()))
}

const PAGE_HEAD: &str = r#"<!doctype html>
<html>
<head>
  <title>Chargebot Dashboard</title>
  <meta http-equiv="refresh" content="15">
  <style>
    body { font-family: sans-serif; padding: 2rem; background: #f4f4f4; }
    .card { background: white; padding: 1rem; margin: 1rem 0; border-radius: 10px; box-shadow: 0 2px 5px rgba(0,0,0,0.1); }
    h2 { margin-top: 0; }
  </style>
</head>
<body>
  <h1>🔌 Chargebot Dashboard</h1>
"#;

fn render_dashboard(snapshot: &StatusSnapshot) -> String {
    let mut page = String::from(PAGE_HEAD);

    page.push_str("  <div class=\"card\">\n    <h2>Status</h2>\n");
    match &snapshot.holder {
        Some(holder) => {
            let label = match holder.phase {
                Phase::Grace => "Reserved for",
                Phase::Charging => "Currently Charging",
            };
            let _ = writeln!(
                page,
                "    <p><strong>{}:</strong> <code>{}</code></p>",
                label,
                escape(holder.user_id.as_str())
            );
            let _ = writeln!(
                page,
                "    <p><strong>Time Remaining:</strong> {}</p>",
                format_remaining(holder.remaining)
            );
        }
        None => page.push_str("    <p><strong>Charger is Available</strong></p>\n"),
    }
    page.push_str("  </div>\n");

    page.push_str("  <div class=\"card\">\n    <h2>Queue</h2>\n");
    if snapshot.waitlist.is_empty() {
        page.push_str("    <p>No one is in the queue.</p>\n");
    } else {
        page.push_str("    <ol>\n");
        for user in &snapshot.waitlist {
            let _ = writeln!(page, "      <li>{}</li>", escape(user.as_str()));
        }
        page.push_str("    </ol>\n");
    }
    page.push_str("  </div>\n</body>\n</html>\n");

    page
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use chargebot_config::Timing;
    use chargebot_core::{RecordingNotifier, Timer};
    use chargebot_util::UserId;
    use tempfile::tempdir;

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    fn test_state(dir: &std::path::Path) -> Arc<AppState> {
        Arc::new(AppState {
            manager: SessionManager::new(
                Timing::default(),
                Timer::current().unwrap(),
                Arc::new(RecordingNotifier::new()),
            ),
            ipc: Arc::new(IpcServer::new(dir.join("test.sock"))),
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempdir().unwrap();
        let server = TestServer::new(create_router(test_state(dir.path()))).unwrap();

        let response = server.get("/api/health").await;
        response.assert_status_ok();

        let body: HealthStatus = response.json();
        assert!(body.live);
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(body.subscribers, 0);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        state.manager.check_in(&user("A")).unwrap();
        state.manager.request(&user("B")).unwrap();
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.get("/api/status").await;
        response.assert_status_ok();

        let body: StatusSnapshot = response.json();
        let holder = body.holder.unwrap();
        assert_eq!(holder.user_id, user("A"));
        assert_eq!(holder.phase, Phase::Grace);
        assert_eq!(body.waitlist, vec![user("B")]);
    }

    #[tokio::test]
    async fn test_dashboard_lists_holder_and_queue() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        state.manager.check_in(&user("A")).unwrap();
        state.manager.request(&user("<b>")).unwrap();
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.get("/").await;
        response.assert_status_ok();

        let page = response.text();
        assert!(page.contains("Reserved for"));
        assert!(page.contains("<code>A</code>"));
        assert!(page.contains("<li>&lt;b&gt;</li>"));
    }

    #[test]
    fn test_dashboard_when_free() {
        let snapshot = StatusSnapshot {
            api_version: chargebot_api::API_VERSION,
            holder: None,
            waitlist: vec![],
            timing: Timing::default().to_info(),
        };

        let page = render_dashboard(&snapshot);
        assert!(page.contains("Charger is Available"));
        assert!(page.contains("No one is in the queue."));
    }
}
