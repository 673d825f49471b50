use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use fleetcast_store::{QueueStore, Roster, StoreError, UploadStore};

use crate::drain;
use crate::http;
use crate::registry::DeviceRegistry;
use crate::socket;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Flat file listing the universe of device names.
    pub roster_path: PathBuf,
    /// Directory of per-device queue files.
    pub queue_dir: PathBuf,
    /// Directory where dispatched uploads are persisted.
    pub upload_dir: PathBuf,
    /// Outbound frame buffer per device connection.
    pub max_send_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            roster_path: PathBuf::from("devices.roster"),
            queue_dir: PathBuf::from("queues"),
            upload_dir: PathBuf::from("uploads"),
            max_send_queue: 256,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub queues: Arc<QueueStore>,
    pub roster: Arc<Roster>,
    pub uploads: Arc<UploadStore>,
    pub max_send_queue: usize,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(http::health))
        .route("/api/devices", get(http::get_devices))
        .route("/api/dispatch", post(http::post_dispatch))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the broker. Returns a handle that keeps the HTTP server
/// and the queue drain task alive.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, ServerError> {
    let registry = Arc::new(DeviceRegistry::new());
    let queues = Arc::new(QueueStore::new(&config.queue_dir)?);
    let roster = Arc::new(Roster::new(&config.roster_path));
    let uploads = Arc::new(UploadStore::new(&config.upload_dir)?);

    let drain_handle = drain::start_drain_task(
        Arc::clone(&roster),
        Arc::clone(&registry),
        Arc::clone(&queues),
    );

    let state = AppState {
        registry,
        queues,
        roster,
        uploads,
        max_send_queue: config.max_send_queue,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    info!(port = local_addr.port(), "fleetcast broker started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
        _drain: drain_handle,
    })
}

/// Handle returned by `start()`. Keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _drain: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade for device connections.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        socket::handle_device_socket(socket, state.registry, state.max_send_queue)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_config(dir: &std::path::Path, roster_lines: &[&str]) -> ServerConfig {
        let roster_path = dir.join("devices.roster");
        let mut file = std::fs::File::create(&roster_path).unwrap();
        for line in roster_lines {
            writeln!(file, "{line}").unwrap();
        }
        ServerConfig {
            port: 0, // random port
            roster_path,
            queue_dir: dir.join("queues"),
            upload_dir: dir.join("uploads"),
            max_send_queue: 256,
        }
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let dir = tempfile::tempdir().unwrap();
        let handle = start(test_config(dir.path(), &[])).await.unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn devices_endpoint_reports_roster_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let handle = start(test_config(dir.path(), &["A", "B"])).await.unwrap();

        let url = format!("http://127.0.0.1:{}/api/devices", handle.port);
        let body: serde_json::Value = reqwest::get(&url).await.unwrap().json().await.unwrap();

        assert_eq!(body["A"]["online"], false);
        assert_eq!(body["A"]["queueCount"], 0);
        assert_eq!(body["B"]["contactTags"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn dispatch_to_offline_device_queues_and_reports_zero_sent() {
        let dir = tempfile::tempdir().unwrap();
        let handle = start(test_config(dir.path(), &["A"])).await.unwrap();
        let base = format!("http://127.0.0.1:{}", handle.port);

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{base}/api/dispatch"))
            .json(&serde_json::json!({
                "message": "hello",
                "sendAsContact": true,
                "files": [{"name": "pic.png", "caption": "", "base64": "AQID"}],
                "selectedTags": [],
                "selectedDevices": ["A"],
                "postingType": "contact"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sent"], 0);

        // The offline target landed in its durable queue.
        let devices: serde_json::Value = client
            .get(format!("{base}/api/devices"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(devices["A"]["queueCount"], 1);

        // The upload was persisted to disk.
        let uploads: Vec<_> = std::fs::read_dir(dir.path().join("uploads"))
            .unwrap()
            .collect();
        assert_eq!(uploads.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_with_bad_base64_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let handle = start(test_config(dir.path(), &["A"])).await.unwrap();

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("http://127.0.0.1:{}/api/dispatch", handle.port))
            .json(&serde_json::json!({
                "message": "hello",
                "files": [{"name": "pic.png", "base64": "!!not-base64!!"}],
                "selectedDevices": ["A"],
                "postingType": "contact"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }
}
