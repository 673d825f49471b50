use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use fleetcast_core::frames::DeviceFrame;
use fleetcast_core::ids::ConnId;

use crate::heartbeat::{Liveness, HEARTBEAT_INTERVAL};
use crate::registry::{DeviceRegistry, Outbound};

/// Apply one inbound control frame to the registry. Malformed frames are
/// dropped and logged; the connection stays open. A `posting-status` frame
/// on a connection that never registered is silently ignored.
fn apply_frame(
    registry: &DeviceRegistry,
    conn: &ConnId,
    tx: &mpsc::Sender<Outbound>,
    registered: &mut Option<String>,
    raw: &str,
) {
    match serde_json::from_str::<DeviceFrame>(raw) {
        Ok(DeviceFrame::Register {
            name,
            contact_tags,
            group_tags,
        }) => {
            registry.register(&name, conn.clone(), tx.clone(), contact_tags, group_tags);
            *registered = Some(name);
        }
        Ok(DeviceFrame::PostingStatus {
            contact_posting,
            group_posting,
        }) => {
            if let Some(name) = registered {
                registry.update_status(name, contact_posting, group_posting);
            }
        }
        Err(e) => {
            warn!(conn = %conn, error = %e, "dropping malformed control frame");
        }
    }
}

/// Drive one device socket: reader applies control frames and records
/// pongs, writer forwards outbound frames and runs the heartbeat. A
/// connection that misses a full ping interval is forcibly terminated and
/// its registry entry removed.
pub async fn handle_device_socket(
    socket: WebSocket,
    registry: Arc<DeviceRegistry>,
    max_send_queue: usize,
) {
    let conn = ConnId::new();
    let liveness = Arc::new(Liveness::new());
    let registered: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let (tx, mut rx) = mpsc::channel::<Outbound>(max_send_queue);

    info!(conn = %conn, "device socket opened");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: forward queued frames, ping on the heartbeat interval.
    let writer_conn = conn.clone();
    let writer_liveness = Arc::clone(&liveness);
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let message = match frame {
                        Some(Outbound::Text(text)) => WsMessage::Text(text.into()),
                        Some(Outbound::Binary(bytes)) => WsMessage::Binary(bytes),
                        None => break,
                    };
                    if ws_tx.send(message).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !writer_liveness.check_and_arm() {
                        info!(conn = %writer_conn, "no pong since last ping, terminating");
                        break;
                    }
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: control frames and pongs.
    let reader_conn = conn.clone();
    let reader_registry = Arc::clone(&registry);
    let reader_liveness = Arc::clone(&liveness);
    let reader_registered = Arc::clone(&registered);
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    let mut registered = reader_registered.lock().await;
                    apply_frame(&reader_registry, &reader_conn, &tx, &mut registered, text.as_str());
                }
                WsMessage::Pong(_) => reader_liveness.mark_pong(),
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum replies automatically
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => {},
        _ = &mut reader => {},
    }
    writer.abort();
    reader.abort();

    if let Some(name) = registered.lock().await.take() {
        registry.remove_conn(&name, &conn);
    }
    info!(conn = %conn, "device socket closed");
}
