use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use fleetcast_core::frames::Category;
use fleetcast_core::{Attachment, DispatchRequest};

use crate::dispatch;
use crate::server::AppState;
use crate::snapshot;

/// One uploaded file in a dispatch request body, bytes base64-encoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFile {
    pub name: String,
    #[serde(default)]
    pub caption: String,
    pub base64: String,
}

/// Operator dispatch request as posted by the admin UI.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchBody {
    pub message: String,
    #[serde(default)]
    pub send_as_contact: bool,
    #[serde(default)]
    pub files: Vec<UploadFile>,
    #[serde(default)]
    pub selected_tags: Vec<String>,
    #[serde(default)]
    pub selected_devices: Vec<String>,
    pub posting_type: Category,
}

/// `GET /api/devices`: the status snapshot over the full roster.
pub async fn get_devices(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = snapshot::build_snapshot(&state.roster, &state.registry, &state.queues);
    Json(snapshot)
}

/// `POST /api/dispatch`: persist uploads, then deliver or queue per device.
/// Responds with the aggregate immediate-delivery count only.
pub async fn post_dispatch(
    State(state): State<AppState>,
    Json(body): Json<DispatchBody>,
) -> impl IntoResponse {
    let mut attachments = Vec::with_capacity(body.files.len());
    for file in &body.files {
        let bytes = match BASE64.decode(&file.base64) {
            Ok(bytes) => bytes,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"status": "error", "message": format!("invalid base64 for {}: {e}", file.name)})),
                );
            }
        };
        if let Err(e) = state.uploads.save(&file.name, &bytes) {
            error!(name = %file.name, error = %e, "failed to persist upload");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": "upload storage failed"})),
            );
        }
        attachments.push(Attachment {
            name: file.name.clone(),
            caption: file.caption.clone(),
            bytes,
        });
    }

    let request = DispatchRequest {
        message: body.message,
        send_as_contact: body.send_as_contact,
        attachments,
        target_tags: body.selected_tags,
        target_devices: body.selected_devices,
        category: body.posting_type,
    };

    let sent = dispatch::dispatch(
        &state.registry,
        &state.queues,
        &request,
        &request.target_devices,
    )
    .await;

    info!(
        targets = request.target_devices.len(),
        sent,
        category = %request.category,
        "dispatch request processed"
    );
    (StatusCode::OK, Json(json!({"status": "ok", "sent": sent})))
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}
