use tokio::sync::mpsc;
use tracing::debug;

use fleetcast_core::frames::{self, BrokerFrame, ChunkHeader, CHUNK_SIZE};
use fleetcast_core::ids::FileId;
use fleetcast_core::DispatchRequest;

use crate::registry::Outbound;

/// Result of the fire-and-forget send primitive. Delivery past the device's
/// outbound channel is the transport's concern; a closed channel is the one
/// failure the broker can observe.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("device channel closed")]
    ChannelClosed,
    #[error("frame encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

async fn send(tx: &mpsc::Sender<Outbound>, frame: Outbound) -> Result<(), SendError> {
    tx.send(frame).await.map_err(|_| SendError::ChannelClosed)
}

async fn send_frame(tx: &mpsc::Sender<Outbound>, frame: &BrokerFrame) -> Result<(), SendError> {
    let json = serde_json::to_string(frame)?;
    send(tx, Outbound::Text(json)).await
}

/// Deliver one dispatch request down a device's socket: the primary message
/// frame, then every attachment as metadata + ordered chunks + completion,
/// then the end-of-request frame. No chunk-level acknowledgement or resend;
/// once the sequence starts it runs to completion or fails outright.
pub async fn deliver(tx: &mpsc::Sender<Outbound>, request: &DispatchRequest) -> Result<(), SendError> {
    send_frame(
        tx,
        &BrokerFrame::Message {
            message: request.message.clone(),
            send_as_contact: request.send_as_contact,
            category: request.category,
        },
    )
    .await?;

    for attachment in &request.attachments {
        let file_id = FileId::new();
        let size = attachment.bytes.len();
        let total_chunks = frames::total_chunks(size);

        send_frame(
            tx,
            &BrokerFrame::FileMetadata {
                file_id: file_id.clone(),
                name: attachment.name.clone(),
                caption: attachment.caption.clone(),
                size: size as u64,
                total_chunks,
            },
        )
        .await?;

        for (index, chunk) in attachment.bytes.chunks(CHUNK_SIZE).enumerate() {
            let header = ChunkHeader {
                file_id: file_id.clone(),
                index: index as u32,
            };
            send(tx, Outbound::Binary(frames::encode_chunk(&header, chunk)?)).await?;
        }

        send_frame(tx, &BrokerFrame::FileComplete { file_id: file_id.clone() }).await?;
        debug!(file = %file_id, size, total_chunks, "attachment transferred");
    }

    send_frame(tx, &BrokerFrame::FileTransferComplete).await
}
