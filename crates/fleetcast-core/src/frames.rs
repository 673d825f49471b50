use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::ids::FileId;

/// Fixed size of one attachment chunk on the wire.
pub const CHUNK_SIZE: usize = 65536;

/// Messaging context a dispatch targets. A device can be busy in one
/// category without affecting the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Contact,
    Group,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control frames sent by a device to the broker.
/// Field names are camelCase on the wire for device fleet compatibility.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum DeviceFrame {
    Register {
        name: String,
        #[serde(default)]
        contact_tags: Vec<String>,
        #[serde(default)]
        group_tags: Vec<String>,
    },
    PostingStatus {
        contact_posting: bool,
        group_posting: bool,
    },
}

/// Text control frames sent by the broker to a device. Chunk frames are
/// binary and use [`ChunkHeader`] + [`encode_chunk`] instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum BrokerFrame {
    Message {
        message: String,
        send_as_contact: bool,
        category: Category,
    },
    FileMetadata {
        file_id: FileId,
        name: String,
        caption: String,
        size: u64,
        total_chunks: u32,
    },
    FileComplete {
        file_id: FileId,
    },
    FileTransferComplete,
}

/// Header prepended to every binary chunk frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHeader {
    pub file_id: FileId,
    pub index: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkDecodeError {
    #[error("chunk frame truncated")]
    Truncated,
    #[error("chunk header: {0}")]
    Header(#[from] serde_json::Error),
}

/// Number of chunk frames needed for an attachment of `size` bytes.
pub fn total_chunks(size: usize) -> u32 {
    size.div_ceil(CHUNK_SIZE) as u32
}

/// Encode one binary chunk frame: u32 big-endian header length, header
/// JSON, then the raw payload slice.
pub fn encode_chunk(header: &ChunkHeader, payload: &[u8]) -> Result<Bytes, serde_json::Error> {
    let header_json = serde_json::to_vec(header)?;
    let mut buf = BytesMut::with_capacity(4 + header_json.len() + payload.len());
    buf.put_u32(header_json.len() as u32);
    buf.put_slice(&header_json);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Decode a binary chunk frame back into its header and payload.
pub fn decode_chunk(frame: &[u8]) -> Result<(ChunkHeader, &[u8]), ChunkDecodeError> {
    if frame.len() < 4 {
        return Err(ChunkDecodeError::Truncated);
    }
    let header_len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    let rest = &frame[4..];
    if rest.len() < header_len {
        return Err(ChunkDecodeError::Truncated);
    }
    let header: ChunkHeader = serde_json::from_slice(&rest[..header_len])?;
    Ok((header, &rest[header_len..]))
}
