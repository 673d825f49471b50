use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::frames::Category;
use crate::ids::EntryId;

/// One file attached to a dispatch request. Bytes are base64 on disk and
/// over HTTP, raw in memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    #[serde(default)]
    pub caption: String,
    #[serde(with = "b64")]
    pub bytes: Vec<u8>,
}

/// An operator request to deliver a message to a set of devices.
/// Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub message: String,
    pub send_as_contact: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub target_tags: Vec<String>,
    #[serde(default)]
    pub target_devices: Vec<String>,
    pub category: Category,
}

/// A dispatch request parked in a device's durable FIFO.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    #[serde(flatten)]
    pub request: DispatchRequest,
    pub status: String,
    pub id: EntryId,
    pub queued_at: String,
}

impl QueueEntry {
    pub fn new(request: DispatchRequest) -> Self {
        Self {
            request,
            status: "queued".to_owned(),
            id: EntryId::new(),
            queued_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Serde adapter: attachment bytes as standard base64 strings.
mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
