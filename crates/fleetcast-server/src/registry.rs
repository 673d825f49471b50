use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;

use fleetcast_core::frames::Category;
use fleetcast_core::ids::ConnId;

/// A frame queued for a device connection's writer task.
#[derive(Clone, Debug)]
pub enum Outbound {
    Text(String),
    Binary(Bytes),
}

/// Ephemeral state for one registered device, bound to exactly one live
/// socket. Owned exclusively by [`DeviceRegistry`].
struct DeviceSession {
    conn: ConnId,
    tx: mpsc::Sender<Outbound>,
    contact_tags: Vec<String>,
    group_tags: Vec<String>,
    contact_posting: bool,
    group_posting: bool,
}

/// Read-only copy of a session's display state for snapshot building.
#[derive(Clone, Debug)]
pub struct SessionView {
    pub contact_tags: Vec<String>,
    pub group_tags: Vec<String>,
    pub contact_posting: bool,
    pub group_posting: bool,
}

/// Registry of currently connected devices. The single authority for
/// session lifecycle and per-category busy flags; nothing outside this type
/// touches session state directly.
pub struct DeviceRegistry {
    sessions: DashMap<String, DeviceSession>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Create or replace the session for `name`. Last writer wins; both busy
    /// flags reset regardless of prior state. The displaced socket is only
    /// dereferenced here; its own close or heartbeat failure reaps it.
    pub fn register(
        &self,
        name: &str,
        conn: ConnId,
        tx: mpsc::Sender<Outbound>,
        contact_tags: Vec<String>,
        group_tags: Vec<String>,
    ) {
        let replaced = self
            .sessions
            .insert(
                name.to_owned(),
                DeviceSession {
                    conn,
                    tx,
                    contact_tags,
                    group_tags,
                    contact_posting: false,
                    group_posting: false,
                },
            )
            .is_some();
        info!(device = name, replaced, "device registered");
    }

    /// Self-reported posting status. Silently ignored when the device has no
    /// active session (frames racing a disconnect, unknown devices).
    pub fn update_status(&self, name: &str, contact_busy: bool, group_busy: bool) {
        if let Some(mut session) = self.sessions.get_mut(name) {
            session.contact_posting = contact_busy;
            session.group_posting = group_busy;
        }
    }

    /// Remove the session entirely. Busy flags are not preserved across
    /// disconnect.
    pub fn remove(&self, name: &str) {
        if self.sessions.remove(name).is_some() {
            info!(device = name, "device removed");
        }
    }

    /// Remove the session only if it still belongs to `conn`. Socket
    /// teardown goes through here so the close of an already-replaced socket
    /// cannot evict its replacement.
    pub fn remove_conn(&self, name: &str, conn: &ConnId) -> bool {
        let removed = self
            .sessions
            .remove_if(name, |_, session| session.conn == *conn)
            .is_some();
        if removed {
            info!(device = name, conn = %conn, "device disconnected");
        }
        removed
    }

    pub fn is_online(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn is_busy(&self, name: &str, category: Category) -> bool {
        self.sessions
            .get(name)
            .map(|session| match category {
                Category::Contact => session.contact_posting,
                Category::Group => session.group_posting,
            })
            .unwrap_or(false)
    }

    /// Atomically claim a device for delivery in one category: true only if
    /// the device is online and the flag was clear, with the flag set in
    /// a single step. Every sender (live dispatch and queue drain) must
    /// claim before transmitting.
    pub fn try_claim(&self, name: &str, category: Category) -> bool {
        match self.sessions.get_mut(name) {
            Some(mut session) => {
                let flag = match category {
                    Category::Contact => &mut session.contact_posting,
                    Category::Group => &mut session.group_posting,
                };
                if *flag {
                    false
                } else {
                    *flag = true;
                    true
                }
            }
            None => false,
        }
    }

    /// Release a claim after a failed transport send, so a frame that never
    /// left the broker does not wedge the device busy.
    pub fn release(&self, name: &str, category: Category) {
        if let Some(mut session) = self.sessions.get_mut(name) {
            match category {
                Category::Contact => session.contact_posting = false,
                Category::Group => session.group_posting = false,
            }
        }
    }

    /// Outbound channel for a device, if connected.
    pub fn sender(&self, name: &str) -> Option<mpsc::Sender<Outbound>> {
        self.sessions.get(name).map(|session| session.tx.clone())
    }

    /// Display state for snapshot building, if connected.
    pub fn view(&self, name: &str) -> Option<SessionView> {
        self.sessions.get(name).map(|session| SessionView {
            contact_tags: session.contact_tags.clone(),
            group_tags: session.group_tags.clone(),
            contact_posting: session.contact_posting,
            group_posting: session.group_posting,
        })
    }

    /// Number of connected devices.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
