use std::collections::BTreeMap;

use serde::Serialize;

use fleetcast_store::{QueueStore, Roster};

use crate::registry::DeviceRegistry;

/// Presentation-ready merge of roster, live registry state, and queue depth
/// for one device. Recomputed on every request, never cached.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub online: bool,
    pub contact_tags: Vec<String>,
    pub group_tags: Vec<String>,
    pub contact_posting: bool,
    pub group_posting: bool,
    pub queue_count: usize,
}

/// Build the status map over the full roster. The roster is authoritative
/// for the universe of names: a connected device the roster does not list is
/// invisible, and a listed device with no session is offline with defaults.
pub fn build_snapshot(
    roster: &Roster,
    registry: &DeviceRegistry,
    queues: &QueueStore,
) -> BTreeMap<String, DeviceStatus> {
    roster
        .device_names()
        .into_iter()
        .map(|name| {
            let status = match registry.view(&name) {
                Some(view) => DeviceStatus {
                    online: true,
                    contact_tags: view.contact_tags,
                    group_tags: view.group_tags,
                    contact_posting: view.contact_posting,
                    group_posting: view.group_posting,
                    queue_count: queues.count(&name),
                },
                None => DeviceStatus {
                    queue_count: queues.count(&name),
                    ..DeviceStatus::default()
                },
            };
            (name, status)
        })
        .collect()
}
