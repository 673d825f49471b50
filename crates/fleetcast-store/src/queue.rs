use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use fleetcast_core::QueueEntry;

use crate::error::StoreError;

/// Durable per-device FIFO of pending dispatch requests, one JSON file per
/// device name. Order is insertion order; an entry leaves the file only when
/// it is handed over for delivery.
pub struct QueueStore {
    dir: PathBuf,
}

impl QueueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn queue_file(&self, device: &str) -> PathBuf {
        self.dir.join(format!("{device}.json"))
    }

    /// Ordered queue for a device. A missing or corrupt file reads as an
    /// empty queue; the data loss is accepted, not escalated.
    pub fn read(&self, device: &str) -> Vec<QueueEntry> {
        let file = self.queue_file(device);
        let raw = match fs::read(&file) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_slice(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(device, path = %file.display(), error = %e, "unreadable queue file, treating as empty");
                Vec::new()
            }
        }
    }

    /// Atomically replace a device's queue.
    pub fn write(&self, device: &str, entries: &[QueueEntry]) -> Result<(), StoreError> {
        let file = self.queue_file(device);
        let tmp = file.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &file)?;
        Ok(())
    }

    /// Append one entry at the tail of a device's queue.
    pub fn append(&self, device: &str, entry: QueueEntry) -> Result<(), StoreError> {
        let mut entries = self.read(device);
        entries.push(entry);
        self.write(device, &entries)
    }

    pub fn count(&self, device: &str) -> usize {
        self.read(device).len()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcast_core::frames::Category;
    use fleetcast_core::{DispatchRequest, QueueEntry};

    fn entry(message: &str) -> QueueEntry {
        QueueEntry::new(DispatchRequest {
            message: message.into(),
            send_as_contact: false,
            attachments: Vec::new(),
            target_tags: Vec::new(),
            target_devices: vec!["A".into()],
            category: Category::Group,
        })
    }

    fn store() -> (tempfile::TempDir, QueueStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::new(dir.path().join("queues")).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_queue_reads_empty() {
        let (_dir, store) = store();
        assert!(store.read("nobody").is_empty());
        assert_eq!(store.count("nobody"), 0);
    }

    #[test]
    fn append_preserves_fifo_order() {
        let (_dir, store) = store();
        store.append("A", entry("first")).unwrap();
        store.append("A", entry("second")).unwrap();
        store.append("A", entry("third")).unwrap();

        let entries = store.read("A");
        let messages: Vec<&str> = entries.iter().map(|e| e.request.message.as_str()).collect();
        assert_eq!(messages, ["first", "second", "third"]);
        assert_eq!(store.count("A"), 3);
    }

    #[test]
    fn queues_are_isolated_per_device() {
        let (_dir, store) = store();
        store.append("A", entry("for a")).unwrap();
        store.append("B", entry("for b")).unwrap();

        assert_eq!(store.count("A"), 1);
        assert_eq!(store.count("B"), 1);
        assert_eq!(store.read("B")[0].request.message, "for b");
    }

    #[test]
    fn write_replaces_contents() {
        let (_dir, store) = store();
        store.append("A", entry("old")).unwrap();

        let shorter = vec![entry("only")];
        store.write("A", &shorter).unwrap();

        let entries = store.read("A");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request.message, "only");
    }

    #[test]
    fn corrupt_queue_file_reads_empty() {
        let (_dir, store) = store();
        store.append("A", entry("fine")).unwrap();
        std::fs::write(store.dir().join("A.json"), b"{ not json").unwrap();

        assert!(store.read("A").is_empty());
        assert_eq!(store.count("A"), 0);
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queues");
        {
            let store = QueueStore::new(&path).unwrap();
            store.append("A", entry("durable")).unwrap();
        }
        let reopened = QueueStore::new(&path).unwrap();
        assert_eq!(reopened.read("A")[0].request.message, "durable");
    }
}
