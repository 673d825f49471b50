use tracing::warn;

use fleetcast_core::{DispatchRequest, QueueEntry};
use fleetcast_store::QueueStore;

use crate::registry::DeviceRegistry;
use crate::transfer;

/// Deliver a request to each target device, queueing the ones that cannot
/// take it now. Targets are processed in caller order, not deduplicated.
/// The returned count of immediate deliveries is the only feedback the
/// operator gets; per-device outcomes are not reported individually.
///
/// A transport failure mid-send counts the device as not delivered and does
/// NOT queue; only busy/offline devices are queued.
pub async fn dispatch(
    registry: &DeviceRegistry,
    queues: &QueueStore,
    request: &DispatchRequest,
    targets: &[String],
) -> usize {
    let mut sent = 0;

    for name in targets {
        if registry.try_claim(name, request.category) {
            match deliver_claimed(registry, request, name).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    registry.release(name, request.category);
                    warn!(device = %name, error = %e, "delivery failed, dropping");
                }
            }
        } else if let Err(e) = queues.append(name, QueueEntry::new(request.clone())) {
            warn!(device = %name, error = %e, "failed to queue request");
        }
    }

    sent
}

async fn deliver_claimed(
    registry: &DeviceRegistry,
    request: &DispatchRequest,
    name: &str,
) -> Result<(), transfer::SendError> {
    // The session can vanish between claim and send if the socket closes.
    let tx = registry.sender(name).ok_or(transfer::SendError::ChannelClosed)?;
    transfer::deliver(&tx, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcast_core::frames::Category;
    use fleetcast_core::ids::ConnId;
    use tokio::sync::mpsc;

    use crate::registry::Outbound;

    fn request(category: Category, targets: &[&str]) -> DispatchRequest {
        DispatchRequest {
            message: "hi".into(),
            send_as_contact: matches!(category, Category::Contact),
            attachments: Vec::new(),
            target_tags: vec!["vip".into()],
            target_devices: targets.iter().map(|s| s.to_string()).collect(),
            category,
        }
    }

    fn queues() -> (tempfile::TempDir, QueueStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::new(dir.path().join("queues")).unwrap();
        (dir, store)
    }

    fn connect(registry: &DeviceRegistry, name: &str) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(1024);
        registry.register(name, ConnId::new(), tx, vec!["vip".into()], vec![]);
        rx
    }

    #[tokio::test]
    async fn online_idle_device_is_delivered_not_queued() {
        let registry = DeviceRegistry::new();
        let (_dir, queues) = queues();
        let mut rx = connect(&registry, "A");

        let req = request(Category::Contact, &["A"]);
        let sent = dispatch(&registry, &queues, &req, &req.target_devices).await;

        assert_eq!(sent, 1);
        assert!(registry.is_busy("A", Category::Contact));
        assert_eq!(queues.count("A"), 0);
        // message + transfer-complete hit the socket channel
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn offline_device_is_queued() {
        let registry = DeviceRegistry::new();
        let (_dir, queues) = queues();

        let req = request(Category::Contact, &["A"]);
        let sent = dispatch(&registry, &queues, &req, &req.target_devices).await;

        assert_eq!(sent, 0);
        assert_eq!(queues.count("A"), 1);
        assert_eq!(queues.read("A")[0].request.message, "hi");
    }

    #[tokio::test]
    async fn busy_device_is_queued_at_tail() {
        let registry = DeviceRegistry::new();
        let (_dir, queues) = queues();
        let _rx = connect(&registry, "A");
        registry.update_status("A", true, false);

        let req = request(Category::Contact, &["A"]);
        let sent = dispatch(&registry, &queues, &req, &req.target_devices).await;

        assert_eq!(sent, 0);
        assert_eq!(queues.count("A"), 1);
    }

    #[tokio::test]
    async fn busy_in_other_category_still_delivers() {
        let registry = DeviceRegistry::new();
        let (_dir, queues) = queues();
        let _rx = connect(&registry, "A");
        registry.update_status("A", true, false);

        let req = request(Category::Group, &["A"]);
        let sent = dispatch(&registry, &queues, &req, &req.target_devices).await;

        assert_eq!(sent, 1);
        assert_eq!(queues.count("A"), 0);
        assert!(registry.is_busy("A", Category::Group));
    }

    #[tokio::test]
    async fn second_dispatch_before_status_clear_is_queued() {
        // The worked scenario: a delivery marks the device busy, so a second
        // request in the same category queues until the device reports idle.
        let registry = DeviceRegistry::new();
        let (_dir, queues) = queues();
        let _rx = connect(&registry, "A");

        let req = request(Category::Contact, &["A"]);
        assert_eq!(dispatch(&registry, &queues, &req, &req.target_devices).await, 1);
        assert!(registry.is_busy("A", Category::Contact));
        assert_eq!(queues.count("A"), 0);

        assert_eq!(dispatch(&registry, &queues, &req, &req.target_devices).await, 0);
        assert_eq!(queues.count("A"), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_dropped_not_queued() {
        let registry = DeviceRegistry::new();
        let (_dir, queues) = queues();
        let rx = connect(&registry, "A");
        drop(rx); // channel closed: every send fails at the transport

        let req = request(Category::Contact, &["A"]);
        let sent = dispatch(&registry, &queues, &req, &req.target_devices).await;

        assert_eq!(sent, 0);
        // Deliberately different from busy/offline: nothing is queued,
        // and the claim is rolled back.
        assert_eq!(queues.count("A"), 0);
        assert!(!registry.is_busy("A", Category::Contact));
    }

    #[tokio::test]
    async fn mixed_targets_count_only_immediate_deliveries() {
        let registry = DeviceRegistry::new();
        let (_dir, queues) = queues();
        let _rx_a = connect(&registry, "A");
        let _rx_c = connect(&registry, "C");
        registry.update_status("C", true, true);

        let req = request(Category::Contact, &["A", "B", "C"]);
        let sent = dispatch(&registry, &queues, &req, &req.target_devices).await;

        assert_eq!(sent, 1);
        assert_eq!(queues.count("A"), 0);
        assert_eq!(queues.count("B"), 1);
        assert_eq!(queues.count("C"), 1);
    }

    #[tokio::test]
    async fn duplicate_targets_are_not_deduplicated() {
        let registry = DeviceRegistry::new();
        let (_dir, queues) = queues();
        let _rx = connect(&registry, "A");

        let req = request(Category::Contact, &["A", "A"]);
        let sent = dispatch(&registry, &queues, &req, &req.target_devices).await;

        // First claim wins and delivers; the repeat sees a busy device.
        assert_eq!(sent, 1);
        assert_eq!(queues.count("A"), 1);
    }
}
