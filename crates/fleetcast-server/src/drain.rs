use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use fleetcast_core::frames::Category;
use fleetcast_store::{QueueStore, Roster};

use crate::registry::DeviceRegistry;
use crate::transfer;

/// Interval between queue drain sweeps.
pub const DRAIN_INTERVAL: Duration = Duration::from_secs(8);

/// One drain sweep over the roster: for every device that is connected and
/// idle in both categories, pop the head of its queue and deliver it through
/// the chunked path. At most one entry per device per sweep, which bounds
/// burstiness; a long backlog drains one message per device per interval.
/// Returns how many entries were delivered.
pub async fn drain_tick(roster: &Roster, registry: &DeviceRegistry, queues: &QueueStore) -> usize {
    let mut drained = 0;

    for name in roster.device_names() {
        if !registry.is_online(&name)
            || registry.is_busy(&name, Category::Contact)
            || registry.is_busy(&name, Category::Group)
        {
            continue;
        }

        let mut entries = queues.read(&name);
        if entries.is_empty() {
            continue;
        }
        let head = entries.remove(0);

        // A live dispatch can win the claim between the idle check and here;
        // the entry stays at the head for the next sweep.
        if !registry.try_claim(&name, head.request.category) {
            continue;
        }
        if let Err(e) = queues.write(&name, &entries) {
            warn!(device = %name, error = %e, "failed to persist drained queue");
            registry.release(&name, head.request.category);
            continue;
        }

        let delivery = match registry.sender(&name) {
            Some(tx) => transfer::deliver(&tx, &head.request).await,
            None => Err(transfer::SendError::ChannelClosed),
        };
        match delivery {
            Ok(()) => {
                info!(device = %name, entry = %head.id, remaining = entries.len(), "queued entry drained");
                drained += 1;
            }
            Err(e) => {
                // Same not-sent semantics as a live dispatch failure: the
                // popped entry is dropped, not re-queued.
                registry.release(&name, head.request.category);
                warn!(device = %name, entry = %head.id, error = %e, "drain delivery failed, dropping");
            }
        }
    }

    drained
}

/// Spawn the periodic drain task.
pub fn start_drain_task(
    roster: Arc<Roster>,
    registry: Arc<DeviceRegistry>,
    queues: Arc<QueueStore>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DRAIN_INTERVAL);
        ticker.tick().await; // consume the immediate first tick
        loop {
            ticker.tick().await;
            let drained = drain_tick(&roster, &registry, &queues).await;
            if drained > 0 {
                info!(drained, "queue drain sweep");
            }
        }
    })
}
