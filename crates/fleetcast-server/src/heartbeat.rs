use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Interval between heartbeat pings on a device socket.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Liveness bookkeeping for one socket: a "pong seen since last ping" flag.
///
/// Each tick the writer task calls [`Liveness::check_and_arm`]: a connection
/// that produced no pong across a full interval is declared dead and
/// terminated, otherwise the flag is cleared and a fresh ping goes out. A
/// silent peer is detected within one to two intervals.
pub struct Liveness {
    pong_seen: AtomicBool,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    /// A new connection counts as alive until the first ping round.
    pub fn new() -> Self {
        Self {
            pong_seen: AtomicBool::new(true),
        }
    }

    /// Record a pong from the device.
    pub fn mark_pong(&self) {
        self.pong_seen.store(true, Ordering::Relaxed);
    }

    /// One heartbeat tick: returns whether the connection is still alive,
    /// clearing the flag so the next tick demands a fresh pong.
    pub fn check_and_arm(&self) -> bool {
        self.pong_seen.swap(false, Ordering::Relaxed)
    }
}
