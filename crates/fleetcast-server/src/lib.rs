pub mod dispatch;
pub mod drain;
pub mod heartbeat;
pub mod http;
pub mod registry;
pub mod server;
pub mod snapshot;
pub mod socket;
pub mod transfer;

pub use registry::{DeviceRegistry, Outbound};
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
pub use snapshot::{build_snapshot, DeviceStatus};
