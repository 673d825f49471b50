pub mod frames;
pub mod ids;
pub mod request;

pub use frames::{BrokerFrame, Category, ChunkHeader, DeviceFrame, CHUNK_SIZE};
pub use request::{Attachment, DispatchRequest, QueueEntry};
