pub mod error;
pub mod queue;
pub mod roster;
pub mod uploads;

pub use error::StoreError;
pub use queue::QueueStore;
pub use roster::Roster;
pub use uploads::UploadStore;
