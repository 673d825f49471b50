use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;

/// On-disk storage for attachment uploads. Each file keeps its original name
/// behind a unique prefix so repeated uploads never collide.
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Persist one upload, returning the stored file name.
    pub fn save(&self, name: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let stored = format!("{}-{}", Uuid::now_v7(), name);
        fs::write(self.dir.join(&stored), bytes)?;
        info!(name, stored, size = bytes.len(), "upload saved");
        Ok(stored)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
