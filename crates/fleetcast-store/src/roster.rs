use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

/// The external roster of known device names: a flat file, one name per
/// line. Membership is independent of whether a device is connected, and the
/// file is re-read on every call, never cached across snapshot builds.
pub struct Roster {
    path: PathBuf,
}

impl Roster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All device names the roster lists. Blank lines and `#` comments are
    /// skipped; a missing or unreadable file is an empty roster.
    pub fn device_names(&self) -> BTreeSet<String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "roster file unreadable");
                return BTreeSet::new();
            }
        };

        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_owned)
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
