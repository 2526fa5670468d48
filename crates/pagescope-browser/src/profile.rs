use crate::Result;
use std::path::Path;
use tempfile::TempDir;

/// Throwaway Chrome user-data directory, deleted on drop
///
/// Every engine gets its own so no cookies or storage outlive it.
pub struct ProfileDir {
    dir: TempDir,
}

impl ProfileDir {
    pub fn temporary() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("pagescope-profile-").tempdir()?;
        tracing::debug!("Created temporary Chrome profile at {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Get the profile directory path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
