use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming a Chrome binary to use
pub const CHROME_ENV: &str = "PAGESCOPE_CHROME";

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &["/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"];
#[cfg(not(target_os = "macos"))]
const INSTALL_PATHS: &[&str] = &["/usr/bin/google-chrome", "/usr/bin/chromium"];

/// Binary names looked up on `PATH`
const PATH_NAMES: &[&str] = &["google-chrome", "chromium", "chromium-browser"];

/// Locates the Chrome binary an engine launches
pub struct ChromeFinder {
    custom_path: Option<PathBuf>,
}

impl ChromeFinder {
    pub fn new(custom_path: Option<PathBuf>) -> Self {
        Self { custom_path }
    }

    /// An explicit path (flag, then `PAGESCOPE_CHROME`) must be usable as
    /// given; otherwise the usual install locations and `PATH` are searched.
    pub fn find(&self) -> Result<PathBuf> {
        let explicit = self
            .custom_path
            .clone()
            .or_else(|| std::env::var_os(CHROME_ENV).map(PathBuf::from));
        if let Some(path) = explicit {
            return executable(&path);
        }

        let installed = INSTALL_PATHS
            .iter()
            .find_map(|path| executable(Path::new(path)).ok());
        let on_path = || PATH_NAMES.iter().find_map(|name| which::which(name).ok());

        installed.or_else(on_path).ok_or_else(|| {
            Error::ResourceAcquisition(format!(
                "Chrome not found in {} or on PATH. Use --chrome-path or {} to specify location.",
                INSTALL_PATHS.join(", "),
                CHROME_ENV
            ))
        })
    }
}

fn executable(path: &Path) -> Result<PathBuf> {
    let metadata = std::fs::metadata(path).map_err(|_| {
        Error::ResourceAcquisition(format!("Chrome not found at: {}", path.display()))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(Error::ResourceAcquisition(format!(
                "Chrome binary not executable: {}",
                path.display()
            )));
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    tracing::debug!("Using Chrome at {}", path.display());
    Ok(path.to_path_buf())
}
