use crate::{Error, Result};
use chromiumoxide::browser::BrowserConfig;
use pagescope_core::config::BrowserVisibility;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How Chrome is started for an engine
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub chrome_path: Option<PathBuf>,
    pub visibility: BrowserVisibility,
    /// Disable the Chrome sandbox (needed when running as root in containers)
    pub no_sandbox: bool,
    /// Upper bound on any single CDP command
    pub request_timeout: Duration,
    pub extra_args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            visibility: BrowserVisibility::Headless,
            no_sandbox: false,
            request_timeout: Duration::from_secs(30),
            extra_args: Vec::new(),
        }
    }
}

impl LaunchOptions {
    /// Build Chrome command-line arguments beyond chromiumoxide's defaults
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-extensions".to_string(),
        ];

        if self.no_sandbox {
            args.push("--no-sandbox".to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Assemble the chromiumoxide launch configuration
    pub fn browser_config(&self, chrome_binary: &Path, profile: &Path) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_binary)
            .user_data_dir(profile)
            .request_timeout(self.request_timeout)
            .args(self.build_args());

        if self.visibility == BrowserVisibility::Headful {
            builder = builder.with_head();
        }

        builder
            .build()
            .map_err(|e| Error::ResourceAcquisition(format!("Invalid browser config: {}", e)))
    }
}
