use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use pagescope_browser::{ChromiumEngine, LaunchOptions};
use pagescope_core::config::{BrowserVisibility, CaptureConfig, ConfigOverrides};
use pagescope_core::{NavigationWaitPolicy, Profile};
use std::path::PathBuf;

pub mod commands;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProfileArg {
    /// Flattened + raw bodies, DOM clicks, user/dataLayer/analytics globals
    Full,
    /// Raw bodies only, no DOM clicks, dataLayer only
    Minimal,
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Full => Profile::Full,
            ProfileArg::Minimal => Profile::Minimal,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum WaitArg {
    /// Wait until the network has been idle for a moment
    NetworkQuiescent,
    /// Wait for the load event
    LoadComplete,
}

impl From<WaitArg> for NavigationWaitPolicy {
    fn from(arg: WaitArg) -> Self {
        match arg {
            WaitArg::NetworkQuiescent => NavigationWaitPolicy::NetworkQuiescent,
            WaitArg::LoadComplete => NavigationWaitPolicy::LoadComplete,
        }
    }
}

/// Capture and browser flags shared by `analyze` and `serve`
#[derive(Args, Debug, Clone, Default)]
pub struct CaptureArgs {
    /// Deployment profile preset
    #[arg(long, value_enum, env = "PAGESCOPE_PROFILE")]
    pub profile: Option<ProfileArg>,

    /// JSON config file (defaults to ~/.pagescope/config.json when present)
    #[arg(long, value_name = "FILE", env = "PAGESCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not record DOM click events
    #[arg(long)]
    pub no_dom_events: bool,

    /// Include the raw JSON body next to the flattened form
    #[arg(long, overrides_with = "no_raw")]
    pub raw: bool,

    /// Omit the raw JSON body when flattening
    #[arg(long, overrides_with = "raw")]
    pub no_raw: bool,

    /// When the page counts as settled
    #[arg(long, value_enum, value_name = "POLICY")]
    pub wait: Option<WaitArg>,

    /// Navigation timeout in seconds
    #[arg(long, value_name = "SECS", env = "PAGESCOPE_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Only keep responses whose status matches (e.g. 200, 2xx, 200-299)
    #[arg(long, value_name = "PATTERN")]
    pub status: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Path to Chrome/Chromium executable
    #[arg(long, value_name = "PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Launch Chrome without its sandbox (needed as root in containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Attach to a running Chrome via its DevTools URL instead of launching one
    #[arg(long, value_name = "WS_URL", conflicts_with_all = ["chrome_path", "headful", "no_sandbox"])]
    pub connect: Option<String>,
}

impl CaptureArgs {
    /// The command-line layer of the configuration
    pub fn overrides(&self) -> ConfigOverrides {
        let include_raw_body = match (self.raw, self.no_raw) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        ConfigOverrides {
            profile: self.profile.map(Profile::from),
            capture_dom_events: self.no_dom_events.then_some(false),
            include_raw_body,
            navigation_wait_policy: self.wait.map(NavigationWaitPolicy::from),
            navigation_timeout_ms: self.timeout.map(|secs| secs.saturating_mul(1000)),
            browser_visibility: self.headful.then_some(BrowserVisibility::Headful),
            status_filter: self.status.clone(),
            ..ConfigOverrides::default()
        }
    }

    /// Resolve profile preset, config file and flags into one config
    pub fn resolve_config(&self) -> Result<CaptureConfig> {
        let file = ConfigOverrides::load(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("Failed to load config file {}", path.display()),
            None => "Failed to load ~/.pagescope/config.json".to_string(),
        })?;

        CaptureConfig::resolve(&[file, self.overrides()]).context("Invalid configuration")
    }

    pub fn launch_options(&self, config: &CaptureConfig) -> LaunchOptions {
        let defaults = LaunchOptions::default();
        LaunchOptions {
            chrome_path: self.chrome_path.clone(),
            visibility: config.browser_visibility,
            no_sandbox: self.no_sandbox,
            // a CDP command must not give up before the navigation deadline
            request_timeout: defaults.request_timeout.max(config.navigation_timeout()),
            ..defaults
        }
    }

    /// Start or attach to the browser every analysis will use
    pub async fn engine(&self, config: &CaptureConfig) -> Result<ChromiumEngine> {
        let engine = match &self.connect {
            Some(url) => ChromiumEngine::connect(url).await?,
            None => ChromiumEngine::launch(&self.launch_options(config)).await?,
        };
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        capture: CaptureArgs,
    }

    fn parse(args: &[&str]) -> CaptureArgs {
        let mut argv = vec!["pagescope"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).capture
    }

    #[test]
    fn test_no_flags_override_nothing() {
        let args = CaptureArgs::default();
        assert_eq!(args.overrides(), ConfigOverrides::default());
    }

    #[test]
    fn test_flags_map_to_overrides() {
        let overrides = parse(&[
            "--profile",
            "minimal",
            "--no-dom-events",
            "--wait",
            "load-complete",
            "--timeout",
            "5",
            "--headful",
            "--status",
            "2xx",
        ])
        .overrides();

        assert_eq!(overrides.profile, Some(Profile::Minimal));
        assert_eq!(overrides.capture_dom_events, Some(false));
        assert_eq!(overrides.navigation_wait_policy, Some(NavigationWaitPolicy::LoadComplete));
        assert_eq!(overrides.navigation_timeout_ms, Some(5000));
        assert_eq!(overrides.browser_visibility, Some(BrowserVisibility::Headful));
        assert_eq!(overrides.status_filter.as_deref(), Some("2xx"));
    }

    #[test]
    fn test_last_raw_flag_wins() {
        assert_eq!(parse(&["--raw", "--no-raw"]).overrides().include_raw_body, Some(false));
        assert_eq!(parse(&["--no-raw", "--raw"]).overrides().include_raw_body, Some(true));
        assert_eq!(parse(&[]).overrides().include_raw_body, None);
    }

    #[test]
    fn test_flags_beat_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"navigationTimeoutMs": 9000, "captureDomEvents": true}"#).unwrap();

        let args = parse(&["--config", path.to_str().unwrap(), "--no-dom-events"]);
        let config = args.resolve_config().unwrap();

        assert!(!config.capture_dom_events);
        assert_eq!(config.navigation_timeout_ms, 9000);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "{}").unwrap();

        let args = parse(&["--config", path.to_str().unwrap(), "--timeout", "0"]);

        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn test_long_navigation_timeout_raises_request_timeout() {
        let args = parse(&["--no-sandbox"]);
        let mut config = CaptureConfig::default();

        let options = args.launch_options(&config);
        assert!(options.no_sandbox);
        assert_eq!(options.request_timeout, LaunchOptions::default().request_timeout);

        config.navigation_timeout_ms = 90_000;
        let options = args.launch_options(&config);
        assert_eq!(options.request_timeout, std::time::Duration::from_secs(90));
    }

    #[test]
    fn test_connect_conflicts_with_launch_flags() {
        let result = TestCli::try_parse_from([
            "pagescope",
            "--connect",
            "ws://127.0.0.1:9222/devtools/browser/x",
            "--chrome-path",
            "/usr/bin/chromium",
        ]);
        assert!(result.is_err());
    }
}
