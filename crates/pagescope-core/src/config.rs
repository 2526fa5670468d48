//! Operator-scoped capture configuration.
//!
//! A [`CaptureConfig`] is resolved once per deployment from a [`Profile`]
//! preset overlaid with [`ConfigOverrides`] layers (config file, then CLI
//! flags). It never varies per request.

use crate::filter::ResponseFilter;
use crate::report::BodyShape;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the "settled" point of a navigation is determined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationWaitPolicy {
    /// No in-flight network activity for a short quiescence window
    #[default]
    NetworkQuiescent,
    /// The page's load event fired
    LoadComplete,
}

/// Whether the browser window is shown; has no effect on captured data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrowserVisibility {
    #[default]
    Headless,
    Headful,
}

/// Which page globals the extractor reads besides title and location
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GlobalProbeSet {
    /// `user`, `dataLayer` and `ShopifyAnalytics.meta`
    #[default]
    Full,
    /// `dataLayer` only
    Minimal,
}

/// Deployment profile presets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    #[default]
    Full,
    Minimal,
}

impl Profile {
    pub fn config(self) -> CaptureConfig {
        match self {
            Profile::Full => CaptureConfig::default(),
            Profile::Minimal => CaptureConfig {
                capture_dom_events: false,
                flatten_bodies: false,
                include_raw_body: true,
                globals: GlobalProbeSet::Minimal,
                navigation_wait_policy: NavigationWaitPolicy::LoadComplete,
                annotate_navigation: false,
                ..CaptureConfig::default()
            },
        }
    }
}

pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Resolved configuration for every session run by one analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    pub capture_dom_events: bool,
    pub flatten_bodies: bool,
    pub include_raw_body: bool,
    pub globals: GlobalProbeSet,
    pub navigation_wait_policy: NavigationWaitPolicy,
    pub navigation_timeout_ms: u64,
    pub annotate_navigation: bool,
    pub browser_visibility: BrowserVisibility,
    pub content_type: String,
    pub status_filter: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_dom_events: true,
            flatten_bodies: true,
            include_raw_body: true,
            globals: GlobalProbeSet::Full,
            navigation_wait_policy: NavigationWaitPolicy::NetworkQuiescent,
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            annotate_navigation: true,
            browser_visibility: BrowserVisibility::Headless,
            content_type: "application/json".to_string(),
            status_filter: None,
        }
    }
}

impl CaptureConfig {
    /// Resolve a config from layered overrides, lowest precedence first
    ///
    /// The profile preset is taken from the highest layer that names one.
    pub fn resolve(layers: &[ConfigOverrides]) -> Result<Self> {
        let profile = layers
            .iter()
            .rev()
            .find_map(|layer| layer.profile)
            .unwrap_or_default();

        let mut config = profile.config();
        for layer in layers {
            layer.apply(&mut config);
        }
        config.validate()?;

        tracing::debug!(?profile, ?config, "Resolved capture configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.navigation_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "navigation timeout must be greater than zero".to_string(),
            ));
        }
        if self.content_type.trim().is_empty() {
            return Err(Error::InvalidConfig("content type must not be empty".to_string()));
        }
        self.response_filter().map(|_| ())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn body_shape(&self) -> BodyShape {
        BodyShape {
            flatten: self.flatten_bodies,
            include_raw: self.include_raw_body,
        }
    }

    pub fn response_filter(&self) -> Result<ResponseFilter> {
        let filter = ResponseFilter::new(self.content_type.trim());
        match &self.status_filter {
            Some(pattern) => filter.with_status(pattern),
            None => Ok(filter),
        }
    }
}

/// A partial configuration layer; unset fields leave the lower layer intact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigOverrides {
    pub profile: Option<Profile>,
    pub capture_dom_events: Option<bool>,
    pub flatten_bodies: Option<bool>,
    pub include_raw_body: Option<bool>,
    pub globals: Option<GlobalProbeSet>,
    pub navigation_wait_policy: Option<NavigationWaitPolicy>,
    pub navigation_timeout_ms: Option<u64>,
    pub annotate_navigation: Option<bool>,
    pub browser_visibility: Option<BrowserVisibility>,
    pub content_type: Option<String>,
    pub status_filter: Option<String>,
}

impl ConfigOverrides {
    /// Read an overrides layer from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Default config file location: `~/.pagescope/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".pagescope").join("config.json"))
    }

    /// Load the explicit file if given, else the default file if it exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn apply(&self, config: &mut CaptureConfig) {
        if let Some(v) = self.capture_dom_events {
            config.capture_dom_events = v;
        }
        if let Some(v) = self.flatten_bodies {
            config.flatten_bodies = v;
        }
        if let Some(v) = self.include_raw_body {
            config.include_raw_body = v;
        }
        if let Some(v) = self.globals {
            config.globals = v;
        }
        if let Some(v) = self.navigation_wait_policy {
            config.navigation_wait_policy = v;
        }
        if let Some(v) = self.navigation_timeout_ms {
            config.navigation_timeout_ms = v;
        }
        if let Some(v) = self.annotate_navigation {
            config.annotate_navigation = v;
        }
        if let Some(v) = self.browser_visibility {
            config.browser_visibility = v;
        }
        if let Some(v) = &self.content_type {
            config.content_type = v.clone();
        }
        if let Some(v) = &self.status_filter {
            config.status_filter = Some(v.clone());
        }
    }
}
