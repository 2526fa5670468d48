//! Capability interface over the browser-automation engine.
//!
//! Sessions only talk to the browser through [`BrowserEngine`] and
//! [`PageDriver`], so the capture pipeline runs unchanged against Chrome or
//! an in-memory engine.

use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use futures::stream::BoxStream;
use pagescope_core::NavigationWaitPolicy;
use pagescope_core::report::NavigationStatus;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A network response whose body has finished loading
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedResponse {
    pub request_id: String,
    pub url: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
}

/// Response body as handed back by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBody {
    pub body: String,
    pub base64_encoded: bool,
}

impl ResponseBody {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            base64_encoded: false,
        }
    }

    /// Parse the body as JSON, decoding base64 transport encoding first
    pub fn parse_json(&self) -> Result<Value> {
        let parsed = if self.base64_encoded {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(self.body.trim())
                .map_err(|e| Error::MalformedResponseBody(format!("invalid base64: {}", e)))?;
            serde_json::from_slice(&bytes)
        } else {
            serde_json::from_str(&self.body)
        };
        parsed.map_err(|e| Error::MalformedResponseBody(e.to_string()))
    }
}

/// How a navigation wait ended, when it did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationOutcome {
    pub status: NavigationStatus,
    pub elapsed: Duration,
}

impl NavigationOutcome {
    pub fn settled(elapsed: Duration) -> Self {
        Self {
            status: NavigationStatus::Settled,
            elapsed,
        }
    }

    pub fn timed_out(elapsed: Duration) -> Self {
        Self {
            status: NavigationStatus::TimedOut,
            elapsed,
        }
    }
}

pub type ResponseStream = BoxStream<'static, ObservedResponse>;
pub type BindingStream = BoxStream<'static, String>;

/// Source of fresh, request-isolated pages
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a new page that shares no cookies, storage or globals with any
    /// other page. Failures are [`Error::ResourceAcquisition`].
    async fn open_page(&self) -> Result<Arc<dyn PageDriver>>;
}

/// One browser page bound to a single analysis
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Responses of this page, emitted once each body has fully loaded.
    async fn network_responses(&self) -> Result<ResponseStream>;

    async fn response_body(&self, request_id: &str) -> Result<ResponseBody>;

    /// Expose a host function `window[name](payload)` to page script. The
    /// stream ends when the page closes; later calls are dropped.
    async fn expose_binding(&self, name: &str) -> Result<BindingStream>;

    /// Register a script that runs before any page script in every new document.
    async fn add_init_script(&self, source: &str) -> Result<()>;

    /// Navigate and wait for `policy` within `timeout`.
    ///
    /// A timeout is reported as [`NavigationStatus::TimedOut`], not an error;
    /// `Err` means the navigation itself failed.
    async fn navigate(
        &self,
        url: &str,
        policy: NavigationWaitPolicy,
        timeout: Duration,
    ) -> Result<NavigationOutcome>;

    async fn evaluate(&self, expression: &str) -> Result<Value>;

    /// Release the page and anything allocated for it. Safe to call twice.
    async fn close(&self) -> Result<()>;
}
