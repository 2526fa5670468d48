//! In-memory [`BrowserEngine`] for driving sessions without Chrome.
//!
//! Each URL maps to a scripted [`FakeSite`]: the responses it loads, the
//! clicks it fires, what the globals probe returns and how navigation ends.
//! The engine counts opened and closed pages and logs every driver call, so
//! tests can check teardown and call ordering.

use crate::driver::{
    BindingStream, BrowserEngine, NavigationOutcome, ObservedResponse, PageDriver, ResponseBody,
    ResponseStream,
};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{self, UnboundedSender};
use pagescope_core::NavigationWaitPolicy;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A JSON-or-not response a fake site loads during navigation
#[derive(Debug, Clone)]
pub struct FakeResponse {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
    /// How long reading the body takes
    pub delay: Duration,
}

impl FakeResponse {
    pub fn new(
        url: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: content_type.into(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// How navigation to a fake site ends
#[derive(Debug, Clone, Default)]
pub enum SiteOutcome {
    /// Settles once the site's load time has passed
    #[default]
    Settle,
    /// Never settles; only the navigation timeout ends the wait
    Hang,
    Fail(String),
}

/// Scripted behavior for one URL
#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    responses: Vec<FakeResponse>,
    clicks: Vec<Value>,
    late_clicks: Vec<Value>,
    globals: Option<Value>,
    probe_fails: bool,
    outcome: SiteOutcome,
    load_time: Duration,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response(mut self, response: FakeResponse) -> Self {
        self.responses.push(response);
        self
    }

    /// A click fired while the page loads
    pub fn click(mut self, payload: Value) -> Self {
        self.clicks.push(payload);
        self
    }

    /// A click on an element inserted after load, fired once the page settled
    pub fn late_click(mut self, payload: Value) -> Self {
        self.late_clicks.push(payload);
        self
    }

    /// What the globals probe sees; defaults to just title and location
    pub fn globals(mut self, globals: Value) -> Self {
        self.globals = Some(globals);
        self
    }

    pub fn probe_fails(mut self) -> Self {
        self.probe_fails = true;
        self
    }

    pub fn outcome(mut self, outcome: SiteOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// How long the page takes to settle after its responses arrive
    pub fn load_time(mut self, load_time: Duration) -> Self {
        self.load_time = load_time;
        self
    }
}

#[derive(Debug, Default)]
struct Ledger {
    opened: AtomicUsize,
    closed: AtomicUsize,
    events: Mutex<Vec<String>>,
}

impl Ledger {
    fn record(&self, event: &str) {
        lock(&self.events).push(event.to_string());
    }
}

/// Engine handing out [`FakePage`]s backed by scripted sites
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    sites: Arc<HashMap<String, FakeSite>>,
    fail_launch: bool,
    ledger: Arc<Ledger>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn site(mut self, url: impl Into<String>, site: FakeSite) -> Self {
        Arc::make_mut(&mut self.sites).insert(url.into(), site);
        self
    }

    /// Every `open_page` fails as if the browser could not start
    pub fn fail_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.ledger.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.ledger.closed.load(Ordering::SeqCst)
    }

    /// Driver calls across all pages, in call order
    pub fn events(&self) -> Vec<String> {
        lock(&self.ledger.events).clone()
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn open_page(&self) -> Result<Arc<dyn PageDriver>> {
        if self.fail_launch {
            return Err(Error::ResourceAcquisition(
                "browser process exited".to_string(),
            ));
        }
        self.ledger.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakePage {
            sites: Arc::clone(&self.sites),
            ledger: Arc::clone(&self.ledger),
            state: Mutex::new(PageState::default()),
            closed: AtomicBool::new(false),
        }))
    }
}

#[derive(Default)]
struct PageState {
    responses: Option<UnboundedSender<ObservedResponse>>,
    binding: Option<(String, UnboundedSender<String>)>,
    init_scripts: Vec<String>,
    bodies: HashMap<String, FakeResponse>,
    site: Option<(String, FakeSite)>,
}

impl PageState {
    /// Deliver a click only if a listener script and its binding are in place
    fn click(&self, payload: &Value) {
        if let Some((name, tx)) = &self.binding
            && self
                .init_scripts
                .iter()
                .any(|script| script.contains(name.as_str()))
        {
            let _ = tx.unbounded_send(payload.to_string());
        }
    }
}

/// One scripted page
pub struct FakePage {
    sites: Arc<HashMap<String, FakeSite>>,
    ledger: Arc<Ledger>,
    state: Mutex<PageState>,
    closed: AtomicBool,
}

impl FakePage {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Browser("page is closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn network_responses(&self) -> Result<ResponseStream> {
        self.ensure_open()?;
        self.ledger.record("network_responses");
        let (tx, rx) = mpsc::unbounded();
        lock(&self.state).responses = Some(tx);
        Ok(rx.boxed())
    }

    async fn response_body(&self, request_id: &str) -> Result<ResponseBody> {
        let response = lock(&self.state)
            .bodies
            .get(request_id)
            .cloned()
            .ok_or_else(|| {
                Error::Cdp(format!("No resource with given identifier: {}", request_id))
            })?;
        tokio::time::sleep(response.delay).await;
        Ok(ResponseBody::text(response.body))
    }

    async fn expose_binding(&self, name: &str) -> Result<BindingStream> {
        self.ensure_open()?;
        self.ledger.record("expose_binding");
        let (tx, rx) = mpsc::unbounded();
        lock(&self.state).binding = Some((name.to_string(), tx));
        Ok(rx.boxed())
    }

    async fn add_init_script(&self, source: &str) -> Result<()> {
        self.ensure_open()?;
        self.ledger.record("add_init_script");
        lock(&self.state).init_scripts.push(source.to_string());
        Ok(())
    }

    async fn navigate(
        &self,
        url: &str,
        _policy: NavigationWaitPolicy,
        timeout: Duration,
    ) -> Result<NavigationOutcome> {
        self.ensure_open()?;
        self.ledger.record("navigate");

        let Some(site) = self.sites.get(url).cloned() else {
            return Err(Error::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        };
        if let SiteOutcome::Fail(reason) = &site.outcome {
            return Err(Error::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }

        let started = Instant::now();
        let (hangs, load_time) = {
            let mut state = lock(&self.state);
            for (index, response) in site.responses.iter().enumerate() {
                let request_id = format!("{}.{}", url, index);
                state.bodies.insert(request_id.clone(), response.clone());
                if let Some(tx) = &state.responses {
                    let mut headers = HashMap::new();
                    headers.insert("Content-Type".to_string(), response.content_type.clone());
                    let _ = tx.unbounded_send(ObservedResponse {
                        request_id,
                        url: response.url.clone(),
                        status: response.status,
                        headers,
                    });
                }
            }
            for payload in &site.clicks {
                state.click(payload);
            }

            let hangs = matches!(site.outcome, SiteOutcome::Hang);
            let load_time = site.load_time;
            state.site = Some((url.to_string(), site));
            drop(state);
            (hangs, load_time)
        };

        let settled = async {
            if hangs {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(load_time).await;
        };
        match tokio::time::timeout(timeout, settled).await {
            Ok(()) => Ok(NavigationOutcome::settled(started.elapsed())),
            Err(_) => Ok(NavigationOutcome::timed_out(started.elapsed())),
        }
    }

    async fn evaluate(&self, _expression: &str) -> Result<Value> {
        self.ensure_open()?;
        self.ledger.record("evaluate");

        let state = lock(&self.state);
        let Some((url, site)) = &state.site else {
            return Ok(Value::String(
                json!({"title": "", "location": "about:blank"}).to_string(),
            ));
        };
        if site.probe_fails {
            return Err(Error::Cdp("Execution context was destroyed".to_string()));
        }
        for payload in &site.late_clicks {
            state.click(payload);
        }

        let globals = site
            .globals
            .clone()
            .unwrap_or_else(|| json!({"title": "", "location": url}));
        Ok(Value::String(globals.to_string()))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = lock(&self.state);
        state.responses = None;
        state.binding = None;
        drop(state);

        self.ledger.record("close");
        self.ledger.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clicks_need_binding_and_listener() {
        let engine = FakeEngine::new().site(
            "https://a.test/",
            FakeSite::new().click(json!({"tag": "A"})),
        );
        let page = engine.open_page().await.unwrap();

        let mut messages = page.expose_binding("__probe").await.unwrap();
        page.navigate(
            "https://a.test/",
            NavigationWaitPolicy::LoadComplete,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        page.close().await.unwrap();

        // listener script was never installed
        assert!(messages.next().await.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let engine = FakeEngine::new();
        let page = engine.open_page().await.unwrap();

        page.close().await.unwrap();
        page.close().await.unwrap();

        assert_eq!(engine.opened(), 1);
        assert_eq!(engine.closed(), 1);
        assert!(page.evaluate("1").await.is_err());
    }
}
