//! Per-request orchestration of page acquisition, capture and teardown.

use crate::capture::{CaptureHandle, GlobalsExtractor, InteractionCapturer, ResponseCapturer};
use crate::driver::{BrowserEngine, NavigationOutcome, PageDriver};
use crate::{Error, Result};
use pagescope_core::CaptureConfig;
use pagescope_core::report::{
    AnalysisReport, AnalysisRequest, CapturedClickEvent, CapturedResponse, GlobalSnapshot,
    NavigationStatus, NavigationSummary,
};
use std::sync::Arc;

/// Lifecycle of a single analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Launching,
    ReadyToCapture,
    Navigating,
    Settled,
    TornDown,
}

struct Session<'a> {
    url: &'a str,
    state: SessionState,
}

impl<'a> Session<'a> {
    fn new(url: &'a str) -> Self {
        Self {
            url,
            state: SessionState::Idle,
        }
    }

    fn advance(&mut self, next: SessionState) {
        tracing::debug!("{}: {:?} -> {:?}", self.url, self.state, next);
        self.state = next;
    }
}

/// Capturers running against one page, not yet read
struct ActiveCapture {
    responses: CaptureHandle<CapturedResponse>,
    clicks: Option<CaptureHandle<CapturedClickEvent>>,
}

/// Runs analyses against pages handed out by a [`BrowserEngine`]
///
/// The analyzer itself holds no per-request state, so one instance can serve
/// any number of concurrent `analyze` calls; each call gets its own page and
/// its own capture buffers.
pub struct PageAnalyzer<E: BrowserEngine> {
    engine: E,
    config: CaptureConfig,
    responses: ResponseCapturer,
    interactions: Option<InteractionCapturer>,
    globals: GlobalsExtractor,
}

impl<E: BrowserEngine> PageAnalyzer<E> {
    pub fn new(engine: E, config: CaptureConfig) -> Result<Self> {
        config.validate()?;
        let responses = ResponseCapturer::new(config.response_filter()?, config.body_shape());
        let interactions = config
            .capture_dom_events
            .then(InteractionCapturer::default);
        let globals = GlobalsExtractor::new(config.globals);

        Ok(Self {
            engine,
            config,
            responses,
            interactions,
            globals,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Analyze one URL and assemble its report
    ///
    /// Fails only with [`Error::ResourceAcquisition`] or [`Error::Navigation`].
    /// Once a page has been opened it is closed before this returns, whatever
    /// the outcome.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisReport> {
        let mut session = Session::new(&request.url);
        tracing::info!("Analyzing {}", request.url);

        session.advance(SessionState::Launching);
        let page = self.engine.open_page().await.map_err(as_acquisition)?;

        let outcome = self.observe(&mut session, Arc::clone(&page)).await;

        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close page for {}: {}", request.url, e);
        }
        session.advance(SessionState::TornDown);

        match &outcome {
            Ok(report) => tracing::info!(
                "Finished {}: {} responses, {} clicks",
                request.url,
                report.api_responses.len(),
                report.dom_events.as_ref().map_or(0, Vec::len)
            ),
            Err(e) => tracing::warn!("Analysis of {} failed: {}", request.url, e),
        }
        outcome
    }

    async fn observe(
        &self,
        session: &mut Session<'_>,
        page: Arc<dyn PageDriver>,
    ) -> Result<AnalysisReport> {
        let capture = self.attach(&page).await?;
        session.advance(SessionState::ReadyToCapture);

        session.advance(SessionState::Navigating);
        let navigation = page
            .navigate(
                session.url,
                self.config.navigation_wait_policy,
                self.config.navigation_timeout(),
            )
            .await
            .map_err(|e| as_navigation(session.url, e))?;

        if navigation.status == NavigationStatus::TimedOut {
            tracing::warn!(
                "{} did not settle within {}ms; reporting partial capture",
                session.url,
                self.config.navigation_timeout_ms
            );
        }
        session.advance(SessionState::Settled);

        let globals = match self.globals.extract(page.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Could not read page globals for {}: {}", session.url, e);
                GlobalSnapshot::unavailable(session.url, self.config.globals)
            }
        };

        let api_responses = capture.responses.finish().await;
        let dom_events = match capture.clicks {
            Some(clicks) => Some(clicks.finish().await),
            None => None,
        };

        Ok(AnalysisReport {
            url_analyzed: session.url.to_string(),
            globals,
            api_responses,
            dom_events,
            navigation: self.summarize(navigation),
        })
    }

    /// Wire every enabled capturer; nothing may navigate before this returns
    async fn attach(&self, page: &Arc<dyn PageDriver>) -> Result<ActiveCapture> {
        let responses = self
            .responses
            .attach(Arc::clone(page))
            .await
            .map_err(as_acquisition)?;

        let clicks = match &self.interactions {
            Some(capturer) => Some(capturer.attach(page.as_ref()).await.map_err(as_acquisition)?),
            None => None,
        };

        Ok(ActiveCapture { responses, clicks })
    }

    fn summarize(&self, navigation: NavigationOutcome) -> Option<NavigationSummary> {
        self.config.annotate_navigation.then(|| NavigationSummary {
            outcome: navigation.status,
            elapsed_ms: u64::try_from(navigation.elapsed.as_millis()).unwrap_or(u64::MAX),
        })
    }
}

fn as_acquisition(err: Error) -> Error {
    match err {
        Error::ResourceAcquisition(_) => err,
        other => Error::ResourceAcquisition(other.to_string()),
    }
}

fn as_navigation(url: &str, err: Error) -> Error {
    match err {
        Error::Navigation { .. } => err,
        other => Error::Navigation {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}
