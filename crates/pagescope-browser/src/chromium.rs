//! Chrome DevTools Protocol implementation of the browser capability traits.

use crate::driver::{
    BindingStream, BrowserEngine, NavigationOutcome, PageDriver, ResponseBody, ResponseStream,
};
use crate::{ChromeFinder, Error, LaunchOptions, NetworkCapture, ProfileDir, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::error::CdpError;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventResponseReceived,
    GetResponseBodyParams, RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, EventLifecycleEvent, NavigateParams,
    SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::handler::Handler;
use chromiumoxide::page::Page;
use futures::channel::mpsc;
use futures::StreamExt;
use pagescope_core::NavigationWaitPolicy;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// A running Chrome instance handing out one isolated context per page
pub struct ChromiumEngine {
    browser: Arc<Browser>,
    handler_task: JoinHandle<()>,
    _profile: Option<ProfileDir>,
}

impl ChromiumEngine {
    /// Launch a new Chrome process with a temporary profile
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let chrome_binary = ChromeFinder::new(options.chrome_path.clone()).find()?;
        let profile = ProfileDir::temporary()?;
        let config = options.browser_config(&chrome_binary, profile.path())?;

        tracing::info!(
            "Launching Chrome ({:?}) from {}",
            options.visibility,
            chrome_binary.display()
        );

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::ResourceAcquisition(format!("Failed to launch Chrome: {}", e)))?;

        Ok(Self::from_parts(browser, handler, Some(profile)))
    }

    /// Attach to an already running Chrome (e.g. `http://localhost:9222`)
    pub async fn connect(debugging_url: &str) -> Result<Self> {
        tracing::info!("Connecting to Chrome at {}", debugging_url);

        let mut retries = 5;
        let (browser, handler) = loop {
            match Browser::connect(debugging_url).await {
                Ok(result) => break result,
                Err(e) => {
                    retries -= 1;
                    if retries == 0 {
                        return Err(Error::ResourceAcquisition(format!(
                            "Failed to connect to Chrome after 5 attempts: {}",
                            e
                        )));
                    }
                    tracing::info!("CDP connection attempt failed, retrying... ({} left)", retries);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        };

        tracing::info!("CDP connection established");
        Ok(Self::from_parts(browser, handler, None))
    }

    fn from_parts(browser: Browser, mut handler: Handler, profile: Option<ProfileDir>) -> Self {
        // The handler must be polled for any CDP command to complete
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        Self {
            browser: Arc::new(browser),
            handler_task,
            _profile: profile,
        }
    }

    /// Close Chrome and stop the CDP handler
    pub async fn shutdown(self) -> Result<()> {
        match Arc::try_unwrap(self.browser) {
            Ok(mut browser) => {
                browser.close().await?;
                if let Err(e) = browser.wait().await {
                    tracing::debug!("Waiting for Chrome to exit failed: {}", e);
                }
            }
            Err(_) => tracing::warn!("Chrome still has open pages; leaving it to be killed on drop"),
        }
        self.handler_task.abort();
        tracing::info!("Chrome shut down");
        Ok(())
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open_page(&self) -> Result<Arc<dyn PageDriver>> {
        let context_id = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| {
                Error::ResourceAcquisition(format!("Failed to create browser context: {}", e))
            })?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(Error::ResourceAcquisition)?;

        let page = match self.browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                let _ = self
                    .browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await;
                return Err(Error::ResourceAcquisition(format!(
                    "Failed to open page: {}",
                    e
                )));
            }
        };

        tracing::debug!("Opened page in browser context {:?}", context_id);

        Ok(Arc::new(ChromiumPage {
            page,
            browser: Arc::clone(&self.browser),
            context_id,
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }))
    }
}

/// A page living in its own incognito browser context
pub struct ChromiumPage {
    page: Page,
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    /// Event forwarding tasks, aborted on close
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

/// How a load ended before the navigation deadline
enum Milestone {
    Reached,
    /// A CDP command hit chromiumoxide's own request timeout
    Stalled,
}

impl ChromiumPage {
    async fn track(&self, task: JoinHandle<()>) {
        self.tasks.lock().await.push(task);
    }

    /// Navigate and wait for the policy's lifecycle event on the new document
    async fn load(
        &self,
        url: &str,
        policy: NavigationWaitPolicy,
    ) -> std::result::Result<Milestone, String> {
        let stalled_or = |e: CdpError| match e {
            CdpError::Timeout => Ok(Milestone::Stalled),
            other => Err(other.to_string()),
        };

        if let Err(e) = self.page.execute(SetLifecycleEventsEnabledParams::new(true)).await {
            return stalled_or(e);
        }
        let mut lifecycle = match self.page.event_listener::<EventLifecycleEvent>().await {
            Ok(listener) => listener,
            Err(e) => return stalled_or(e),
        };

        let navigation = match self.page.execute(NavigateParams::new(url)).await {
            Ok(response) => response.result,
            Err(e) => return stalled_or(e),
        };
        if let Some(error_text) = navigation.error_text {
            return Err(error_text);
        }

        let milestone = match policy {
            NavigationWaitPolicy::NetworkQuiescent => "networkIdle",
            NavigationWaitPolicy::LoadComplete => "load",
        };
        while let Some(event) = lifecycle.next().await {
            if event.frame_id == navigation.frame_id
                && navigation.loader_id.as_ref().is_none_or(|id| *id == event.loader_id)
                && event.name == milestone
            {
                return Ok(Milestone::Reached);
            }
        }
        Err("page closed while loading".to_string())
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn network_responses(&self) -> Result<ResponseStream> {
        self.page.execute(EnableParams::default()).await?;

        let mut responses = self.page.event_listener::<EventResponseReceived>().await?;
        let mut finished = self.page.event_listener::<EventLoadingFinished>().await?;
        let mut failed = self.page.event_listener::<EventLoadingFailed>().await?;

        let (tx, rx) = mpsc::unbounded();
        let task = tokio::spawn(async move {
            let mut capture = NetworkCapture::new();

            loop {
                let ready = tokio::select! {
                    Some(event) = responses.next() => {
                        tracing::trace!("Response: {} - {}", event.response.status, event.response.url);
                        let headers = serde_json::from_value::<HashMap<String, String>>(
                            event.response.headers.inner().clone(),
                        )
                        .unwrap_or_default();
                        capture.add_response(
                            event.request_id.inner().to_string(),
                            event.response.url.clone(),
                            event.response.status as u16,
                            headers,
                        )
                    }
                    Some(event) = finished.next() => capture.mark_completed(event.request_id.inner()),
                    Some(event) = failed.next() => {
                        capture.mark_failed(event.request_id.inner());
                        None
                    }
                    else => break,
                };

                if let Some(response) = ready
                    && tx.unbounded_send(response).is_err()
                {
                    break;
                }
            }
        });
        self.track(task).await;

        Ok(rx.boxed())
    }

    async fn response_body(&self, request_id: &str) -> Result<ResponseBody> {
        let params = GetResponseBodyParams::new(RequestId::new(request_id));
        let result = self.page.execute(params).await?.result;
        Ok(ResponseBody {
            body: result.body,
            base64_encoded: result.base64_encoded,
        })
    }

    async fn expose_binding(&self, name: &str) -> Result<BindingStream> {
        let mut calls = self.page.event_listener::<EventBindingCalled>().await?;
        self.page.execute(AddBindingParams::new(name)).await?;

        let (tx, rx) = mpsc::unbounded();
        let name = name.to_string();
        let task = tokio::spawn(async move {
            while let Some(call) = calls.next().await {
                if call.name == name && tx.unbounded_send(call.payload.clone()).is_err() {
                    break;
                }
            }
        });
        self.track(task).await;

        Ok(rx.boxed())
    }

    async fn add_init_script(&self, source: &str) -> Result<()> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(source))
            .await?;
        Ok(())
    }

    async fn navigate(
        &self,
        url: &str,
        policy: NavigationWaitPolicy,
        timeout: Duration,
    ) -> Result<NavigationOutcome> {
        let started = Instant::now();

        // The navigate command itself counts against the deadline: a server
        // that never answers keeps it pending until commit.
        match tokio::time::timeout(timeout, self.load(url, policy)).await {
            Ok(Ok(Milestone::Reached)) => Ok(NavigationOutcome::settled(started.elapsed())),
            Ok(Ok(Milestone::Stalled)) | Err(_) => Ok(NavigationOutcome::timed_out(started.elapsed())),
            Ok(Err(reason)) => Err(Error::Navigation {
                url: url.to_string(),
                reason,
            }),
        }
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self.page.evaluate(expression).await?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }

        let page_closed = self.page.clone().close().await;
        let context_disposed = self
            .browser
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await;

        tracing::debug!("Closed page and disposed browser context {:?}", self.context_id);

        page_closed?;
        context_disposed?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PageAnalyzer;
    use pagescope_core::CaptureConfig;
    use pagescope_core::report::AnalysisRequest;

    fn load_complete() -> CaptureConfig {
        CaptureConfig {
            navigation_wait_policy: NavigationWaitPolicy::LoadComplete,
            navigation_timeout_ms: 10_000,
            ..CaptureConfig::default()
        }
    }

    #[tokio::test]
    #[ignore] // Requires Chrome to be installed
    async fn test_chromium_analyze_data_url() {
        let engine = ChromiumEngine::launch(&LaunchOptions::default()).await.unwrap();
        let analyzer = PageAnalyzer::new(engine, load_complete()).unwrap();

        let html = "data:text/html,<title>T</title><script>window.user={id:1}</script>\
                    <button id=buy class=cta data-sku=A1>Buy</button>\
                    <script>document.getElementById('buy').click()</script>";
        let report = analyzer.analyze(AnalysisRequest::new(html)).await.unwrap();

        assert_eq!(report.globals.title, "T");
        assert_eq!(report.globals.user, Some(serde_json::json!({"id": 1})));
        assert_eq!(report.globals.data_layer, Some(Value::Null));

        let clicks = report.dom_events.unwrap();
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0].tag, "BUTTON");
        assert_eq!(clicks[0].dataset.get("sku").map(String::as_str), Some("A1"));

        analyzer.into_engine().shutdown().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Chrome to be installed
    async fn test_chromium_silent_server_times_out_partially() {
        // accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let engine = ChromiumEngine::launch(&LaunchOptions::default()).await.unwrap();
        let config = CaptureConfig {
            navigation_timeout_ms: 2_000,
            ..load_complete()
        };
        let analyzer = PageAnalyzer::new(engine, config).unwrap();

        let started = Instant::now();
        let report = analyzer
            .analyze(AnalysisRequest::new(format!("http://{}/", addr)))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(
            report.navigation.unwrap().outcome,
            pagescope_core::report::NavigationStatus::TimedOut
        );

        silent.abort();
        analyzer.into_engine().shutdown().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Chrome to be installed
    async fn test_chromium_unreachable_url_fails() {
        let engine = ChromiumEngine::launch(&LaunchOptions::default()).await.unwrap();
        let analyzer = PageAnalyzer::new(engine, load_complete()).unwrap();

        for _ in 0..3 {
            let err = analyzer
                .analyze(AnalysisRequest::new("http://127.0.0.1:1/"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Navigation { .. }));
        }

        analyzer.into_engine().shutdown().await.unwrap();
    }
}
