use super::{CaptureHandle, DRAIN_TIMEOUT};
use crate::Result;
use crate::driver::{ObservedResponse, PageDriver};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use pagescope_core::filter::ResponseFilter;
use pagescope_core::report::{BodyShape, CapturedResponse};
use std::sync::Arc;

/// Records JSON network responses of a page
///
/// Responses failing the filter are ignored; bodies that cannot be read or
/// parsed are dropped one by one without affecting the session. Records are
/// appended in the order their bodies finish parsing.
#[derive(Debug, Clone)]
pub struct ResponseCapturer {
    filter: ResponseFilter,
    shape: BodyShape,
}

impl ResponseCapturer {
    pub fn new(filter: ResponseFilter, shape: BodyShape) -> Self {
        Self { filter, shape }
    }

    /// Subscribe to the page's responses and start capturing in the background
    pub async fn attach(&self, page: Arc<dyn PageDriver>) -> Result<CaptureHandle<CapturedResponse>> {
        let mut events = page.network_responses().await?;
        let (handle, mut shutdown, result) = CaptureHandle::new();
        let capturer = self.clone();

        tokio::spawn(async move {
            let mut captured = Vec::new();
            let mut in_flight = FuturesUnordered::new();
            let mut events_open = true;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    Some(record) = in_flight.next(), if !in_flight.is_empty() => {
                        if let Some(record) = record {
                            captured.push(record);
                        }
                    }
                    event = events.next(), if events_open => match event {
                        Some(response) => {
                            if capturer.accepts(&response) {
                                in_flight.push(capturer.read_body(Arc::clone(&page), response));
                            }
                        }
                        None => events_open = false,
                    },
                }
            }

            // Responses already delivered before the stop still count
            while let Some(Some(response)) = events.next().now_or_never() {
                if capturer.accepts(&response) {
                    in_flight.push(capturer.read_body(Arc::clone(&page), response));
                }
            }
            let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
                while let Some(record) = in_flight.next().await {
                    if let Some(record) = record {
                        captured.push(record);
                    }
                }
            })
            .await;
            if drained.is_err() {
                tracing::debug!("Gave up on response bodies still loading at teardown");
            }

            tracing::debug!("Response capture stopped with {} records", captured.len());
            let _ = result.send(captured);
        });

        Ok(handle)
    }

    fn accepts(&self, response: &ObservedResponse) -> bool {
        let accepted = self.filter.matches(&response.headers, response.status);
        if !accepted {
            tracing::trace!("Ignoring non-matching response {}", response.url);
        }
        accepted
    }

    async fn read_body(
        &self,
        page: Arc<dyn PageDriver>,
        response: ObservedResponse,
    ) -> Option<CapturedResponse> {
        let parsed = match page.response_body(&response.request_id).await {
            Ok(body) => body.parse_json(),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(body) => {
                tracing::debug!("Captured JSON response {} {}", response.status, response.url);
                Some(CapturedResponse::from_body(
                    response.url,
                    response.status,
                    body,
                    self.shape,
                ))
            }
            Err(e) => {
                tracing::debug!("Dropping response {}: {}", response.url, e);
                None
            }
        }
    }
}
