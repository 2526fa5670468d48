//! Session-scoped capturers.
//!
//! Each capturer runs as its own task that exclusively owns an append-only
//! buffer. The orchestrator gets the buffer back through [`CaptureHandle`]
//! once the page has settled; nothing else can observe it in between.

mod globals;
mod interactions;
mod responses;

pub use globals::GlobalsExtractor;
pub use interactions::{CLICK_BINDING, InteractionCapturer};
pub use responses::ResponseCapturer;

use std::time::Duration;
use tokio::sync::oneshot;

/// How long a stopping capturer may spend finishing in-flight work
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Stop signal and result channel for a running capturer
pub struct CaptureHandle<T> {
    shutdown: oneshot::Sender<()>,
    result: oneshot::Receiver<Vec<T>>,
}

impl<T> CaptureHandle<T> {
    fn new() -> (Self, oneshot::Receiver<()>, oneshot::Sender<Vec<T>>) {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let (result_tx, result) = oneshot::channel();
        (Self { shutdown, result }, shutdown_rx, result_tx)
    }

    /// Stop capturing and take the accumulated records
    pub async fn finish(self) -> Vec<T> {
        let _ = self.shutdown.send(());
        match self.result.await {
            Ok(records) => records,
            Err(_) => {
                tracing::warn!("Capture task ended without returning its buffer");
                Vec::new()
            }
        }
    }
}
