use super::CaptureHandle;
use crate::Result;
use crate::driver::PageDriver;
use futures::{FutureExt, StreamExt};
use pagescope_core::report::CapturedClickEvent;

/// Name of the host function the in-page click listener reports to
pub const CLICK_BINDING: &str = "__pagescopeCaptureClick";

const LISTENER_TEMPLATE: &str = r#"(() => {
  if (window.__BINDING__Installed) return;
  window.__BINDING__Installed = true;
  document.addEventListener('click', (event) => {
    const el = event.target;
    if (!el || el.nodeType !== 1) return;
    const cls = typeof el.className === 'string' ? el.className : (el.getAttribute('class') || '');
    const payload = {
      tag: el.tagName || '',
      id: el.id || '',
      class: cls,
      text: el.innerText || el.textContent || '',
      dataset: Object.assign({}, el.dataset || {}),
    };
    try { window.__BINDING__(JSON.stringify(payload)); } catch (_) {}
  }, true);
})();"#;

/// Records clicks the page registers, via an init script and a host binding
#[derive(Debug, Clone)]
pub struct InteractionCapturer {
    binding: String,
}

impl Default for InteractionCapturer {
    fn default() -> Self {
        Self::new(CLICK_BINDING)
    }
}

impl InteractionCapturer {
    pub fn new(binding: impl Into<String>) -> Self {
        Self {
            binding: binding.into(),
        }
    }

    /// Script installing a capture-phase click listener on the document
    pub fn init_script(&self) -> String {
        LISTENER_TEMPLATE.replace("__BINDING__", &self.binding)
    }

    /// Expose the binding and register the listener; must run before navigation
    pub async fn attach(&self, page: &dyn PageDriver) -> Result<CaptureHandle<CapturedClickEvent>> {
        let mut messages = page.expose_binding(&self.binding).await?;
        page.add_init_script(&self.init_script()).await?;

        let (handle, mut shutdown, result) = CaptureHandle::new();

        tokio::spawn(async move {
            let mut clicks = Vec::new();

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    message = messages.next() => match message {
                        Some(payload) => record(&mut clicks, &payload),
                        None => {
                            // page gone; anything it still sends is lost
                            let _ = (&mut shutdown).await;
                            break;
                        }
                    },
                }
            }

            while let Some(Some(payload)) = messages.next().now_or_never() {
                record(&mut clicks, &payload);
            }

            tracing::debug!("Click capture stopped with {} events", clicks.len());
            let _ = result.send(clicks);
        });

        Ok(handle)
    }
}

fn record(clicks: &mut Vec<CapturedClickEvent>, payload: &str) {
    match serde_json::from_str::<CapturedClickEvent>(payload) {
        Ok(click) => {
            tracing::debug!("Captured click on <{}> #{}", click.tag, click.id);
            clicks.push(click);
        }
        Err(e) => tracing::debug!("Dropping undecodable click payload: {}", e),
    }
}
