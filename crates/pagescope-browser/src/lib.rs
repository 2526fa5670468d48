//! Page observation over a headless browser.
//!
//! [`PageAnalyzer`] drives one isolated page per request through the
//! [`BrowserEngine`] capability traits, with [`ChromiumEngine`] as the Chrome
//! implementation.

pub mod capture;
mod chrome_finder;
mod chromium;
pub mod driver;
mod error;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
mod launcher;
mod network_capture;
mod profile;
mod session;

pub use chrome_finder::ChromeFinder;
pub use chromium::{ChromiumEngine, ChromiumPage};
pub use driver::{BrowserEngine, NavigationOutcome, ObservedResponse, PageDriver, ResponseBody};
pub use error::{Error, Result};
pub use launcher::LaunchOptions;
pub use network_capture::NetworkCapture;
pub use profile::ProfileDir;
pub use session::{PageAnalyzer, SessionState};
