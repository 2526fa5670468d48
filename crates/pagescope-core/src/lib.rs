pub mod config;
pub mod error;
pub mod filter;
pub mod flatten;
pub mod report;

pub use config::{CaptureConfig, ConfigOverrides, NavigationWaitPolicy, Profile};
pub use error::{Error, Result};
