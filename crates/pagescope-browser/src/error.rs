use thiserror::Error;

/// Failures surfaced by a browser session.
///
/// Only [`Error::Navigation`] and [`Error::ResourceAcquisition`] end an
/// analysis with an error result; malformed bodies, navigation timeouts and
/// late click callbacks are absorbed by the capturers.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Browser unavailable: {0}")]
    ResourceAcquisition(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Malformed response body: {0}")]
    MalformedResponseBody(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] pagescope_core::Error),
}

impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

impl Error {
    /// True for the failures that terminate a request
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Navigation { .. } | Error::ResourceAcquisition(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
