// HTTP endpoint for page analysis

pub mod error;
pub mod handler;
pub mod server;

pub use error::{Error, Result};
pub use handler::AnalyzeHandler;
pub use server::AnalysisServer;
