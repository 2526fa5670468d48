use super::types::AnalysisReport;
use crate::Result;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub struct ReportReader;

impl ReportReader {
    /// Read and parse a saved report from the given path
    pub fn from_file(path: &Path) -> Result<AnalysisReport> {
        tracing::debug!("Reading report from: {}", path.display());

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let report: AnalysisReport = serde_json::from_reader(reader)?;

        tracing::debug!(
            "Parsed report for {} with {} API responses",
            report.url_analyzed,
            report.api_responses.len()
        );

        Ok(report)
    }

    /// Parse a report from a JSON string
    pub fn from_str(content: &str) -> Result<AnalysisReport> {
        Ok(serde_json::from_str(content)?)
    }
}
