use super::types::AnalysisReport;
use crate::Result;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub struct ReportWriter;

impl ReportWriter {
    /// Write a report to a file as pretty-printed JSON
    pub fn to_file(report: &AnalysisReport, path: &Path) -> Result<()> {
        tracing::debug!("Writing report to: {}", path.display());

        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, report)?;

        tracing::info!(
            "Wrote report with {} API responses to {}",
            report.api_responses.len(),
            path.display()
        );

        Ok(())
    }

    /// Convert a report to a pretty JSON string
    pub fn to_string(report: &AnalysisReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    /// Convert a report to a compact JSON string
    pub fn to_string_compact(report: &AnalysisReport) -> Result<String> {
        Ok(serde_json::to_string(report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalProbeSet;
    use crate::report::{CapturedClickEvent, GlobalSnapshot, ReportReader};

    fn sample() -> AnalysisReport {
        AnalysisReport {
            url_analyzed: "https://example.com".to_string(),
            globals: GlobalSnapshot::unavailable("https://example.com/", GlobalProbeSet::Full),
            api_responses: vec![],
            dom_events: Some(vec![CapturedClickEvent {
                tag: "A".to_string(),
                ..Default::default()
            }]),
            navigation: None,
        }
    }

    #[test]
    fn test_report_to_string() {
        let json = ReportWriter::to_string(&sample()).unwrap();
        assert!(json.contains("\"urlAnalyzed\": \"https://example.com\""));
        assert!(json.contains("\"domEvents\""));

        let compact = ReportWriter::to_string_compact(&sample()).unwrap();
        assert!(!compact.contains('\n'));
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        ReportWriter::to_file(&sample(), &path).unwrap();
        let back = ReportReader::from_file(&path).unwrap();

        assert_eq!(back, sample());
    }
}
