use super::show::output_pretty;
use crate::{CaptureArgs, OutputFormat};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use pagescope_browser::PageAnalyzer;
use pagescope_core::report::{AnalysisReport, AnalysisRequest, ReportWriter};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Accept `example.com` as shorthand for `https://example.com`
pub fn normalize_url(input: &str) -> Result<String> {
    let input = input.trim();
    match Url::parse(input) {
        Ok(url) => Ok(url.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let url = Url::parse(&format!("https://{}", input))
                .with_context(|| format!("Invalid URL: {}", input))?;
            Ok(url.to_string())
        }
        Err(e) => Err(e).with_context(|| format!("Invalid URL: {}", input)),
    }
}

pub fn execute(
    url: &str,
    output: Option<&Path>,
    format: OutputFormat,
    capture: &CaptureArgs,
) -> Result<()> {
    let url = normalize_url(url)?;
    let config = capture.resolve_config()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(async {
        let engine = capture.engine(&config).await?;
        let analyzer = PageAnalyzer::new(engine, config)?;

        let spinner = spinner(format, &url);
        let result = analyzer.analyze(AnalysisRequest::new(url.as_str())).await;
        spinner.finish_and_clear();

        if let Err(e) = analyzer.into_engine().shutdown().await {
            tracing::warn!("Chrome did not shut down cleanly: {}", e);
        }
        anyhow::Ok(result?)
    })?;

    if let Some(path) = output {
        ReportWriter::to_file(&report, path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    match (format, output) {
        (OutputFormat::Json, None) => println!("{}", ReportWriter::to_string(&report)?),
        (OutputFormat::Json, Some(_)) => {}
        (OutputFormat::Pretty, _) => print_summary(&report, output),
    }
    Ok(())
}

fn print_summary(report: &AnalysisReport, output: Option<&Path>) {
    output_pretty(report);
    if let Some(path) = output {
        println!("✅ Report saved to {}", path.display());
    }
}

fn spinner(format: OutputFormat, url: &str) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Analyzing {}", url));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
