use crate::OutputFormat;
use anyhow::{Context, Result};
use console::style;
use pagescope_core::report::{AnalysisReport, NavigationStatus, ReportReader, ReportWriter};
use serde_json::Value;
use std::path::Path;

const PREVIEW_WIDTH: usize = 72;

/// Render a report saved by `analyze --output`
pub fn execute(file: &Path, format: OutputFormat) -> Result<()> {
    tracing::debug!("Reading report: {}", file.display());
    let report = ReportReader::from_file(file)
        .with_context(|| format!("Failed to read report {}", file.display()))?;

    match format {
        OutputFormat::Json => println!("{}", ReportWriter::to_string(&report)?),
        OutputFormat::Pretty => output_pretty(&report),
    }
    Ok(())
}

pub fn output_pretty(report: &AnalysisReport) {
    println!("\n{}", style("Page Analysis Report").bold().cyan());
    println!("{}", style("====================").cyan());

    println!("\n  URL:         {}", report.url_analyzed);
    println!("  Title:       {}", report.globals.title);
    println!("  Location:    {}", report.globals.location);
    if let Some(navigation) = &report.navigation {
        let outcome = match navigation.outcome {
            NavigationStatus::Settled => style("settled".to_string()).green(),
            NavigationStatus::TimedOut => style("timed out (partial capture)".to_string()).yellow(),
        };
        println!("  Navigation:  {} after {} ms", outcome, navigation.elapsed_ms);
    }

    let globals = [
        ("user", &report.globals.user),
        ("dataLayer", &report.globals.data_layer),
        ("analyticsMeta", &report.globals.analytics_meta),
    ];
    println!("\n{}", style("Globals:").bold());
    for (name, value) in globals {
        match value {
            Some(Value::Null) => println!("  {:<15} {}", name, style("null").dim()),
            Some(value) => println!("  {:<15} {}", name, preview(value)),
            None => {}
        }
    }

    println!(
        "\n{}",
        style(format!("API Responses ({}):", report.api_responses.len())).bold()
    );
    if report.api_responses.is_empty() {
        println!("  {}", style("No JSON responses captured").dim());
    }
    for response in &report.api_responses {
        let status = if response.status < 400 {
            style(response.status).green()
        } else {
            style(response.status).red()
        };
        let detail = match (&response.flattened_body, &response.raw_body) {
            (Some(flat), _) => format!("{} fields", flat.len()),
            (None, Some(raw)) => preview(raw),
            (None, None) => String::new(),
        };
        println!("  {} {} {}", status, response.url, style(detail).dim());
    }

    if let Some(events) = &report.dom_events {
        println!("\n{}", style(format!("DOM Events ({}):", events.len())).bold());
        for event in events {
            let mut selector = event.tag.to_lowercase();
            if !event.id.is_empty() {
                selector.push('#');
                selector.push_str(&event.id);
            }
            for class in event.class.split_whitespace() {
                selector.push('.');
                selector.push_str(class);
            }
            println!(
                "  {} {}",
                style(selector).yellow(),
                style(truncate(event.text.trim(), PREVIEW_WIDTH)).dim()
            );
        }
    }

    println!();
}

fn preview(value: &Value) -> String {
    truncate(&value.to_string(), PREVIEW_WIDTH)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
