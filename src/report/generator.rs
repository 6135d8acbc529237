//! Markdown and JSON rendering.
//!
//! This module renders reports and comparisons for the command line.

use crate::analysis::aggregator::{generate_summary_text, group_by_severity};
use crate::models::{
    Comparison, Finding, Report, SectionComparison, SectionSummary, Severity, SeverityCounts,
    SystemHealth,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Output format for rendered documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Snapshot Analysis: {}\n\n", report.analysis_id));
    output.push_str(&generate_metadata_section(report));

    if let Some(error) = &report.error {
        output.push_str(&format!("> ⚠️ {}\n\n", error));
    }

    output.push_str(&generate_health_section(
        &report.summary.overview,
        &report.summary.system_health,
    ));
    output.push_str(&generate_counts_section(&report.summary.issue_count));
    output.push_str(&generate_top_issues_section(report));

    for section in &report.sections {
        output.push_str(&generate_section_block(section));
    }

    output.push_str(&generate_recommendations_section(&report.recommendations));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(report: &Report) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Status:** {}\n", report.status));
    if !report.model.is_empty() {
        section.push_str(&format!("- **Model Used:** `{}`\n", report.model));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Sections:** {}\n\n", report.sections.len()));

    section
}

fn generate_health_section(overview: &str, health: &SystemHealth) -> String {
    let mut section = String::new();

    section.push_str("## System Health\n\n");
    if !overview.is_empty() {
        section.push_str(overview);
        section.push_str("\n\n");
    }

    section.push_str("| Overall | Security | Performance | Stability |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        health.overall, health.security, health.performance, health.stability
    ));

    section
}

fn generate_counts_section(counts: &SeverityCounts) -> String {
    let mut section = String::new();

    section.push_str("## Issue Severity Breakdown\n\n");
    section.push_str(&format!(
        "| {} Critical | {} High | {} Medium | {} Low | {} Info | **Total** |\n",
        Severity::Critical.emoji(),
        Severity::High.emoji(),
        Severity::Medium.emoji(),
        Severity::Low.emoji(),
        Severity::Info.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} | **{}** |\n\n",
        counts.critical, counts.high, counts.medium, counts.low, counts.info, counts.total
    ));

    section
}

fn generate_top_issues_section(report: &Report) -> String {
    let mut section = String::new();

    section.push_str("## Top Issues\n\n");
    if report.top_issues.is_empty() {
        section.push_str("No issues were found. 🎉\n\n");
        return section;
    }

    for (rank, findings) in group_by_severity(&report.top_issues) {
        let label = findings
            .first()
            .map(|f| f.severity.to_string())
            .unwrap_or_else(|| rank.to_string());
        section.push_str(&format!("**{}**\n\n", label));

        for issue in report
            .top_issues
            .iter()
            .filter(|i| i.finding.severity.rank() == rank)
        {
            section.push_str(&format!(
                "- {} **{}** ({})\n",
                issue.finding.severity.emoji(),
                issue.finding.title,
                issue.section
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_finding_block(finding: &Finding) -> String {
    let mut block = format!(
        "#### {} **{}** - {}\n\n",
        finding.severity.emoji(),
        finding.severity.as_str().to_uppercase(),
        finding.title
    );

    if !finding.description.is_empty() {
        block.push_str(&format!("{}\n\n", finding.description));
    }
    if let Some(rec) = &finding.recommendation {
        block.push_str(&format!("> 💡 **Suggestion:** {}\n\n", rec));
    }

    block
}

fn generate_section_block(section: &SectionSummary) -> String {
    let mut block = format!(
        "## {} {} ({})\n\n",
        section.severity.emoji(),
        section.name,
        section.severity
    );

    if !section.overview.is_empty() {
        block.push_str(&format!("{}\n\n", section.overview));
    }
    for finding in &section.findings {
        block.push_str(&generate_finding_block(finding));
    }
    block.push_str("---\n\n");

    block
}

fn generate_recommendations_section(recommendations: &[String]) -> String {
    if recommendations.is_empty() {
        return String::new();
    }

    let mut section = String::from("## Recommendations\n\n");
    for (i, rec) in recommendations.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, rec));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    "---\n\n*Report generated by snaplens*\n".to_string()
}

fn status_icon(comparison: &SectionComparison) -> &'static str {
    use crate::models::SectionStatus::*;
    match comparison.status {
        Improved => "⬆️",
        Worsened => "⬇️",
        New => "🆕",
        Removed => "✖️",
        Changed => "🔁",
        Unchanged => "➖",
    }
}

/// Generate a Markdown comparison.
pub fn generate_markdown_comparison(comparison: &Comparison) -> String {
    let mut output = format!(
        "# Snapshot Comparison: {} → {}\n\n",
        comparison.baseline_id, comparison.current_id
    );

    if let Some(error) = &comparison.error {
        output.push_str(&format!("> ⚠️ {}\n\n", error));
        return output;
    }

    output.push_str(&format!("{}\n\n", comparison.summary.change_summary));
    output.push_str("### Baseline\n\n");
    output.push_str(&generate_summary_text(&comparison.summary.baseline_issues));
    output.push_str("\n\n### Current\n\n");
    output.push_str(&generate_summary_text(&comparison.summary.current_issues));
    output.push_str("\n\n## Sections\n\n");

    output.push_str("| Section | Status | Baseline | Current | Changes |\n");
    output.push_str("|:---|:---:|:---:|:---:|:---:|\n");
    for section in &comparison.sections {
        let severity = |s: &Option<Severity>| s.as_ref().map_or("-".to_string(), |s| s.to_string());
        output.push_str(&format!(
            "| {} | {} {} | {} | {} | {} |\n",
            section.section,
            status_icon(section),
            section.status,
            severity(&section.baseline_severity),
            severity(&section.current_severity),
            section.changes.len()
        ));
    }
    output.push('\n');

    for section in comparison.sections.iter().filter(|s| !s.changes.is_empty()) {
        output.push_str(&format!("### {}\n\n", section.section));
        for change in &section.changes {
            output.push_str(&format!("- {:?}: {}\n", change.kind, change.title));
        }
        output.push('\n');
    }

    output.push_str(&generate_footer());
    output
}

/// Serialize any view as pretty JSON.
pub fn generate_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

/// Render a report in the requested format.
pub fn render_report(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(generate_markdown_report(report)),
        OutputFormat::Json => generate_json(report),
    }
}

/// Render a comparison in the requested format.
pub fn render_comparison(comparison: &Comparison, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(generate_markdown_comparison(comparison)),
        OutputFormat::Json => generate_json(comparison),
    }
}

/// Write rendered output to a file.
pub fn write_output(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file: {}", path.display()))
}
