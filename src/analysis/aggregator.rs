//! Finding aggregation and statistics.
//!
//! This module provides utilities for collecting findings across the
//! sections of an analysis and computing summary statistics.

use crate::models::{Analysis, Finding, SectionSummary, Severity, SeverityCounts, TopIssue};
use std::collections::{BTreeMap, HashSet};

/// Collect every section finding, tagged with its section, in analysis order.
pub fn aggregate_findings(analysis: &Analysis) -> Vec<TopIssue> {
    analysis
        .section_analyses()
        .into_iter()
        .flat_map(|section| {
            section.findings.iter().map(|finding| TopIssue {
                section: section.section.clone(),
                finding: finding.clone(),
            })
        })
        .collect()
}

/// Sort issues most urgent first. The sort is stable, so equal
/// severities keep their section order.
pub fn sort_by_severity(issues: &mut [TopIssue]) {
    issues.sort_by_key(|issue| issue.finding.severity.rank());
}

/// Get the `n` most urgent findings.
pub fn top_issues(analysis: &Analysis, n: usize) -> Vec<TopIssue> {
    let mut issues = aggregate_findings(analysis);
    sort_by_severity(&mut issues);
    issues.truncate(n);
    issues
}

/// Count section findings by severity. The summary entry is not counted.
pub fn count_severities(analysis: &Analysis) -> SeverityCounts {
    SeverityCounts::from_findings(
        analysis
            .section_analyses()
            .into_iter()
            .flat_map(|section| section.findings.iter()),
    )
}

/// Group findings by severity label.
pub fn group_by_severity(issues: &[TopIssue]) -> BTreeMap<u8, Vec<&Finding>> {
    let mut grouped: BTreeMap<u8, Vec<&Finding>> = BTreeMap::new();

    for issue in issues {
        grouped
            .entry(issue.finding.severity.rank())
            .or_default()
            .push(&issue.finding);
    }

    grouped
}

/// Per-section projections, most severe section first.
pub fn section_summaries(analysis: &Analysis) -> Vec<SectionSummary> {
    let mut summaries: Vec<SectionSummary> = analysis
        .section_analyses()
        .into_iter()
        .map(|section| SectionSummary {
            name: section.section.clone(),
            severity: section.severity.clone(),
            overview: section.overview.clone(),
            findings: section.findings.clone(),
            recommendations: section.recommendations.clone(),
        })
        .collect();

    summaries.sort_by_key(|s| s.severity.rank());
    summaries
}

/// Recommendations from the summary and then every section, deduplicated.
///
/// Two entries are duplicates when they match after trimming and
/// lowercasing; the first occurrence wins.
pub fn collect_recommendations(analysis: &Analysis) -> Vec<String> {
    let summary = analysis.summary().into_iter();
    let sections = analysis.section_analyses().into_iter();

    let mut seen = HashSet::new();
    summary
        .chain(sections)
        .flat_map(|section| section.recommendations.iter())
        .map(|rec| rec.trim())
        .filter(|rec| !rec.is_empty())
        .filter(|rec| seen.insert(rec.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Generate a text summary of issue statistics.
pub fn generate_summary_text(counts: &SeverityCounts) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Total Issues: {}", counts.total));
    for (severity, count) in [
        (Severity::Critical, counts.critical),
        (Severity::High, counts.high),
        (Severity::Medium, counts.medium),
        (Severity::Low, counts.low),
        (Severity::Info, counts.info),
    ] {
        lines.push(format!("- {} {}: {}", severity.emoji(), severity, count));
    }

    if counts.good > 0 {
        lines.push(format!(
            "- {} Healthy checks: {}",
            Severity::Good.emoji(),
            counts.good
        ));
    }

    lines.join("\n")
}
