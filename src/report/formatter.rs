//! Report derivation.
//!
//! `format_report` never fails: an analysis without usable section data
//! produces an empty report shell carrying an error note.

use crate::analysis::aggregator::{
    collect_recommendations, count_severities, section_summaries, top_issues,
};
use crate::models::{Analysis, Report, ReportSummary, SystemHealth};
use chrono::Utc;
use tracing::{debug, warn};

/// Default number of top issues in a report.
pub const DEFAULT_TOP_ISSUES: usize = 5;

/// Build the report view of `analysis`.
pub fn format_report(analysis: &Analysis, top_issue_limit: usize) -> Report {
    let record = &analysis.metadata;

    if analysis.data.as_ref().map_or(true, |d| d.is_empty()) {
        warn!("Analysis {} has no section data, returning empty report", record.id);
        let mut shell = Report::shell(
            &record.id,
            record.status,
            match &record.error {
                Some(err) => format!("Analysis has no section data: {}", err),
                None => format!("Analysis has no section data (status: {})", record.status),
            },
        );
        shell.model = record.model.clone();
        return shell;
    }

    let summary = analysis.summary();
    let report = Report {
        analysis_id: record.id.clone(),
        status: record.status,
        model: record.model.clone(),
        generated_at: Utc::now(),
        summary: ReportSummary {
            overview: summary.map(|s| s.overview.clone()).unwrap_or_default(),
            system_health: summary
                .and_then(|s| s.health.clone())
                .unwrap_or_else(SystemHealth::unknown),
            issue_count: count_severities(analysis),
        },
        top_issues: top_issues(analysis, top_issue_limit),
        sections: section_summaries(analysis),
        recommendations: collect_recommendations(analysis),
        error: None,
    };

    debug!(
        "Report for {}: {} issues, {} sections",
        report.analysis_id,
        report.summary.issue_count.total,
        report.sections.len()
    );
    report
}
