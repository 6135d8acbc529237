//! Structural comparison of two analyses.
//!
//! Findings are matched by title within a section. Comparison never
//! fails: missing data yields a degraded `Comparison` with an error note.

use super::aggregator::count_severities;
use crate::models::{
    Analysis, Change, ChangeBuckets, ChangeKind, Comparison, ComparisonSummary, Finding,
    SectionComparison, SectionEntry, SectionStatus, Severity, SeverityCounts,
};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Severity and findings of a stored entry. Unparsed entries have none.
fn view(entry: &SectionEntry) -> (Option<&Severity>, &[Finding]) {
    match entry {
        SectionEntry::Analysis(analysis) => (Some(&analysis.severity), &analysis.findings),
        SectionEntry::Unparsed(_) => (None, &[]),
    }
}

/// Titles in first-seen order, each mapped to its last severity.
fn index_findings(findings: &[Finding]) -> (Vec<&str>, HashMap<&str, &Severity>) {
    let mut order = Vec::new();
    let mut by_title = HashMap::new();

    for finding in findings {
        let title = finding.title.as_str();
        if by_title.insert(title, &finding.severity).is_none() {
            order.push(title);
        }
    }

    (order, by_title)
}

/// Compare one section across two analyses.
pub fn compare_section(
    name: &str,
    baseline: Option<&SectionEntry>,
    current: Option<&SectionEntry>,
) -> SectionComparison {
    let (baseline, current) = match (baseline, current) {
        (None, None) => {
            return SectionComparison {
                section: name.to_string(),
                status: SectionStatus::Unchanged,
                baseline_severity: None,
                current_severity: None,
                changes: Vec::new(),
            }
        }
        (None, Some(current)) => {
            return SectionComparison {
                section: name.to_string(),
                status: SectionStatus::New,
                baseline_severity: None,
                current_severity: view(current).0.cloned(),
                changes: Vec::new(),
            }
        }
        (Some(baseline), None) => {
            return SectionComparison {
                section: name.to_string(),
                status: SectionStatus::Removed,
                baseline_severity: view(baseline).0.cloned(),
                current_severity: None,
                changes: Vec::new(),
            }
        }
        (Some(baseline), Some(current)) => (view(baseline), view(current)),
    };

    let (base_order, base_index) = index_findings(baseline.1);
    let (cur_order, cur_index) = index_findings(current.1);
    let mut changes = Vec::new();

    for title in &base_order {
        if !cur_index.contains_key(title) {
            changes.push(Change {
                kind: ChangeKind::Resolved,
                title: title.to_string(),
                baseline_severity: Some(base_index[title].clone()),
                current_severity: None,
            });
        }
    }

    for title in &cur_order {
        if !base_index.contains_key(title) {
            changes.push(Change {
                kind: ChangeKind::New,
                title: title.to_string(),
                baseline_severity: None,
                current_severity: Some(cur_index[title].clone()),
            });
        }
    }

    for title in &base_order {
        let (Some(before), Some(after)) = (base_index.get(title), cur_index.get(title)) else {
            continue;
        };
        let kind = match after.rank().cmp(&before.rank()) {
            Ordering::Less => ChangeKind::Worsened,
            Ordering::Greater => ChangeKind::Improved,
            // Unrecognized labels all share one rank and carry no order.
            Ordering::Equal => continue,
        };
        changes.push(Change {
            kind,
            title: title.to_string(),
            baseline_severity: Some((*before).clone()),
            current_severity: Some((*after).clone()),
        });
    }

    let rank = |severity: Option<&Severity>| severity.map_or(Severity::Info.rank(), Severity::rank);
    let status = if changes.is_empty() {
        SectionStatus::Unchanged
    } else {
        match rank(current.0).cmp(&rank(baseline.0)) {
            Ordering::Less => SectionStatus::Worsened,
            Ordering::Greater => SectionStatus::Improved,
            Ordering::Equal => SectionStatus::Changed,
        }
    };

    SectionComparison {
        section: name.to_string(),
        status,
        baseline_severity: baseline.0.cloned(),
        current_severity: current.0.cloned(),
        changes,
    }
}

/// Union of section names, baseline order first.
fn default_sections(baseline: &Analysis, current: &Analysis) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for (name, _) in baseline
        .ordered_entries()
        .into_iter()
        .chain(current.ordered_entries())
    {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    names
}

/// Group section names by status.
pub fn bucket(sections: &[SectionComparison]) -> ChangeBuckets {
    let mut buckets = ChangeBuckets::default();

    for comparison in sections {
        let target = match comparison.status {
            SectionStatus::Improved => &mut buckets.improved,
            SectionStatus::Worsened => &mut buckets.worsened,
            SectionStatus::Unchanged => &mut buckets.unchanged,
            SectionStatus::Changed => &mut buckets.changed,
            SectionStatus::New => &mut buckets.new,
            SectionStatus::Removed => &mut buckets.resolved,
        };
        target.push(comparison.section.clone());
    }

    buckets
}

/// One-line description of the issue count delta.
pub fn change_summary(baseline: &SeverityCounts, current: &SeverityCounts) -> String {
    let delta = |before: usize, after: usize| after as i64 - before as i64;

    format!(
        "Net change: {:+} issues ({} -> {}); critical {:+}, high {:+}, medium {:+}, low {:+}",
        delta(baseline.total, current.total),
        baseline.total,
        current.total,
        delta(baseline.critical, current.critical),
        delta(baseline.high, current.high),
        delta(baseline.medium, current.medium),
        delta(baseline.low, current.low),
    )
}

/// Compare two analyses, optionally limited to `sections`.
pub fn compare(baseline: &Analysis, current: &Analysis, sections: Option<&[String]>) -> Comparison {
    let (Some(base_data), Some(cur_data)) = (&baseline.data, &current.data) else {
        let missing = if baseline.data.is_none() {
            baseline.id()
        } else {
            current.id()
        };
        warn!("Cannot compare: analysis {} has no section data", missing);
        return Comparison::degraded(
            baseline.id(),
            current.id(),
            format!("Analysis {} has no section data", missing),
        );
    };

    let names = match sections {
        Some(list) if !list.is_empty() => list.to_vec(),
        _ => default_sections(baseline, current),
    };
    debug!(
        "Comparing {} against {} over {} sections",
        current.id(),
        baseline.id(),
        names.len()
    );

    let compared: Vec<SectionComparison> = names
        .iter()
        .map(|name| compare_section(name, base_data.get(name), cur_data.get(name)))
        .collect();

    let baseline_issues = count_severities(baseline);
    let current_issues = count_severities(current);

    Comparison {
        baseline_id: baseline.id().to_string(),
        current_id: current.id().to_string(),
        generated_at: Utc::now(),
        changes: bucket(&compared),
        summary: ComparisonSummary {
            change_summary: change_summary(&baseline_issues, &current_issues),
            baseline_issues,
            current_issues,
        },
        sections: compared,
        error: None,
    }
}
