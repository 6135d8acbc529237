//! Snapshot analysis orchestration.
//!
//! The orchestrator resolves which sections to analyze, runs the
//! whole-system summary, then runs every selected section. Section steps
//! run in order, or through a bounded buffer when concurrency is above
//! one; either way outcomes come back in selection order.

use super::metrics;
use super::prompts::SummaryContext;
use super::section::{RunParams, SectionAnalyzer, SectionOutcome};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{AnalysisOptions, Depth, SUMMARY_SECTION};
use crate::store::SnapshotStore;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Focus tag that selects every section.
pub const FOCUS_ALL: &str = "All";

/// Focus tags and the sections they cover.
pub const FOCUS_AREAS: &[(&str, &[&str])] = &[
    (
        "Security",
        &[
            "Security",
            "Network",
            "RunningServices",
            "StartupPrograms",
            "WindowsUpdates",
            "Drivers",
            "RegistrySettings",
            "Browsers",
        ],
    ),
    ("Performance", &["Performance", "DiskSpace", "PerformanceData"]),
    ("Storage", &["DiskSpace", "Path"]),
    ("Network", &["Network"]),
    (
        "Software",
        &[
            "InstalledPrograms",
            "StartupPrograms",
            "PythonInstallations",
            "Browsers",
            "WindowsFeatures",
        ],
    ),
    (
        "Configuration",
        &["Environment", "Path", "RegistrySettings", "WindowsFeatures"],
    ),
    ("Services", &["RunningServices", "StartupPrograms"]),
    ("Updates", &["WindowsUpdates", "Drivers"]),
];

/// Sections covered by a focus tag, case-insensitively.
pub fn focus_sections(tag: &str) -> Option<&'static [&'static str]> {
    FOCUS_AREAS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tag.trim()))
        .map(|(_, sections)| *sections)
}

fn is_all(tag: &str) -> bool {
    tag.trim().eq_ignore_ascii_case(FOCUS_ALL)
}

/// Reject options that cannot be honored.
pub fn validate_options(options: &AnalysisOptions) -> PipelineResult<()> {
    for section in &options.sections {
        if section.trim().is_empty() {
            return Err(PipelineError::Validation(
                "section names must not be empty".to_string(),
            ));
        }
        if section == SUMMARY_SECTION {
            return Err(PipelineError::Validation(format!(
                "'{}' is reserved for the whole-system summary",
                SUMMARY_SECTION
            )));
        }
    }

    if let Some(tag) = options
        .focus
        .iter()
        .find(|tag| !is_all(tag) && focus_sections(tag).is_none())
    {
        let known: Vec<&str> = FOCUS_AREAS.iter().map(|(name, _)| *name).collect();
        return Err(PipelineError::Validation(format!(
            "unknown focus '{}', expected one of {} or {}",
            tag,
            known.join(", "),
            FOCUS_ALL
        )));
    }

    if let Some(model) = &options.model {
        if model.trim().is_empty() {
            return Err(PipelineError::Validation("model must not be empty".to_string()));
        }
    }

    Ok(())
}

/// Resolve the sections to analyze.
///
/// Explicit section names win and are used as given (duplicates
/// dropped). Otherwise focus tags pick the snapshot sections they cover,
/// in snapshot order. With neither, every snapshot section is taken.
pub fn select_sections(available: &[String], options: &AnalysisOptions) -> Vec<String> {
    if !options.sections.is_empty() {
        let mut selected: Vec<String> = Vec::new();
        for name in &options.sections {
            if !selected.contains(name) {
                selected.push(name.clone());
            }
        }
        return selected;
    }

    if options.focus.is_empty() || options.focus.iter().any(|tag| is_all(tag)) {
        return available.to_vec();
    }

    let wanted: Vec<&str> = options
        .focus
        .iter()
        .filter_map(|tag| focus_sections(tag))
        .flatten()
        .copied()
        .collect();

    available
        .iter()
        .filter(|name| wanted.iter().any(|w| w.eq_ignore_ascii_case(name)))
        .cloned()
        .collect()
}

/// Everything needed to run one analysis, resolved up front.
#[derive(Debug, Clone)]
pub struct AnalysisPlan {
    pub snapshot_id: String,
    pub available: Vec<String>,
    /// Selected snapshot sections, excluding the summary.
    pub sections: Vec<String>,
    pub metadata: Option<Value>,
    pub summary_text: Option<String>,
    pub params: RunParams,
}

impl AnalysisPlan {
    /// Keys the analysis will contain: `summary` then the sections.
    pub fn section_names(&self) -> Vec<String> {
        std::iter::once(SUMMARY_SECTION.to_string())
            .chain(self.sections.iter().cloned())
            .collect()
    }
}

/// Drives the summary and section steps for one snapshot.
#[derive(Clone)]
pub struct Orchestrator {
    snapshots: Arc<dyn SnapshotStore>,
    analyzer: SectionAnalyzer,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        analyzer: SectionAnalyzer,
        concurrency: usize,
    ) -> Self {
        Self {
            snapshots,
            analyzer,
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve the plan for `snapshot_id`.
    ///
    /// Fails with `NotFound` when the snapshot does not exist. Missing
    /// snapshot metadata or summary text only produce warnings.
    pub async fn prepare(
        &self,
        snapshot_id: &str,
        options: &AnalysisOptions,
        model: &str,
    ) -> PipelineResult<AnalysisPlan> {
        if !self.snapshots.exists(snapshot_id).await? {
            return Err(PipelineError::snapshot_not_found(snapshot_id));
        }

        let mut available = self.snapshots.list_sections(snapshot_id).await?;
        available.retain(|name| {
            let reserved = name.eq_ignore_ascii_case(SUMMARY_SECTION);
            if reserved {
                warn!(
                    "Snapshot {} has a section named '{}', which is reserved; skipping it",
                    snapshot_id, name
                );
            }
            !reserved
        });
        let sections = select_sections(&available, options);
        info!(
            "Snapshot {}: {} of {} sections selected",
            snapshot_id,
            sections.len(),
            available.len()
        );

        let metadata = self
            .snapshots
            .read_metadata(snapshot_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Snapshot metadata unavailable for {}: {}", snapshot_id, e);
                None
            });
        let summary_text = self
            .snapshots
            .read_summary_text(snapshot_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Snapshot summary unavailable for {}: {}", snapshot_id, e);
                None
            });

        Ok(AnalysisPlan {
            snapshot_id: snapshot_id.to_string(),
            available,
            sections,
            metadata,
            summary_text,
            params: RunParams {
                model: model.to_string(),
                depth: options.depth.unwrap_or(Depth::Standard),
            },
        })
    }

    /// Run the whole-system summary step.
    pub async fn run_summary(&self, plan: &AnalysisPlan) -> SectionOutcome {
        let ctx = SummaryContext {
            metadata: plan.metadata.as_ref(),
            summary_text: plan.summary_text.as_deref(),
            available_sections: &plan.available,
            depth: plan.params.depth,
            max_section_chars: self.analyzer.settings().max_section_chars,
        };
        self.analyzer.analyze_summary(&ctx, &plan.params).await
    }

    /// Run every selected section, returning outcomes in selection order.
    pub async fn run_sections(&self, plan: &AnalysisPlan) -> Vec<SectionOutcome> {
        if self.concurrency <= 1 {
            let mut outcomes = Vec::with_capacity(plan.sections.len());
            for section in &plan.sections {
                outcomes.push(self.run_section(plan, section).await);
            }
            return outcomes;
        }

        debug!("Analyzing with concurrency {}", self.concurrency);
        stream::iter(plan.sections.iter())
            .map(|section| self.run_section(plan, section))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn run_section(&self, plan: &AnalysisPlan, section: &str) -> SectionOutcome {
        let data = match self.snapshots.read_section(&plan.snapshot_id, section).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not load section {}: {}", section, e);
                json!({ "error": format!("Section data could not be loaded: {}", e) })
            }
        };

        let mut related = Vec::new();
        for name in metrics::related_sections(section) {
            if !plan.available.iter().any(|a| a == name) {
                continue;
            }
            match self.snapshots.read_section(&plan.snapshot_id, name).await {
                Ok(value) => related.push((name.to_string(), value)),
                Err(e) => debug!("Skipping related section {} for {}: {}", name, section, e),
            }
        }

        self.analyzer
            .analyze_section(section, &data, &related, &plan.params)
            .await
    }

    /// Summary then sections, in one call.
    pub async fn run(
        &self,
        snapshot_id: &str,
        options: &AnalysisOptions,
        model: &str,
    ) -> PipelineResult<Vec<SectionOutcome>> {
        let plan = self.prepare(snapshot_id, options, model).await?;
        let mut outcomes = vec![self.run_summary(&plan).await];
        outcomes.extend(self.run_sections(&plan).await);
        Ok(outcomes)
    }
}
