//! Data models for snapshot analysis.
//!
//! This module contains the core data structures shared across the
//! pipeline: severities, findings, per-section analyses, the persisted
//! analysis record, and the derived report and comparison views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Key of the synthetic whole-system section.
pub const SUMMARY_SECTION: &str = "summary";

/// Rank given to severities outside the known set.
pub const UNRECOGNIZED_RANK: u8 = 99;

/// Severity of a finding or of a whole section.
///
/// Parsing is case-insensitive. Values outside the six known levels are
/// kept verbatim in `Unrecognized` so they are never promoted to a known
/// level; they only sort after everything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Immediate action required
    Critical,
    /// Serious problem, fix soon
    High,
    /// Worth fixing
    Medium,
    /// Minor
    Low,
    /// Informational only
    Info,
    /// Explicitly healthy
    Good,
    /// Anything the model invented
    Unrecognized(String),
}

impl Severity {
    /// The six known severities, most urgent first.
    pub const KNOWN: [Severity; 6] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
        Severity::Good,
    ];

    /// Parse a severity label, case-insensitively.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            "info" => Severity::Info,
            "good" => Severity::Good,
            _ => Severity::Unrecognized(label.trim().to_string()),
        }
    }

    /// Urgency rank; lower is more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
            Severity::Good => 5,
            Severity::Unrecognized(_) => UNRECOGNIZED_RANK,
        }
    }

    /// Whether this is one of the six known levels.
    pub fn is_known(&self) -> bool {
        !matches!(self, Severity::Unrecognized(_))
    }

    /// Lowercase wire label.
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
            Severity::Good => "good",
            Severity::Unrecognized(label) => label,
        }
    }

    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Critical => "🔴",
            Severity::High => "🟠",
            Severity::Medium => "🟡",
            Severity::Low => "🟢",
            Severity::Info => "🔵",
            Severity::Good => "✅",
            Severity::Unrecognized(_) => "⚪",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "Critical"),
            Severity::High => write!(f, "High"),
            Severity::Medium => write!(f, "Medium"),
            Severity::Low => write!(f, "Low"),
            Severity::Info => write!(f, "Info"),
            Severity::Good => write!(f, "Good"),
            Severity::Unrecognized(label) => write!(f, "{}", label),
        }
    }
}

impl From<&str> for Severity {
    fn from(s: &str) -> Self {
        Severity::parse(s)
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Info
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Severity::parse(&label))
    }
}

/// A single flagged observation within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Short title; the natural key when comparing analyses.
    pub title: String,
    /// Severity of the finding.
    pub severity: Severity,
    /// Detailed explanation.
    #[serde(default)]
    pub description: String,
    /// Suggested action, when the model gave one per finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl Finding {
    pub fn new(title: impl Into<String>, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            severity,
            description: description.into(),
            recommendation: None,
        }
    }
}

/// Health labels of the whole-system assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub overall: String,
    pub security: String,
    pub performance: String,
    pub stability: String,
}

impl SystemHealth {
    /// Every label set to `Unknown`.
    pub fn unknown() -> Self {
        Self {
            overall: "Unknown".to_string(),
            security: "Unknown".to_string(),
            performance: "Unknown".to_string(),
            stability: "Unknown".to_string(),
        }
    }
}

impl Default for SystemHealth {
    fn default() -> Self {
        Self::unknown()
    }
}

/// The assessment of one snapshot section (or of the whole system).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionAnalysis {
    pub section: String,
    pub severity: Severity,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Only set on the whole-system summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<SystemHealth>,
}

impl SectionAnalysis {
    /// Deterministic stand-in used when a section could not be analyzed.
    pub fn fallback(section: &str, reason: &str) -> Self {
        Self {
            section: section.to_string(),
            severity: Severity::Info,
            overview: format!("Automated analysis of '{}' could not be completed.", section),
            findings: vec![Finding::new(
                "Analysis could not be completed",
                Severity::Info,
                format!(
                    "The '{}' section could not be analyzed automatically: {}",
                    section, reason
                ),
            )],
            recommendations: vec![
                "Review this section manually or re-run the analysis.".to_string(),
            ],
            health: None,
        }
    }

    /// Deterministic stand-in for the whole-system summary.
    pub fn summary_fallback(reason: &str) -> Self {
        Self {
            section: SUMMARY_SECTION.to_string(),
            severity: Severity::Info,
            overview: format!("System summary could not be generated: {}", reason),
            findings: Vec::new(),
            recommendations: Vec::new(),
            health: Some(SystemHealth::unknown()),
        }
    }

    /// Whether this is the synthetic whole-system entry.
    pub fn is_summary(&self) -> bool {
        self.section == SUMMARY_SECTION
    }
}

/// Audit record of one exchange with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmInteraction {
    pub section: String,
    pub prompt: String,
    /// Raw model text; absent when the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Failure message in place of a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    /// Usage counters exactly as the server returned them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Value>,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Lifecycle state of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Processing,
    Complete,
    Error,
    /// Metadata missing or unreadable.
    Unknown,
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStatus::Processing => write!(f, "processing"),
            AnalysisStatus::Complete => write!(f, "complete"),
            AnalysisStatus::Error => write!(f, "error"),
            AnalysisStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// How thoroughly sections are examined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Basic,
    #[default]
    Standard,
    Detailed,
}

impl Depth {
    /// Scale applied to the section data truncation limit.
    pub fn data_budget(&self, base_chars: usize) -> usize {
        match self {
            Depth::Basic => base_chars / 2,
            Depth::Standard => base_chars,
            Depth::Detailed => base_chars * 2,
        }
    }

    /// Upper bound on findings requested from the model.
    pub fn max_findings(&self) -> usize {
        match self {
            Depth::Basic => 3,
            Depth::Standard => 6,
            Depth::Detailed => 12,
        }
    }
}

impl FromStr for Depth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" | "quick" => Ok(Depth::Basic),
            "standard" | "normal" => Ok(Depth::Standard),
            "detailed" | "deep" => Ok(Depth::Detailed),
            other => Err(format!(
                "unknown depth '{}', expected basic, standard or detailed",
                other
            )),
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Depth::Basic => write!(f, "basic"),
            Depth::Standard => write!(f, "standard"),
            Depth::Detailed => write!(f, "detailed"),
        }
    }
}

/// Options accepted by `create_analysis`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub focus: Vec<String>,
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default)]
    pub depth: Option<Depth>,
}

/// Persisted metadata of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// Snapshot id the analysis was produced from.
    pub id: String,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub model: String,
    /// Analyzed section names, `summary` first.
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<Vec<String>>,
    #[serde(default)]
    pub depth: Depth,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisRecord {
    /// A fresh record in `processing` state.
    pub fn processing(id: &str, model: &str, options: &AnalysisOptions) -> Self {
        Self {
            id: id.to_string(),
            status: AnalysisStatus::Processing,
            model: model.to_string(),
            sections: Vec::new(),
            focus: if options.focus.is_empty() {
                None
            } else {
                Some(options.focus.clone())
            },
            depth: options.depth.unwrap_or_default(),
            started_at: Some(Utc::now()),
            completed_at: None,
            duration_ms: None,
            error: None,
        }
    }

    /// Placeholder for an analysis whose metadata cannot be read.
    pub fn minimal(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: AnalysisStatus::Unknown,
            model: String::new(),
            sections: Vec::new(),
            focus: None,
            depth: Depth::default(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
            error: None,
        }
    }
}

/// A stored section output.
///
/// Anything that does not deserialize as a `SectionAnalysis` is kept as
/// raw JSON so a partially corrupt analysis can still be listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionEntry {
    Analysis(SectionAnalysis),
    Unparsed(Value),
}

impl SectionEntry {
    pub fn as_analysis(&self) -> Option<&SectionAnalysis> {
        match self {
            SectionEntry::Analysis(analysis) => Some(analysis),
            SectionEntry::Unparsed(_) => None,
        }
    }
}

/// An analysis as returned by `get_analysis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub metadata: AnalysisRecord,
    /// Section outputs keyed by section name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, SectionEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_interactions: Option<BTreeMap<String, LlmInteraction>>,
}

impl Analysis {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Section outputs in analysis order: the recorded section list first,
    /// then any stored entries the record does not mention, by name.
    pub fn ordered_entries(&self) -> Vec<(&str, &SectionEntry)> {
        let Some(data) = &self.data else {
            return Vec::new();
        };

        let mut ordered: Vec<(&str, &SectionEntry)> = self
            .metadata
            .sections
            .iter()
            .filter_map(|name| data.get_key_value(name.as_str()))
            .map(|(name, entry)| (name.as_str(), entry))
            .collect();

        for (name, entry) in data {
            if !self.metadata.sections.iter().any(|s| s == name) {
                ordered.push((name.as_str(), entry));
            }
        }

        ordered
    }

    /// Parsed per-section analyses, excluding the summary, in order.
    pub fn section_analyses(&self) -> Vec<&SectionAnalysis> {
        self.ordered_entries()
            .into_iter()
            .filter(|(name, _)| *name != SUMMARY_SECTION)
            .filter_map(|(_, entry)| entry.as_analysis())
            .collect()
    }

    /// The whole-system summary, if present and well-formed.
    pub fn summary(&self) -> Option<&SectionAnalysis> {
        self.data
            .as_ref()?
            .get(SUMMARY_SECTION)
            .and_then(SectionEntry::as_analysis)
    }
}

/// Result of `create_analysis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResult {
    pub success: bool,
    pub id: String,
    pub duration_ms: u64,
    pub sections: Vec<String>,
}

/// Result of `delete_analysis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub success: bool,
    pub id: String,
}

/// Per-severity finding counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCounts {
    /// Findings from critical through info. `good` and unrecognized
    /// severities are not issues and stay out of the total.
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub good: usize,
}

impl SeverityCounts {
    /// Tally findings into the known buckets.
    pub fn from_findings<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> Self {
        let mut counts = Self::default();

        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
                Severity::Good => counts.good += 1,
                Severity::Unrecognized(_) => {}
            }
        }

        counts.total = counts.critical + counts.high + counts.medium + counts.low + counts.info;
        counts
    }
}

/// Whole-analysis summary block of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub overview: String,
    pub system_health: SystemHealth,
    pub issue_count: SeverityCounts,
}

/// A finding tagged with the section it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopIssue {
    pub section: String,
    #[serde(flatten)]
    pub finding: Finding,
}

/// Projection of one section for a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub name: String,
    pub severity: Severity,
    pub overview: String,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<String>,
}

/// Prioritized, human-oriented view of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub analysis_id: String,
    pub status: AnalysisStatus,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub top_issues: Vec<TopIssue>,
    pub sections: Vec<SectionSummary>,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    /// An empty report carrying an error note.
    pub fn shell(analysis_id: &str, status: AnalysisStatus, error: impl Into<String>) -> Self {
        Self {
            analysis_id: analysis_id.to_string(),
            status,
            model: String::new(),
            generated_at: Utc::now(),
            summary: ReportSummary::default(),
            top_issues: Vec::new(),
            sections: Vec::new(),
            recommendations: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Status of a section between two analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStatus {
    New,
    Removed,
    Unchanged,
    Changed,
    Improved,
    Worsened,
}

impl fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SectionStatus::New => "new",
            SectionStatus::Removed => "removed",
            SectionStatus::Unchanged => "unchanged",
            SectionStatus::Changed => "changed",
            SectionStatus::Improved => "improved",
            SectionStatus::Worsened => "worsened",
        };
        write!(f, "{}", label)
    }
}

/// Kind of a finding-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Resolved,
    Improved,
    Worsened,
}

/// One finding-level difference within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub kind: ChangeKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_severity: Option<Severity>,
}

/// Comparison of one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionComparison {
    pub section: String,
    pub status: SectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_severity: Option<Severity>,
    pub changes: Vec<Change>,
}

/// Section names grouped by comparison outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBuckets {
    pub improved: Vec<String>,
    pub worsened: Vec<String>,
    pub unchanged: Vec<String>,
    /// Same section severity, different findings.
    pub changed: Vec<String>,
    pub new: Vec<String>,
    pub resolved: Vec<String>,
}

/// Aggregate issue counts of both sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub baseline_issues: SeverityCounts,
    pub current_issues: SeverityCounts,
    pub change_summary: String,
}

/// Structural diff between two analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub baseline_id: String,
    pub current_id: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<SectionComparison>,
    pub changes: ChangeBuckets,
    pub summary: ComparisonSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Comparison {
    /// An empty comparison carrying an error note.
    pub fn degraded(baseline_id: &str, current_id: &str, error: impl Into<String>) -> Self {
        Self {
            baseline_id: baseline_id.to_string(),
            current_id: current_id.to_string(),
            generated_at: Utc::now(),
            sections: Vec::new(),
            changes: ChangeBuckets::default(),
            summary: ComparisonSummary::default(),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_rank_order() {
        let ranks: Vec<u8> = Severity::KNOWN.iter().map(Severity::rank).collect();
        assert!(ranks.windows(2).all(|w| w[0] < w[1]));

        let odd = Severity::parse("catastrophic");
        assert!(Severity::KNOWN.iter().all(|s| s.rank() < odd.rank()));
        assert_eq!(odd.rank(), UNRECOGNIZED_RANK);
    }

    #[test]
    fn test_severity_parse_is_case_insensitive() {
        assert_eq!(Severity::parse("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::parse(" High "), Severity::High);
        assert_eq!(Severity::from("Good"), Severity::Good);
        assert_eq!(
            Severity::parse("Severe"),
            Severity::Unrecognized("Severe".to_string())
        );
    }

    #[test]
    fn test_severity_serde_keeps_unrecognized_label() {
        let json = serde_json::to_string(&Severity::Unrecognized("urgent".into())).unwrap();
        assert_eq!(json, "\"urgent\"");

        let parsed: Severity = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(parsed, Severity::Medium);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"medium\"");
    }

    #[test]
    fn test_severity_counts_excludes_good_and_unrecognized_from_total() {
        let findings = vec![
            Finding::new("a", Severity::Critical, ""),
            Finding::new("b", Severity::High, ""),
            Finding::new("c", Severity::Info, ""),
            Finding::new("d", Severity::Good, ""),
            Finding::new("e", Severity::parse("weird"), ""),
        ];

        let counts = SeverityCounts::from_findings(&findings);
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.high, 1);
        assert_eq!(counts.info, 1);
        assert_eq!(counts.good, 1);
        assert_eq!(counts.total, 3);
        assert_eq!(
            counts.total,
            counts.critical + counts.high + counts.medium + counts.low + counts.info
        );
    }

    #[test]
    fn test_section_fallback_shape() {
        let fallback = SectionAnalysis::fallback("DiskSpace", "timed out");
        assert_eq!(fallback.severity, Severity::Info);
        assert_eq!(fallback.findings.len(), 1);
        assert_eq!(fallback.recommendations.len(), 1);
        assert!(fallback.findings[0].description.contains("timed out"));

        let summary = SectionAnalysis::summary_fallback("no model");
        assert!(summary.is_summary());
        assert_eq!(summary.health, Some(SystemHealth::unknown()));
    }

    #[test]
    fn test_section_entry_untagged_keeps_unparsed_json() {
        let entry: SectionEntry = serde_json::from_str(r#"{"unexpected": true}"#).unwrap();
        assert!(entry.as_analysis().is_none());

        let entry: SectionEntry =
            serde_json::from_str(r#"{"section": "Path", "severity": "low"}"#).unwrap();
        assert_eq!(entry.as_analysis().map(|a| a.severity.clone()), Some(Severity::Low));
    }

    #[test]
    fn test_ordered_entries_follow_record_order() {
        let mut record = AnalysisRecord::minimal("s1");
        record.sections = vec!["summary".into(), "Path".into(), "DiskSpace".into()];

        let mut data = BTreeMap::new();
        for name in ["DiskSpace", "Path", "summary", "Extra"] {
            data.insert(
                name.to_string(),
                SectionEntry::Analysis(SectionAnalysis::fallback(name, "x")),
            );
        }

        let analysis = Analysis {
            metadata: record,
            data: Some(data),
            llm_interactions: None,
        };

        let names: Vec<&str> = analysis.ordered_entries().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["summary", "Path", "DiskSpace", "Extra"]);

        let sections: Vec<&str> = analysis
            .section_analyses()
            .iter()
            .map(|s| s.section.as_str())
            .collect();
        assert_eq!(sections, vec!["Path", "DiskSpace", "Extra"]);
    }

    #[test]
    fn test_depth_parse() {
        assert_eq!("Detailed".parse::<Depth>(), Ok(Depth::Detailed));
        assert_eq!("quick".parse::<Depth>(), Ok(Depth::Basic));
        assert!("exhaustive".parse::<Depth>().is_err());
        assert_eq!(Depth::Basic.data_budget(10_000), 5_000);
    }
}
