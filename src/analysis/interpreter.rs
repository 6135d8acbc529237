//! Interpretation of raw model output.
//!
//! Models wrap JSON in code fences, chatter around it, or produce
//! nothing usable at all. `interpret` turns any of that into either a
//! parsed `SectionAnalysis` or a deterministic fallback; it never fails.

use crate::models::{Finding, SectionAnalysis, Severity, SystemHealth};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Expected logical shape of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Per-section finding list.
    Section,
    /// Whole-system summary with health labels.
    Summary,
}

/// Why a response could not be used.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("empty response")]
    Empty,

    #[error("no valid JSON found in response")]
    NoJson,

    #[error("response JSON is not an object")]
    NotObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),
}

/// Outcome of interpreting one response.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Parsed(SectionAnalysis),
    Fallback {
        analysis: SectionAnalysis,
        reason: String,
    },
}

impl Interpretation {
    pub fn analysis(&self) -> &SectionAnalysis {
        match self {
            Interpretation::Parsed(analysis) => analysis,
            Interpretation::Fallback { analysis, .. } => analysis,
        }
    }

    pub fn into_analysis(self) -> SectionAnalysis {
        match self {
            Interpretation::Parsed(analysis) => analysis,
            Interpretation::Fallback { analysis, .. } => analysis,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Interpretation::Fallback { .. })
    }
}

/// Fallback content for the given shape.
pub fn fallback(shape: ResponseShape, section: &str, reason: &str) -> SectionAnalysis {
    match shape {
        ResponseShape::Section => SectionAnalysis::fallback(section, reason),
        ResponseShape::Summary => SectionAnalysis::summary_fallback(reason),
    }
}

/// Interpret a raw response for `section`.
pub fn interpret(raw: &str, section: &str, shape: ResponseShape) -> Interpretation {
    match extract_json(raw).and_then(|value| to_analysis(value, section, shape)) {
        Ok(analysis) => Interpretation::Parsed(analysis),
        Err(e) => {
            warn!("Falling back for section {}: {}", section, e);
            debug!("Unusable response for {}: {}", section, raw);
            let reason = e.to_string();
            Interpretation::Fallback {
                analysis: fallback(shape, section, &reason),
                reason,
            }
        }
    }
}

/// Locate and parse the JSON payload of a response.
///
/// A fenced block wins when one is present; otherwise the whole text is
/// tried. Text without any fence markers gets one more attempt on the
/// slice between its outermost braces.
pub fn extract_json(raw: &str) -> Result<Value, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(block) = fenced_block(trimmed) {
        return serde_json::from_str(block).map_err(|_| ParseError::NoJson);
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if !trimmed.contains("```") {
        if let Some(slice) = brace_slice(trimmed) {
            if let Ok(value) = serde_json::from_str(slice) {
                return Ok(value);
            }
        }
    }

    Err(ParseError::NoJson)
}

/// Interior of the first complete ``` fence, language tag stripped.
///
/// The tag is the run of alphanumerics right after the opening marker;
/// the body may start on the same line.
fn fenced_block(text: &str) -> Option<&str> {
    const FENCE: &str = "```";

    let start = text.find(FENCE)?;
    let after_open = &text[start + FENCE.len()..];
    let tag_len = after_open
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after_open.len());

    let body = &after_open[tag_len..];
    let end = body.find(FENCE)?;
    Some(body[..end].trim())
}

fn brace_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|value| value.as_str())
        .map(|s| s.trim().to_string())
}

fn array_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|value| value.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn to_finding(value: &Value) -> Option<Finding> {
    match value {
        Value::String(title) if !title.trim().is_empty() => Some(Finding::new(
            title.trim(),
            Severity::Unrecognized("unspecified".to_string()),
            "",
        )),
        Value::Object(obj) => {
            let title = str_field(obj, &["title", "name"])
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled finding".to_string());
            let severity = str_field(obj, &["severity", "impact"])
                .map(|s| Severity::parse(&s))
                .unwrap_or_else(|| Severity::Unrecognized("unspecified".to_string()));

            Some(Finding {
                title,
                severity,
                description: str_field(obj, &["description", "details"]).unwrap_or_default(),
                recommendation: str_field(obj, &["recommendation", "fix"]),
            })
        }
        _ => None,
    }
}

fn to_recommendation(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Object(obj) => str_field(obj, &["description", "recommendation", "title"]),
        _ => None,
    }?;
    (!text.is_empty()).then_some(text)
}

fn to_analysis(
    value: Value,
    section: &str,
    shape: ResponseShape,
) -> Result<SectionAnalysis, ParseError> {
    let obj = value.as_object().ok_or(ParseError::NotObject)?;

    let health = match shape {
        ResponseShape::Section => None,
        ResponseShape::Summary => {
            let overall = str_field(obj, &["overallHealth", "overall_health"])
                .ok_or(ParseError::MissingField("overallHealth"))?;
            let label = |keys: &[&str]| str_field(obj, keys).unwrap_or_else(|| "Unknown".into());

            Some(SystemHealth {
                overall,
                security: label(&["securityHealth", "security_health"]),
                performance: label(&["performanceHealth", "performance_health"]),
                stability: label(&["stabilityHealth", "stability_health"]),
            })
        }
    };

    let severity = match (shape, str_field(obj, &["severity"])) {
        (_, Some(label)) => Severity::parse(&label),
        (ResponseShape::Summary, None) => Severity::Info,
        (ResponseShape::Section, None) => return Err(ParseError::MissingField("severity")),
    };

    Ok(SectionAnalysis {
        section: section.to_string(),
        severity,
        overview: str_field(obj, &["overview", "summary", "system_assessment"]).unwrap_or_default(),
        findings: array_field(obj, &["findings", "issues"])
            .iter()
            .filter_map(to_finding)
            .collect(),
        recommendations: array_field(obj, &["recommendations", "top_recommendations"])
            .iter()
            .filter_map(to_recommendation)
            .collect(),
        health,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTION_JSON: &str = r#"{
        "severity": "High",
        "overview": "Two drives are nearly full",
        "findings": [
            {"title": "C: almost full", "severity": "critical", "description": "3% free"},
            {"title": "D: low", "severity": "medium", "description": "12% free", "recommendation": "Clean up"}
        ],
        "recommendations": ["Free space on C:", {"description": "Archive old data"}]
    }"#;

    fn assert_section_fallback(result: &Interpretation) {
        assert!(result.is_fallback());
        let analysis = result.analysis();
        assert_eq!(analysis.severity, Severity::Info);
        assert_eq!(analysis.findings.len(), 1);
        assert_eq!(analysis.findings[0].severity, Severity::Info);
        assert_eq!(analysis.recommendations.len(), 1);
    }

    #[test]
    fn test_parses_bare_json() {
        let result = interpret(SECTION_JSON, "DiskSpace", ResponseShape::Section);
        assert!(!result.is_fallback());

        let analysis = result.into_analysis();
        assert_eq!(analysis.section, "DiskSpace");
        assert_eq!(analysis.severity, Severity::High);
        assert_eq!(analysis.findings.len(), 2);
        assert_eq!(analysis.findings[0].severity, Severity::Critical);
        assert_eq!(analysis.findings[1].recommendation.as_deref(), Some("Clean up"));
        assert_eq!(
            analysis.recommendations,
            vec!["Free space on C:", "Archive old data"]
        );
    }

    #[test]
    fn test_parses_json_fence() {
        let raw = format!("Here is my analysis:\n```json\n{}\n```\nHope it helps.", SECTION_JSON);
        let result = interpret(&raw, "DiskSpace", ResponseShape::Section);
        assert_eq!(result.analysis().severity, Severity::High);
    }

    #[test]
    fn test_parses_untagged_fence() {
        let raw = "```\n{\"severity\": \"low\", \"findings\": []}\n```";
        let result = interpret(raw, "Path", ResponseShape::Section);
        assert!(!result.is_fallback());
        assert_eq!(result.analysis().severity, Severity::Low);
    }

    #[test]
    fn test_parses_single_line_fence() {
        let raw = "```json {\"severity\": \"high\", \"findings\": []} ```";
        let result = interpret(raw, "Network", ResponseShape::Section);
        assert!(!result.is_fallback());
        assert_eq!(result.analysis().severity, Severity::High);

        let untagged = "Result: ```{\"severity\": \"low\"}``` done";
        assert_eq!(
            interpret(untagged, "Network", ResponseShape::Section)
                .analysis()
                .severity,
            Severity::Low
        );
    }

    #[test]
    fn test_parses_chatter_around_object() {
        let raw = "Sure! {\"severity\": \"good\", \"overview\": \"fine\"} Let me know.";
        let result = interpret(raw, "Path", ResponseShape::Section);
        assert_eq!(result.analysis().severity, Severity::Good);
        assert_eq!(result.analysis().overview, "fine");
    }

    #[test]
    fn test_accepts_issue_aliases() {
        let raw = r#"{"severity": "medium", "summary": "ok", "issues": [{"title": "Dup entry", "severity": "low"}]}"#;
        let analysis = interpret(raw, "Path", ResponseShape::Section).into_analysis();
        assert_eq!(analysis.overview, "ok");
        assert_eq!(analysis.findings[0].title, "Dup entry");
    }

    #[test]
    fn test_keeps_unrecognized_severity() {
        let raw = r#"{"severity": "Severe", "findings": [{"title": "x", "severity": "urgent"}]}"#;
        let analysis = interpret(raw, "Path", ResponseShape::Section).into_analysis();
        assert_eq!(analysis.severity, Severity::Unrecognized("Severe".to_string()));
        assert_eq!(analysis.findings[0].severity.rank(), 99);
    }

    #[test]
    fn test_fallback_on_empty() {
        assert_section_fallback(&interpret("", "Path", ResponseShape::Section));
        assert_section_fallback(&interpret("   \n", "Path", ResponseShape::Section));
    }

    #[test]
    fn test_fallback_on_plain_text() {
        assert_section_fallback(&interpret(
            "I could not analyze this data.",
            "Path",
            ResponseShape::Section,
        ));
    }

    #[test]
    fn test_fallback_on_missing_required_field() {
        let result = interpret(r#"{"overview": "no severity here"}"#, "Path", ResponseShape::Section);
        assert_section_fallback(&result);
        match result {
            Interpretation::Fallback { reason, .. } => assert!(reason.contains("severity")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_fallback_on_unmatched_fence() {
        let raw = "```json\n{\"severity\": \"low\"}";
        assert_section_fallback(&interpret(raw, "Path", ResponseShape::Section));
    }

    #[test]
    fn test_fallback_on_broken_fence_body() {
        let raw = "```json\n{\"severity\": \"low\",,}\n```";
        assert_section_fallback(&interpret(raw, "Path", ResponseShape::Section));
    }

    #[test]
    fn test_fallback_on_non_object() {
        assert_section_fallback(&interpret("[1, 2, 3]", "Path", ResponseShape::Section));
        assert_eq!(extract_json("42").map(|v| v.is_number()), Ok(true));
    }

    #[test]
    fn test_summary_parsing() {
        let raw = r#"{
            "overallHealth": "Fair",
            "securityHealth": "Poor",
            "severity": "high",
            "overview": "Patch backlog",
            "recommendations": ["Install updates"]
        }"#;
        let analysis = interpret(raw, "summary", ResponseShape::Summary).into_analysis();
        let health = analysis.health.unwrap();
        assert_eq!(health.overall, "Fair");
        assert_eq!(health.security, "Poor");
        assert_eq!(health.performance, "Unknown");
        assert_eq!(analysis.severity, Severity::High);
        assert_eq!(analysis.recommendations, vec!["Install updates"]);
    }

    #[test]
    fn test_summary_fallback_sets_unknown_health() {
        let result = interpret("{\"severity\": \"low\"}", "summary", ResponseShape::Summary);
        assert!(result.is_fallback());
        assert_eq!(result.analysis().health, Some(SystemHealth::unknown()));
        assert_eq!(result.analysis().severity, Severity::Info);
    }
}
