//! Prompt construction.
//!
//! Every prompt embeds a section-specific checklist, the (truncated)
//! section data, and the exact JSON shape the interpreter expects back.

use super::metrics;
use crate::models::Depth;
use serde_json::Value;

/// Marker appended to truncated section data.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

const SECTION_SCHEMA: &str = r#"{
  "severity": "critical|high|medium|low|info|good",
  "overview": "One or two sentence assessment of this section",
  "findings": [
    {
      "title": "Short name of the finding",
      "severity": "critical|high|medium|low|info|good",
      "description": "What was observed and why it matters",
      "recommendation": "Concrete action to take"
    }
  ],
  "recommendations": ["Prioritized action, most important first"]
}"#;

const SUMMARY_SCHEMA: &str = r#"{
  "overallHealth": "Excellent|Good|Fair|Poor|Critical",
  "securityHealth": "Excellent|Good|Fair|Poor|Critical",
  "performanceHealth": "Excellent|Good|Fair|Poor|Critical",
  "stabilityHealth": "Excellent|Good|Fair|Poor|Critical",
  "severity": "critical|high|medium|low|info|good",
  "overview": "Short assessment of the whole system",
  "recommendations": ["Top system-wide actions, most important first"]
}"#;

/// Review checklist for a section.
pub fn checklist(section: &str) -> &'static [&'static str] {
    match section {
        "Path" => &[
            "Entries pointing at directories that do not exist",
            "Duplicate entries",
            "User-writable directories placed before system directories",
            "Unusual or suspicious entries",
        ],
        "InstalledPrograms" => &[
            "Outdated software with known security exposure",
            "Bloatware or potentially unwanted programs",
            "Redundant or conflicting applications",
            "Missing security or maintenance tooling",
        ],
        "StartupPrograms" => &[
            "Entries that slow down boot",
            "Unrecognized or suspicious autoruns",
            "Applications that do not need to start with the system",
        ],
        "RunningServices" => &[
            "Services that can safely be disabled",
            "Suspicious or unknown services",
            "Expected services that are stopped",
            "Services with heavy resource usage",
        ],
        "DiskSpace" => &[
            "Drives with low free space",
            "Cleanup opportunities",
            "Unusual partition layouts",
        ],
        "PerformanceData" => &[
            "CPU bottlenecks",
            "Memory pressure or leaks",
            "Resource-hungry processes",
            "Whether a hardware upgrade is warranted",
        ],
        "Network" => &[
            "Insecure adapter settings",
            "Unusual connections or listening ports",
            "DNS configuration problems",
            "Adapter performance issues",
        ],
        "Environment" => &[
            "Variables that leak secrets or weaken security",
            "Conflicting or redundant variables",
            "Missing variables that tooling expects",
        ],
        "WindowsFeatures" => &[
            "Enabled features that are not needed",
            "Security features that should be enabled",
            "Problematic feature combinations",
        ],
        "RegistrySettings" => &[
            "Settings that weaken security",
            "Settings that hurt performance",
            "Inconsistent or unusual values",
        ],
        "WindowsUpdates" => &[
            "Missing security updates",
            "Failed installations",
            "Update configuration gaps",
        ],
        "Drivers" => &[
            "Outdated drivers",
            "Unsigned drivers",
            "Unstable or conflicting drivers",
        ],
        "PythonInstallations" => &[
            "Multiple conflicting interpreters",
            "End-of-life Python versions",
            "PATH ordering problems between installations",
        ],
        "Browsers" => &[
            "Outdated browsers",
            "Suspicious or excessive extensions",
            "Weak security configuration",
        ],
        _ => &[
            "Potential issues or security risks",
            "Optimization opportunities",
            "Unusual or suspicious configuration",
        ],
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Prompt for one snapshot section.
///
/// `related` holds data of other sections that give context to this one.
pub fn section_prompt(
    section: &str,
    data: &Value,
    related: &[(String, Value)],
    depth: Depth,
    max_section_chars: usize,
) -> String {
    let mut prompt = format!(
        "You are analyzing the '{}' section of a Windows system snapshot.\n\nReview for:\n",
        section
    );

    for (i, item) in checklist(section).iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, item));
    }

    let observations = metrics::observations(section, data);
    if !observations.is_empty() {
        prompt.push_str("\nPre-computed observations:\n");
        for line in observations {
            prompt.push_str(&format!("- {}\n", line));
        }
    }

    let context = metrics::related_context(related);
    if !context.is_empty() {
        prompt.push_str("\nRelated system context:\n");
        for line in context {
            prompt.push_str(&format!("- {}\n", line));
        }
    }

    let raw = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    prompt.push_str(&format!(
        "\nSection data:\n```json\n{}\n```\n\nReport at most {} findings. \
         Respond with JSON in exactly this shape:\n{}\n\n\
         Respond ONLY with the JSON object, no other text.\n",
        truncate(&raw, depth.data_budget(max_section_chars)),
        depth.max_findings(),
        SECTION_SCHEMA
    ));

    prompt
}

/// Inputs to the whole-system summary prompt.
#[derive(Debug, Clone, Copy)]
pub struct SummaryContext<'a> {
    pub metadata: Option<&'a Value>,
    pub summary_text: Option<&'a str>,
    pub available_sections: &'a [String],
    pub depth: Depth,
    pub max_section_chars: usize,
}

/// Prompt for the whole-system summary.
pub fn summary_prompt(ctx: &SummaryContext<'_>) -> String {
    let mut prompt =
        String::from("You are assessing the overall health of a Windows system from a snapshot.\n\n");

    if let Some(meta) = ctx.metadata {
        for (label, key) in [("Computer", "ComputerName"), ("OS version", "OSVersion")] {
            if let Some(value) = meta.get(key).and_then(Value::as_str) {
                prompt.push_str(&format!("{}: {}\n", label, value));
            }
        }
    }

    if !ctx.available_sections.is_empty() {
        prompt.push_str(&format!(
            "Collected sections: {}\n",
            ctx.available_sections.join(", ")
        ));
    }

    if let Some(text) = ctx.summary_text {
        prompt.push_str(&format!(
            "\nCollector summary:\n{}\n",
            truncate(text, ctx.depth.data_budget(ctx.max_section_chars))
        ));
    }

    prompt.push_str(&format!(
        "\nRate the system and list the most important actions. \
         Respond with JSON in exactly this shape:\n{}\n\n\
         Respond ONLY with the JSON object, no other text.\n",
        SUMMARY_SCHEMA
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), format!("éé{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_unknown_section_gets_default_checklist() {
        assert_eq!(checklist("SomethingNew").len(), 3);
        assert!(checklist("Path")[0].contains("do not exist"));
    }

    #[test]
    fn test_section_prompt_contains_data_and_schema() {
        let prompt = section_prompt("Path", &json!(["C:\\Windows"]), &[], Depth::Standard, 10_000);
        assert!(prompt.contains("'Path' section"));
        assert!(prompt.contains("C:\\\\Windows"));
        assert!(prompt.contains("\"findings\""));
        assert!(prompt.contains("at most 6 findings"));
    }

    #[test]
    fn test_section_prompt_truncates_by_depth() {
        let big = json!("x".repeat(20_000));
        let basic = section_prompt("Path", &big, &[], Depth::Basic, 1_000);
        let detailed = section_prompt("Path", &big, &[], Depth::Detailed, 1_000);

        assert!(basic.contains(TRUNCATION_MARKER));
        assert!(basic.len() < detailed.len());
    }

    #[test]
    fn test_section_prompt_includes_metrics_and_related_context() {
        let data = json!({
            "ProcessorUsage": 95.0,
            "Memory": {"TotalGB": 8.0, "FreeGB": 1.0, "PercentUsed": 88.0}
        });
        let related = vec![(
            "DiskSpace".to_string(),
            json!([{"Name": "C", "PercentFree": 4.0}]),
        )];

        let prompt = section_prompt("PerformanceData", &data, &related, Depth::Standard, 10_000);
        assert!(prompt.contains("Pre-computed observations:\n- CPU usage: 95.0% (Critical)"));
        assert!(prompt.contains("Related system context:\n- System drive (C:) has 4.0% free"));

        let plain = section_prompt("Browsers", &json!([]), &[], Depth::Standard, 10_000);
        assert!(!plain.contains("Pre-computed observations"));
        assert!(!plain.contains("Related system context"));
    }

    #[test]
    fn test_summary_prompt_includes_context() {
        let meta = json!({"ComputerName": "WS-01", "OSVersion": "10.0.19045"});
        let sections = vec!["Path".to_string(), "DiskSpace".to_string()];
        let prompt = summary_prompt(&SummaryContext {
            metadata: Some(&meta),
            summary_text: Some("12 services stopped"),
            available_sections: &sections,
            depth: Depth::Standard,
            max_section_chars: 10_000,
        });

        assert!(prompt.contains("Computer: WS-01"));
        assert!(prompt.contains("Collected sections: Path, DiskSpace"));
        assert!(prompt.contains("12 services stopped"));
        assert!(prompt.contains("overallHealth"));
    }
}
