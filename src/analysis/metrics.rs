//! Pre-computed metrics for well-known sections.
//!
//! Each `*_observations` function reads raw section data and returns
//! short lines that are placed in the prompt ahead of the data, so the
//! model does not have to do the arithmetic itself. Data in an
//! unexpected shape yields no lines.

use serde_json::Value;
use std::collections::BTreeMap;

const CPU_IDLE: f64 = 15.0;
const CPU_NORMAL: f64 = 50.0;
const CPU_HIGH: f64 = 80.0;
const CPU_CRITICAL: f64 = 90.0;

const MEMORY_LOW: f64 = 50.0;
const MEMORY_NORMAL: f64 = 70.0;
const MEMORY_HIGH: f64 = 85.0;
const MEMORY_CRITICAL: f64 = 95.0;

/// Free memory below this many GB is flagged.
const MIN_FREE_MEMORY_GB: f64 = 2.0;

/// Services expected on a healthy Windows workstation.
const ESSENTIAL_SERVICES: &[&str] = &[
    "wuauserv",
    "WinDefend",
    "wscsvc",
    "LanmanServer",
    "LanmanWorkstation",
    "Dnscache",
    "DcomLaunch",
    "RpcSs",
    "EventLog",
    "PlugPlay",
    "gpsvc",
    "CryptSvc",
    "iphlpsvc",
    "W32Time",
    "SessionEnv",
    "UserManager",
    "Power",
    "mpssvc",
    "BFE",
    "nvvsvc",
    "spoolsv",
    "ShellHWDetection",
];

const UNNECESSARY_SERVICES: &[&str] = &[
    "AdobeARMservice",
    "AdobeFlashPlayerUpdateSvc",
    "RemoteRegistry",
    "Fax",
    "TapiSrv",
    "SCardSvr",
    "BTAGService",
    "bthserv",
    "TabletInputService",
    "WbioSrvc",
    "wcncsvc",
    "WMPNetworkSvc",
    "WSearch",
    "XblAuthManager",
    "XblGameSave",
    "XboxNetApiSvc",
    "lfsvc",
    "DiagTrack",
    "WalletService",
    "RetailDemo",
    "SharedAccess",
];

const SECURITY_SENSITIVE_SERVICES: &[&str] = &[
    "RemoteRegistry",
    "RemoteAccess",
    "TermService",
    "UmRdpService",
    "SharedAccess",
    "upnphost",
    "SessionEnv",
    "NetTcpPortSharing",
    "lmhosts",
    "TlntSvr",
    "FTPSVC",
    "SMTPSVC",
    "SNMP",
    "SNMPTRAP",
];

/// At most this many service names are listed per category.
const MAX_LISTED_SERVICES: usize = 10;

const STARTUP_SUSPICIOUS_KEYWORDS: &[&str] = &[
    "update", "helper", "daemon", "tray", "scheduler", "manager", "monitor", "launch", "startup",
    "boot", "assistant", "notif", "agent", "sync", "cloud", "cache", "tune", "speedup", "optimize",
    "clean",
];

const STARTUP_KNOWN_GOOD: &[&str] = &[
    "onedrive",
    "dropbox",
    "google drive",
    "microsoft teams",
    "slack",
    "discord",
    "spotify",
    "steam",
    "epic games",
    "windows security",
    "realtek audio",
    "nvidia",
    "amd",
    "intel",
    "synaptics",
    "dell",
    "hp",
    "lenovo",
    "apple",
    "icloud",
    "adobe creative cloud",
];

const STARTUP_HIGH_IMPACT: &[&str] = &[
    "adobe", "teams", "skype", "steam", "epic", "defender", "antivirus", "itunes", "icloud",
    "spotify", "backup", "sync",
];

fn number(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}

fn text<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Items of a list section; a lone object counts as a one-item list.
fn items(data: &Value) -> Option<&[Value]> {
    match data {
        Value::Array(items) => Some(items.as_slice()),
        Value::Object(_) => Some(std::slice::from_ref(data)),
        _ => None,
    }
}

fn band(value: f64, limits: [f64; 4], labels: [&'static str; 5]) -> &'static str {
    limits
        .iter()
        .position(|limit| value <= *limit)
        .map_or(labels[4], |i| labels[i])
}

/// CPU load band: Idle, Normal, High, Very High or Critical.
pub fn cpu_status(usage_percent: f64) -> &'static str {
    band(
        usage_percent,
        [CPU_IDLE, CPU_NORMAL, CPU_HIGH, CPU_CRITICAL],
        ["Idle", "Normal", "High", "Very High", "Critical"],
    )
}

/// Memory utilization band: Low, Normal, High, Very High or Critical.
pub fn memory_status(percent_used: f64) -> &'static str {
    band(
        percent_used,
        [MEMORY_LOW, MEMORY_NORMAL, MEMORY_HIGH, MEMORY_CRITICAL],
        ["Low", "Normal", "High", "Very High", "Critical"],
    )
}

/// Threshold observations over `DiskSpace` data.
///
/// Drives at or below 5% free (or a system drive under 20 GB) are
/// critical, at or below 10% a warning, at or below 15% worth attention.
pub fn disk_space_observations(data: &Value) -> Vec<String> {
    let Some(drives) = items(data) else {
        return Vec::new();
    };

    drives
        .iter()
        .filter_map(|drive| {
            let name = text(drive, "Name").unwrap_or("?");
            let percent = number(drive, "PercentFree")?;
            let free_gb = number(drive, "FreeGB").unwrap_or(f64::MAX);
            let is_system = name.trim_end_matches(':').eq_ignore_ascii_case("C");

            let level = if percent <= 5.0 || (is_system && free_gb < 20.0) {
                "CRITICAL"
            } else if percent <= 10.0 {
                "WARNING"
            } else if percent <= 15.0 {
                "ATTENTION"
            } else {
                return None;
            };

            Some(format!("{}: drive {} has {:.1}% free", level, name, percent))
        })
        .collect()
}

/// Entry counts over `Path` data; entries marked `"Exists": false` are invalid.
pub fn path_observations(data: &Value) -> Vec<String> {
    let Value::Array(entries) = data else {
        return Vec::new();
    };

    let invalid = entries
        .iter()
        .filter(|entry| entry.get("Exists").and_then(Value::as_bool) == Some(false))
        .count();

    vec![
        format!("Total PATH entries: {}", entries.len()),
        format!("Invalid PATH entries: {}", invalid),
        format!("Valid PATH entries: {}", entries.len() - invalid),
    ]
}

/// CPU and memory bands, low-memory warning and overall pressure.
pub fn performance_observations(data: &Value) -> Vec<String> {
    if !data.is_object() {
        return Vec::new();
    }

    let mut lines = Vec::new();
    let cpu = number(data, "ProcessorUsage");
    let memory = data.get("Memory").filter(|m| m.is_object());
    let mem_used = memory.and_then(|m| number(m, "PercentUsed"));

    if let Some(cpu) = cpu {
        lines.push(format!("CPU usage: {:.1}% ({})", cpu, cpu_status(cpu)));
    }

    if let Some(used) = mem_used {
        lines.push(format!("Memory usage: {:.1}% ({})", used, memory_status(used)));
    }

    if let Some(memory) = memory {
        if let (Some(free), Some(total)) = (number(memory, "FreeGB"), number(memory, "TotalGB")) {
            lines.push(format!("Memory: {:.1} GB free of {:.1} GB", free, total));
        }
        if let Some(free) = number(memory, "FreeGB").filter(|free| *free < MIN_FREE_MEMORY_GB) {
            lines.push(format!(
                "WARNING: only {:.1} GB of memory free (less than {} GB)",
                free, MIN_FREE_MEMORY_GB
            ));
        }
    }

    if cpu.is_some_and(|c| c > CPU_CRITICAL) {
        lines.push("WARNING: CPU usage is critically high".to_string());
    }
    if mem_used.is_some_and(|m| m > MEMORY_CRITICAL) {
        lines.push("WARNING: memory usage is critically high".to_string());
    }

    if let (Some(cpu), Some(used)) = (cpu, mem_used) {
        let pressure = if used > MEMORY_HIGH && cpu > CPU_HIGH {
            "High"
        } else if used > MEMORY_NORMAL || cpu > CPU_NORMAL {
            "Moderate"
        } else {
            "Low"
        };
        lines.push(format!("System pressure: {}", pressure));
    }

    lines
}

fn listed(label: &str, names: &[&str]) -> Option<String> {
    if names.is_empty() {
        return None;
    }

    let mut line = format!("{} ({}): ", label, names.len());
    line.push_str(&names.iter().take(MAX_LISTED_SERVICES).copied().collect::<Vec<_>>().join(", "));
    if names.len() > MAX_LISTED_SERVICES {
        line.push_str(", ...");
    }
    Some(line)
}

/// Service totals, start types, and essential / unnecessary / sensitive services.
pub fn running_services_observations(data: &Value) -> Vec<String> {
    let Value::Array(services) = data else {
        return Vec::new();
    };

    let names: Vec<&str> = services.iter().filter_map(|s| text(s, "Name")).collect();

    let mut start_types: BTreeMap<&str, usize> = BTreeMap::new();
    for service in services {
        *start_types
            .entry(text(service, "StartType").unwrap_or("Unknown"))
            .or_default() += 1;
    }

    let missing: Vec<&str> = ESSENTIAL_SERVICES
        .iter()
        .copied()
        .filter(|essential| !names.contains(essential))
        .collect();
    let unnecessary: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| UNNECESSARY_SERVICES.contains(name))
        .collect();
    let sensitive: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| SECURITY_SENSITIVE_SERVICES.contains(name))
        .collect();

    let mut lines = vec![format!("Running services: {}", services.len())];
    if !start_types.is_empty() {
        let breakdown: Vec<String> = start_types
            .iter()
            .map(|(start_type, count)| format!("{} {}", start_type, count))
            .collect();
        lines.push(format!("Start types: {}", breakdown.join(", ")));
    }
    lines.push(format!(
        "Essential services running: {} of {}",
        ESSENTIAL_SERVICES.len() - missing.len(),
        ESSENTIAL_SERVICES.len()
    ));
    lines.extend(listed("Essential services not running", &missing));
    lines.extend(listed("Potentially unnecessary services running", &unnecessary));
    lines.extend(listed("Security-sensitive services running", &sensitive));
    lines
}

/// Startup item totals by location, suspicious and high-impact counts.
pub fn startup_programs_observations(data: &Value) -> Vec<String> {
    let Value::Array(entries) = data else {
        return Vec::new();
    };

    let mut locations: BTreeMap<&str, usize> = BTreeMap::new();
    let mut suspicious = 0;
    let mut high_impact = 0;

    for entry in entries {
        *locations
            .entry(text(entry, "Location").unwrap_or("Unknown"))
            .or_default() += 1;

        let name = text(entry, "Name").unwrap_or_default().to_lowercase();
        let command = text(entry, "Command").unwrap_or_default().to_lowercase();
        let mentions = |needle: &&str| name.contains(*needle) || command.contains(*needle);

        if STARTUP_SUSPICIOUS_KEYWORDS.iter().any(mentions)
            && !STARTUP_KNOWN_GOOD.iter().any(mentions)
        {
            suspicious += 1;
        }
        if STARTUP_HIGH_IMPACT.iter().any(mentions) {
            high_impact += 1;
        }
    }

    let mut lines = vec![format!("Startup items: {}", entries.len())];
    if !locations.is_empty() {
        let breakdown: Vec<String> = locations
            .iter()
            .map(|(location, count)| format!("{} {}", location, count))
            .collect();
        lines.push(format!("Locations: {}", breakdown.join(", ")));
    }
    lines.push(format!("Potentially suspicious items: {}", suspicious));
    lines.push(format!("High boot-impact items: {}", high_impact));
    lines
}

/// Metric lines for `section`, empty for sections without an extractor.
pub fn observations(section: &str, data: &Value) -> Vec<String> {
    match section {
        "DiskSpace" => disk_space_observations(data),
        "Path" => path_observations(data),
        "PerformanceData" => performance_observations(data),
        "RunningServices" => running_services_observations(data),
        "StartupPrograms" => startup_programs_observations(data),
        _ => Vec::new(),
    }
}

/// Other sections whose data adds context to `section`.
pub fn related_sections(section: &str) -> &'static [&'static str] {
    match section {
        "Path" => &["Environment"],
        "Environment" => &["Path"],
        "DiskSpace" => &["PerformanceData", "WindowsFeatures"],
        "PerformanceData" => &["RunningServices", "StartupPrograms", "DiskSpace"],
        "RunningServices" => &["WindowsFeatures", "PerformanceData"],
        "StartupPrograms" => &["RegistrySettings", "InstalledPrograms"],
        "InstalledPrograms" => &["StartupPrograms"],
        "Network" => &["RunningServices", "ActiveConnections", "FirewallRules"],
        _ => &[],
    }
}

/// One-line summaries of related section data.
pub fn related_context(related: &[(String, Value)]) -> Vec<String> {
    let mut lines = Vec::new();

    for (name, data) in related {
        match name.as_str() {
            "DiskSpace" => {
                let system = items(data).and_then(|drives| {
                    drives.iter().find(|d| {
                        text(d, "Name")
                            .is_some_and(|n| n.trim_end_matches(':').eq_ignore_ascii_case("C"))
                    })
                });
                if let Some(percent) = system.and_then(|d| number(d, "PercentFree")) {
                    lines.push(format!("System drive (C:) has {:.1}% free", percent));
                    if percent < 10.0 {
                        lines.push(
                            "NOTE: low free space on the system drive limits virtual memory"
                                .to_string(),
                        );
                    }
                }
            }
            "PerformanceData" => {
                if let Some(cpu) = number(data, "ProcessorUsage") {
                    lines.push(format!("Current CPU usage: {:.1}%", cpu));
                }
                if let Some(used) = data.get("Memory").and_then(|m| number(m, "PercentUsed")) {
                    lines.push(format!("Current memory usage: {:.1}%", used));
                }
            }
            _ => match data {
                Value::Array(entries) => lines.push(format!("{}: {} entries", name, entries.len())),
                Value::Object(fields) => lines.push(format!("{}: {} fields", name, fields.len())),
                _ => {}
            },
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disk_space_thresholds() {
        let data = json!([
            {"Name": "C", "PercentFree": 30.0, "FreeGB": 15.0},
            {"Name": "D", "PercentFree": 8.0, "FreeGB": 40.0},
            {"Name": "E", "PercentFree": 14.0, "FreeGB": 100.0},
            {"Name": "F", "PercentFree": 60.0, "FreeGB": 500.0}
        ]);

        let notes = disk_space_observations(&data);
        assert_eq!(notes.len(), 3);
        assert!(notes[0].starts_with("CRITICAL: drive C"));
        assert!(notes[1].starts_with("WARNING: drive D"));
        assert!(notes[2].starts_with("ATTENTION: drive E"));
    }

    #[test]
    fn test_path_counts_invalid_entries() {
        let data = json!([
            {"Path": "C:\\Windows", "Exists": true},
            {"Path": "C:\\Gone", "Exists": false},
            {"Path": "C:\\Tools"}
        ]);

        assert_eq!(
            path_observations(&data),
            vec![
                "Total PATH entries: 3",
                "Invalid PATH entries: 1",
                "Valid PATH entries: 2"
            ]
        );
        assert!(path_observations(&json!({"Path": "x"})).is_empty());
    }

    #[test]
    fn test_cpu_and_memory_bands() {
        assert_eq!(cpu_status(15.0), "Idle");
        assert_eq!(cpu_status(15.1), "Normal");
        assert_eq!(cpu_status(80.0), "High");
        assert_eq!(cpu_status(90.0), "Very High");
        assert_eq!(cpu_status(90.5), "Critical");

        assert_eq!(memory_status(50.0), "Low");
        assert_eq!(memory_status(70.0), "Normal");
        assert_eq!(memory_status(85.0), "High");
        assert_eq!(memory_status(95.0), "Very High");
        assert_eq!(memory_status(96.0), "Critical");
    }

    #[test]
    fn test_performance_warnings_and_pressure() {
        let busy = json!({
            "ProcessorUsage": 92.0,
            "Memory": {"TotalGB": 16.0, "FreeGB": 0.5, "PercentUsed": 97.0}
        });
        let lines = performance_observations(&busy);

        assert!(lines.contains(&"CPU usage: 92.0% (Critical)".to_string()));
        assert!(lines.contains(&"Memory usage: 97.0% (Critical)".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("WARNING: only 0.5 GB")));
        assert!(lines.contains(&"WARNING: CPU usage is critically high".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("System pressure: High"));

        let calm = json!({"ProcessorUsage": 10.0, "Memory": {"FreeGB": 8.0, "PercentUsed": 40.0}});
        let lines = performance_observations(&calm);
        assert!(!lines.iter().any(|l| l.starts_with("WARNING")));
        assert_eq!(lines.last().map(String::as_str), Some("System pressure: Low"));

        let moderate = json!({"ProcessorUsage": 60.0, "Memory": {"PercentUsed": 40.0}});
        assert_eq!(
            performance_observations(&moderate).last().map(String::as_str),
            Some("System pressure: Moderate")
        );
    }

    #[test]
    fn test_running_services_categories() {
        let data = json!([
            {"Name": "wuauserv", "StartType": "Automatic"},
            {"Name": "RemoteRegistry", "StartType": "Manual"},
            {"Name": "XblGameSave", "StartType": "Manual"},
            {"Name": "TermService", "StartType": "Automatic"}
        ]);
        let lines = running_services_observations(&data);

        assert_eq!(lines[0], "Running services: 4");
        assert_eq!(lines[1], "Start types: Automatic 2, Manual 2");
        assert_eq!(
            lines[2],
            format!("Essential services running: 1 of {}", ESSENTIAL_SERVICES.len())
        );
        assert!(lines
            .iter()
            .any(|l| l == "Potentially unnecessary services running (2): RemoteRegistry, XblGameSave"));
        assert!(lines
            .iter()
            .any(|l| l == "Security-sensitive services running (2): RemoteRegistry, TermService"));

        let missing = lines
            .iter()
            .find(|l| l.starts_with("Essential services not running"))
            .unwrap();
        assert!(missing.ends_with(", ..."));
    }

    #[test]
    fn test_startup_programs_counts() {
        let data = json!([
            {"Name": "OneDrive", "Command": "onedrive.exe /background", "Location": "HKCU Run"},
            {"Name": "SpeedUp Helper", "Command": "c:\\temp\\speedup.exe", "Location": "HKCU Run"},
            {"Name": "Steam", "Command": "steam.exe -silent", "Location": "Startup Folder"},
            {"Name": "Calculator", "Command": "calc.exe", "Location": "Startup Folder"}
        ]);
        let lines = startup_programs_observations(&data);

        assert_eq!(lines[0], "Startup items: 4");
        assert_eq!(lines[1], "Locations: HKCU Run 2, Startup Folder 2");
        assert_eq!(lines[2], "Potentially suspicious items: 1");
        assert_eq!(lines[3], "High boot-impact items: 1");
    }

    #[test]
    fn test_observations_dispatch() {
        assert_eq!(observations("Path", &json!([])).len(), 3);
        assert!(observations("Browsers", &json!([1, 2])).is_empty());
        assert!(observations("PerformanceData", &json!("n/a")).is_empty());
    }

    #[test]
    fn test_related_context_lines() {
        let related = vec![
            (
                "DiskSpace".to_string(),
                json!([{"Name": "C:", "PercentFree": 7.5}]),
            ),
            ("RunningServices".to_string(), json!([{}, {}, {}])),
        ];

        assert_eq!(
            related_context(&related),
            vec![
                "System drive (C:) has 7.5% free",
                "NOTE: low free space on the system drive limits virtual memory",
                "RunningServices: 3 entries"
            ]
        );
        assert_eq!(
            related_sections("PerformanceData"),
            &["RunningServices", "StartupPrograms", "DiskSpace"]
        );
    }
}
