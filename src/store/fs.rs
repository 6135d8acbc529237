//! Filesystem-backed stores.
//!
//! Snapshots:
//!   <snapshots_dir>/<id>/metadata.json
//!   <snapshots_dir>/<id>/index.json      (optional, section -> file)
//!   <snapshots_dir>/<id>/<Section>.json  (payload, optionally under "Data")
//!   <snapshots_dir>/<id>/summary.txt     (optional)
//!
//! Analyses:
//!   <analyses_dir>/<id>/metadata.json
//!   <analyses_dir>/<id>/sections/<Section>.json
//!   <analyses_dir>/<id>/interactions/<Section>.json

use super::{AnalysisStore, SnapshotStore, StoreError, StoreResult};
use crate::models::{AnalysisRecord, LlmInteraction, SectionAnalysis, SectionEntry};
use async_trait::async_trait;
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const METADATA_FILE: &str = "metadata.json";
const INDEX_FILE: &str = "index.json";
const SUMMARY_FILE: &str = "summary.txt";
const SECTIONS_DIR: &str = "sections";
const INTERACTIONS_DIR: &str = "interactions";

/// Read a text file, dropping a leading UTF-8 BOM.
async fn read_text(path: &Path) -> StoreResult<String> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(content.trim_start_matches('\u{feff}').to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StoreError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let content = read_text(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Write pretty JSON through a temporary file and rename it into place.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// File name used for a section, with path separators neutralized.
fn section_file_name(section: &str) -> String {
    let safe: String = section
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect();
    format!("{}.json", safe.trim_start_matches('.'))
}

/// Stems of the `*.json` files in a directory, sorted.
async fn json_stems(dir: &Path, skip: &[&str]) -> StoreResult<Vec<String>> {
    let mut stems = Vec::new();

    if !is_dir(dir).await {
        return Ok(stems);
    }

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if skip.contains(&name.as_str()) {
            continue;
        }
        if let Some(stem) = name.strip_suffix(".json") {
            stems.push(stem.to_string());
        }
    }

    stems.sort();
    Ok(stems)
}

/// `index.json`: section name to file name, in file order.
#[derive(Debug, Default, PartialEq)]
struct SectionIndex(Vec<(String, String)>);

impl SectionIndex {
    fn names(self) -> Vec<String> {
        self.0.into_iter().map(|(name, _)| name).collect()
    }

    fn file_for(&self, section: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == section)
            .map(|(_, file)| file.as_str())
    }
}

impl<'de> Deserialize<'de> for SectionIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IndexVisitor;

        impl<'de> Visitor<'de> for IndexVisitor {
            type Value = SectionIndex;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of section names to file names")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<SectionIndex, A::Error> {
                let mut entries: Vec<(String, String)> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));

                // A repeated key keeps its first position and its last file.
                while let Some((name, file)) = map.next_entry::<String, String>()? {
                    match entries.iter_mut().find(|(existing, _)| *existing == name) {
                        Some(entry) => entry.1 = file,
                        None => entries.push((name, file)),
                    }
                }

                Ok(SectionIndex(entries))
            }
        }

        deserializer.deserialize_map(IndexVisitor)
    }
}

/// Snapshots laid out as one directory per id.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    async fn index(&self, id: &str) -> StoreResult<Option<SectionIndex>> {
        let path = self.dir(id).join(INDEX_FILE);
        match read_json(&path).await {
            Ok(index) => Ok(Some(index)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn exists(&self, id: &str) -> StoreResult<bool> {
        Ok(is_dir(&self.dir(id)).await)
    }

    async fn list_sections(&self, id: &str) -> StoreResult<Vec<String>> {
        if let Some(index) = self.index(id).await? {
            return Ok(index.names());
        }

        debug!("No index.json for snapshot {}, listing directory", id);
        json_stems(&self.dir(id), &[METADATA_FILE, INDEX_FILE]).await
    }

    async fn read_section(&self, id: &str, section: &str) -> StoreResult<Value> {
        let file_name = match self.index(id).await? {
            Some(index) => index
                .file_for(section)
                .map(str::to_string)
                .ok_or_else(|| StoreError::NotFound(format!("section {} in {}", section, id)))?,
            None => section_file_name(section),
        };

        let document: Value = read_json(&self.dir(id).join(file_name)).await?;

        match document {
            Value::Object(mut map) if map.contains_key("Data") => {
                Ok(map.remove("Data").unwrap_or(Value::Null))
            }
            other => Ok(other),
        }
    }

    async fn read_summary_text(&self, id: &str) -> StoreResult<Option<String>> {
        match read_text(&self.dir(id).join(SUMMARY_FILE)).await {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_metadata(&self, id: &str) -> StoreResult<Option<Value>> {
        match read_json(&self.dir(id).join(METADATA_FILE)).await {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Analyses laid out as one directory per snapshot id.
#[derive(Debug, Clone)]
pub struct FsAnalysisStore {
    root: PathBuf,
}

impl FsAnalysisStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

#[async_trait]
impl AnalysisStore for FsAnalysisStore {
    async fn exists(&self, id: &str) -> StoreResult<bool> {
        Ok(is_dir(&self.dir(id)).await)
    }

    async fn list_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();

        if !is_dir(&self.root).await {
            return Ok(ids);
        }

        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn write_metadata(&self, record: &AnalysisRecord) -> StoreResult<()> {
        write_json(&self.dir(&record.id).join(METADATA_FILE), record).await
    }

    async fn read_metadata(&self, id: &str) -> StoreResult<AnalysisRecord> {
        read_json(&self.dir(id).join(METADATA_FILE)).await
    }

    async fn write_section_analysis(
        &self,
        id: &str,
        analysis: &SectionAnalysis,
    ) -> StoreResult<()> {
        let path = self
            .dir(id)
            .join(SECTIONS_DIR)
            .join(section_file_name(&analysis.section));
        write_json(&path, analysis).await
    }

    async fn write_interaction(&self, id: &str, interaction: &LlmInteraction) -> StoreResult<()> {
        let path = self
            .dir(id)
            .join(INTERACTIONS_DIR)
            .join(section_file_name(&interaction.section));
        write_json(&path, interaction).await
    }

    async fn list_section_analyses(&self, id: &str) -> StoreResult<BTreeMap<String, SectionEntry>> {
        let dir = self.dir(id).join(SECTIONS_DIR);
        let mut sections = BTreeMap::new();

        for stem in json_stems(&dir, &[]).await? {
            let path = dir.join(format!("{}.json", stem));
            match read_json::<SectionEntry>(&path).await {
                Ok(SectionEntry::Analysis(analysis)) => {
                    sections.insert(analysis.section.clone(), SectionEntry::Analysis(analysis));
                }
                Ok(unparsed) => {
                    sections.insert(stem, unparsed);
                }
                Err(e) => warn!("Skipping unreadable section file {}: {}", path.display(), e),
            }
        }

        Ok(sections)
    }

    async fn list_interactions(&self, id: &str) -> StoreResult<BTreeMap<String, LlmInteraction>> {
        let dir = self.dir(id).join(INTERACTIONS_DIR);
        let mut interactions = BTreeMap::new();

        for stem in json_stems(&dir, &[]).await? {
            let path = dir.join(format!("{}.json", stem));
            match read_json::<LlmInteraction>(&path).await {
                Ok(interaction) => {
                    interactions.insert(interaction.section.clone(), interaction);
                }
                Err(e) => warn!("Skipping unreadable interaction {}: {}", path.display(), e),
            }
        }

        Ok(interactions)
    }

    async fn delete_all(&self, id: &str) -> StoreResult<()> {
        let dir = self.dir(id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(dir.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisOptions, AnalysisStatus, Severity};
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_sections_from_directory() {
        let temp = TempDir::new().unwrap();
        let snap = temp.path().join("S1");
        write(&snap, "metadata.json", r#"{"ComputerName": "HOST"}"#);
        write(&snap, "Path.json", r#"{"Data": ["C:\\Windows"]}"#);
        write(&snap, "DiskSpace.json", "\u{feff}[{\"Name\": \"C\"}]");

        let store = FsSnapshotStore::new(temp.path());

        assert!(store.exists("S1").await.unwrap());
        assert!(!store.exists("S2").await.unwrap());
        assert_eq!(store.list_sections("S1").await.unwrap(), vec!["DiskSpace", "Path"]);
        assert_eq!(
            store.read_section("S1", "Path").await.unwrap(),
            json!(["C:\\Windows"])
        );
        assert_eq!(
            store.read_section("S1", "DiskSpace").await.unwrap(),
            json!([{"Name": "C"}])
        );
        assert_eq!(
            store.read_metadata("S1").await.unwrap(),
            Some(json!({"ComputerName": "HOST"}))
        );
        assert_eq!(store.read_summary_text("S1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_snapshot_index_and_summary() {
        let temp = TempDir::new().unwrap();
        let snap = temp.path().join("S1");
        write(&snap, "index.json", r#"{"Network": "net_data.json"}"#);
        write(&snap, "net_data.json", r#"{"Data": {"adapters": 2}}"#);
        write(&snap, "ignored.json", "{}");
        write(&snap, "summary.txt", "Workstation, 16GB RAM");

        let store = FsSnapshotStore::new(temp.path());

        assert_eq!(store.list_sections("S1").await.unwrap(), vec!["Network"]);
        assert_eq!(
            store.read_section("S1", "Network").await.unwrap(),
            json!({"adapters": 2})
        );
        assert!(matches!(
            store.read_section("S1", "Path").await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(
            store.read_summary_text("S1").await.unwrap().as_deref(),
            Some("Workstation, 16GB RAM")
        );
    }

    #[tokio::test]
    async fn test_snapshot_index_order_is_kept() {
        let temp = TempDir::new().unwrap();
        let snap = temp.path().join("S1");
        write(
            &snap,
            "index.json",
            r#"{"Network": "Network.json", "DiskSpace": "disk.json", "Path": "Path.json"}"#,
        );
        write(&snap, "disk.json", r#"[{"Name": "C"}]"#);

        let store = FsSnapshotStore::new(temp.path());

        assert_eq!(
            store.list_sections("S1").await.unwrap(),
            vec!["Network", "DiskSpace", "Path"]
        );
        assert_eq!(
            store.read_section("S1", "DiskSpace").await.unwrap(),
            json!([{"Name": "C"}])
        );
    }

    #[test]
    fn test_section_index_repeated_key_keeps_first_position() {
        let index: SectionIndex =
            serde_json::from_str(r#"{"B": "b1.json", "A": "a.json", "B": "b2.json"}"#).unwrap();
        assert_eq!(index.file_for("B"), Some("b2.json"));
        assert_eq!(index.names(), vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_analysis_store_round_trip_and_delete() {
        let temp = TempDir::new().unwrap();
        let store = FsAnalysisStore::new(temp.path());

        let record = AnalysisRecord::processing("S1", "test-model", &AnalysisOptions::default());
        store.write_metadata(&record).await.unwrap();
        store
            .write_section_analysis("S1", &SectionAnalysis::fallback("Path", "x"))
            .await
            .unwrap();
        store
            .write_interaction(
                "S1",
                &LlmInteraction {
                    section: "Path".into(),
                    prompt: "p".into(),
                    response: Some("r".into()),
                    error: None,
                    model: "test-model".into(),
                    timestamp: Utc::now(),
                    tokens: None,
                    duration_ms: 3,
                },
            )
            .await
            .unwrap();

        assert_eq!(store.list_ids().await.unwrap(), vec!["S1"]);
        assert_eq!(
            store.read_metadata("S1").await.unwrap().status,
            AnalysisStatus::Processing
        );

        let sections = store.list_section_analyses("S1").await.unwrap();
        let path = sections["Path"].as_analysis().unwrap();
        assert_eq!(path.severity, Severity::Info);

        let interactions = store.list_interactions("S1").await.unwrap();
        assert_eq!(interactions["Path"].response.as_deref(), Some("r"));

        store.delete_all("S1").await.unwrap();
        assert!(!store.exists("S1").await.unwrap());
        assert!(matches!(
            store.delete_all("S1").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_section_files() {
        let temp = TempDir::new().unwrap();
        let sections = temp.path().join("S1").join("sections");
        write(&sections, "Broken.json", "{not json");
        write(&sections, "Odd.json", r#"["just", "a", "list"]"#);

        let store = FsAnalysisStore::new(temp.path());
        let listed = store.list_section_analyses("S1").await.unwrap();

        assert!(!listed.contains_key("Broken"));
        assert!(listed["Odd"].as_analysis().is_none());
    }

    #[test]
    fn test_section_file_name_neutralizes_paths() {
        assert_eq!(section_file_name("Path"), "Path.json");
        assert_eq!(section_file_name("../etc/passwd"), "_etc_passwd.json");
    }
}
