//! Programmatic API.
//!
//! `AnalysisService` is what an HTTP or CLI layer talks to. It wires the
//! stores, the model client and the lifecycle manager together and adds
//! the derived report and comparison views.

use crate::analysis::comparator;
use crate::analysis::{AnalyzerSettings, Orchestrator, SectionAnalyzer};
use crate::config::Config;
use crate::error::PipelineResult;
use crate::lifecycle::AnalysisManager;
use crate::llm::{ClientConfig, LlmError, ModelClient, ModelListCache, OpenAiCompatibleClient};
use crate::models::{
    Analysis, AnalysisOptions, AnalysisRecord, Comparison, CreateResult, DeleteResult, Report,
};
use crate::report::formatter;
use crate::store::{AnalysisStore, FsAnalysisStore, FsSnapshotStore, SnapshotStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Options for `compare_analyses`.
#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    /// Sections to compare; all sections of either side when empty.
    pub sections: Vec<String>,
}

pub struct AnalysisService {
    manager: AnalysisManager,
    models: ModelListCache,
    top_issues_limit: usize,
}

impl AnalysisService {
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        analyses: Arc<dyn AnalysisStore>,
        client: Arc<dyn ModelClient>,
        config: &Config,
    ) -> Self {
        let settings = AnalyzerSettings {
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
            timeout: Duration::from_secs(config.model.timeout_seconds),
            max_section_chars: config.analysis.max_section_chars,
        };
        let orchestrator = Orchestrator::new(
            snapshots.clone(),
            SectionAnalyzer::new(client.clone(), settings),
            config.general.concurrency,
        );

        Self {
            manager: AnalysisManager::new(snapshots, analyses, orchestrator, &config.model.name),
            models: ModelListCache::new(
                client,
                Duration::from_secs(config.model.models_cache_ttl_seconds),
            ),
            top_issues_limit: config.report.top_issues_limit,
        }
    }

    /// Filesystem stores and the HTTP model client, as configured.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        info!(
            "Using model server {} (snapshots: {}, analyses: {})",
            config.model.server_url, config.storage.snapshots_dir, config.storage.analyses_dir
        );

        let client = OpenAiCompatibleClient::new(ClientConfig {
            server_url: config.model.server_url.clone(),
            // The analyzer enforces the per-call bound; the HTTP timeout
            // only catches a wedged connection.
            timeout_seconds: config.model.timeout_seconds.saturating_add(5),
        })?;

        Ok(Self::new(
            Arc::new(FsSnapshotStore::new(&config.storage.snapshots_dir)),
            Arc::new(FsAnalysisStore::new(&config.storage.analyses_dir)),
            Arc::new(client),
            config,
        ))
    }

    pub async fn create_analysis(
        &self,
        snapshot_id: &str,
        options: &AnalysisOptions,
    ) -> PipelineResult<CreateResult> {
        self.manager.create(snapshot_id, options).await
    }

    pub async fn get_analysis(&self, id: &str) -> PipelineResult<Analysis> {
        self.manager.get(id).await
    }

    pub async fn list_analyses(&self) -> PipelineResult<Vec<AnalysisRecord>> {
        self.manager.list().await
    }

    pub async fn delete_analysis(&self, id: &str) -> PipelineResult<DeleteResult> {
        self.manager.delete(id).await
    }

    /// Report view of an analysis. Fails only when the analysis is missing.
    pub async fn get_report(&self, id: &str, limit: Option<usize>) -> PipelineResult<Report> {
        let analysis = self.manager.get(id).await?;
        Ok(formatter::format_report(
            &analysis,
            limit.unwrap_or(self.top_issues_limit),
        ))
    }

    /// Diff two analyses. Fails only when either analysis is missing.
    pub async fn compare_analyses(
        &self,
        baseline_id: &str,
        current_id: &str,
        options: &CompareOptions,
    ) -> PipelineResult<Comparison> {
        let baseline = self.manager.get(baseline_id).await?;
        let current = self.manager.get(current_id).await?;

        let sections = (!options.sections.is_empty()).then_some(options.sections.as_slice());
        Ok(comparator::compare(&baseline, &current, sections))
    }

    /// Models the server offers, cached for the configured TTL.
    pub async fn list_models(&self, refresh: bool) -> Result<Vec<String>, LlmError> {
        if refresh {
            self.models.force_refresh().await
        } else {
            self.models.get().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::section::tests::{FixedClient, HangingClient};
    use crate::lifecycle::tests::write_snapshot;
    use crate::models::{AnalysisStatus, SectionStatus, Severity};
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn service(dir: &TempDir, client: Arc<dyn ModelClient>) -> AnalysisService {
        let mut config = Config::default();
        config.model.timeout_seconds = 1;
        config.model.name = "stub".into();

        AnalysisService::new(
            Arc::new(FsSnapshotStore::new(dir.path().join("snapshots"))),
            Arc::new(FsAnalysisStore::new(dir.path().join("analyses"))),
            client,
            &config,
        )
    }

    const DISK_LOW: &str = r#"{"severity": "low", "overview": "ok",
        "findings": [{"title": "C: filling", "severity": "low"}],
        "recommendations": ["Watch C:"], "overallHealth": "Good"}"#;

    const DISK_CRITICAL: &str = r#"{"severity": "critical", "overview": "bad",
        "findings": [{"title": "C: filling", "severity": "critical"},
                     {"title": "D: offline", "severity": "high"}],
        "recommendations": ["watch c: ", "Replace D:"], "overallHealth": "Poor"}"#;

    #[tokio::test]
    async fn test_end_to_end_report() {
        let dir = TempDir::new().unwrap();
        write_snapshot(&dir.path().join("snapshots"), "s1", &["DiskSpace"]);
        let service = service(&dir, Arc::new(FixedClient(DISK_CRITICAL.into())));

        assert_ok!(service.create_analysis("s1", &AnalysisOptions::default()).await);
        let report = assert_ok!(service.get_report("s1", None).await);

        assert_eq!(report.status, AnalysisStatus::Complete);
        assert_eq!(report.model, "stub");
        assert_eq!(report.summary.system_health.overall, "Poor");
        assert_eq!(report.summary.issue_count.total, 2);
        assert_eq!(report.top_issues[0].finding.severity, Severity::Critical);
        assert_eq!(report.recommendations, vec!["watch c:", "Replace D:"]);
    }

    #[tokio::test]
    async fn test_report_of_missing_analysis_is_not_found() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(HangingClient));

        let err = assert_err!(service.get_report("nope", None).await);
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_compare_two_snapshots() {
        let dir = TempDir::new().unwrap();
        write_snapshot(&dir.path().join("snapshots"), "before", &["DiskSpace"]);
        write_snapshot(&dir.path().join("snapshots"), "after", &["DiskSpace"]);

        let low = service(&dir, Arc::new(FixedClient(DISK_LOW.into())));
        assert_ok!(low.create_analysis("before", &AnalysisOptions::default()).await);
        let critical = service(&dir, Arc::new(FixedClient(DISK_CRITICAL.into())));
        assert_ok!(critical.create_analysis("after", &AnalysisOptions::default()).await);

        let comparison = assert_ok!(
            critical
                .compare_analyses("before", "after", &CompareOptions::default())
                .await
        );
        let disk = comparison
            .sections
            .iter()
            .find(|s| s.section == "DiskSpace")
            .unwrap();

        assert_eq!(disk.status, SectionStatus::Worsened);
        assert!(comparison.changes.worsened.contains(&"DiskSpace".to_string()));
        assert!(comparison.summary.change_summary.contains("critical +1"));

        let err = assert_err!(
            critical
                .compare_analyses("before", "ghost", &CompareOptions::default())
                .await
        );
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let dir = TempDir::new().unwrap();
        write_snapshot(&dir.path().join("snapshots"), "s1", &["Path"]);
        write_snapshot(&dir.path().join("snapshots"), "s2", &["Path"]);
        let service = service(&dir, Arc::new(FixedClient(DISK_LOW.into())));

        assert_ok!(service.create_analysis("s1", &AnalysisOptions::default()).await);
        assert_ok!(service.create_analysis("s2", &AnalysisOptions::default()).await);

        let listed = assert_ok!(service.list_analyses().await);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "s2");

        assert_ok!(service.delete_analysis("s2").await);
        assert_eq!(assert_ok!(service.list_analyses().await).len(), 1);
    }

    #[tokio::test]
    async fn test_list_models_uses_cache() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(FixedClient(String::new())));

        assert_eq!(assert_ok!(service.list_models(false).await), vec!["fixed"]);
        assert_eq!(assert_ok!(service.list_models(true).await), vec!["fixed"]);
    }
}
