//! Analysis lifecycle.
//!
//! `AnalysisManager` owns the persisted state machine of an analysis:
//! a record is written as `processing`, every section output is persisted
//! as it completes, and the record ends as `complete` or `error`. Runs
//! for the same id are serialized; a re-run replaces the previous state.

use crate::analysis::pipeline::{self, AnalysisPlan, Orchestrator};
use crate::analysis::section::SectionOutcome;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    Analysis, AnalysisOptions, AnalysisRecord, AnalysisStatus, CreateResult, DeleteResult,
};
use crate::store::{AnalysisStore, SnapshotStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

/// Reject ids that cannot name a directory safely.
pub fn validate_id(id: &str) -> PipelineResult<()> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::Validation("id must not be empty".to_string()));
    }
    if trimmed != id || id == "." || id == ".." || id.contains(|c| c == '/' || c == '\\') {
        return Err(PipelineError::Validation(format!("invalid id '{}'", id)));
    }
    Ok(())
}

type LockMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

fn lock_map(locks: &LockMap) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
    match locks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Holds the per-id lock; the map entry goes away with the last holder.
struct IdGuard<'a> {
    locks: &'a LockMap,
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdGuard<'_> {
    fn drop(&mut self) {
        let mut locks = lock_map(self.locks);
        self.guard.take();

        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

pub struct AnalysisManager {
    snapshots: Arc<dyn SnapshotStore>,
    analyses: Arc<dyn AnalysisStore>,
    orchestrator: Orchestrator,
    default_model: String,
    locks: LockMap,
}

impl AnalysisManager {
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        analyses: Arc<dyn AnalysisStore>,
        orchestrator: Orchestrator,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            snapshots,
            analyses,
            orchestrator,
            default_model: default_model.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_id(&self, id: &str) -> IdGuard<'_> {
        let lock = lock_map(&self.locks)
            .entry(id.to_string())
            .or_default()
            .clone();

        IdGuard {
            locks: &self.locks,
            id: id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Analyze a snapshot and persist the result under its id.
    pub async fn create(
        &self,
        snapshot_id: &str,
        options: &AnalysisOptions,
    ) -> PipelineResult<CreateResult> {
        validate_id(snapshot_id)?;
        pipeline::validate_options(options)?;

        let _guard = self.lock_id(snapshot_id).await;

        if !self.snapshots.exists(snapshot_id).await? {
            return Err(PipelineError::snapshot_not_found(snapshot_id));
        }

        if self.analyses.exists(snapshot_id).await? {
            info!("Replacing previous analysis of {}", snapshot_id);
            self.analyses.delete_all(snapshot_id).await?;
        }

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let started = Instant::now();
        let mut record = AnalysisRecord::processing(snapshot_id, &model, options);
        self.analyses.write_metadata(&record).await?;

        match self.execute(&mut record, options, started).await {
            Ok(()) => {
                let duration_ms = record.duration_ms.unwrap_or_default();
                info!(
                    "Analysis of {} complete: {} sections in {}ms",
                    snapshot_id,
                    record.sections.len(),
                    duration_ms
                );
                Ok(CreateResult {
                    success: true,
                    id: snapshot_id.to_string(),
                    duration_ms,
                    sections: record.sections,
                })
            }
            Err(e) => {
                error!("Analysis of {} failed: {}", snapshot_id, e);
                record.status = AnalysisStatus::Error;
                record.error = Some(e.to_string());
                record.completed_at = Some(Utc::now());
                record.duration_ms = Some(started.elapsed().as_millis() as u64);

                if let Err(write_err) = self.analyses.write_metadata(&record).await {
                    warn!("Could not record failure of {}: {}", snapshot_id, write_err);
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        record: &mut AnalysisRecord,
        options: &AnalysisOptions,
        started: Instant,
    ) -> PipelineResult<()> {
        let plan: AnalysisPlan = self
            .orchestrator
            .prepare(&record.id, options, &record.model)
            .await?;

        record.sections = plan.section_names();
        self.analyses.write_metadata(record).await?;

        let summary = self.orchestrator.run_summary(&plan).await;
        self.persist(&record.id, &summary).await?;

        for outcome in self.orchestrator.run_sections(&plan).await {
            self.persist(&record.id, &outcome).await?;
        }

        record.status = AnalysisStatus::Complete;
        record.completed_at = Some(Utc::now());
        record.duration_ms = Some(started.elapsed().as_millis() as u64);
        self.analyses.write_metadata(record).await?;
        Ok(())
    }

    async fn persist(&self, id: &str, outcome: &SectionOutcome) -> PipelineResult<()> {
        debug!("Persisting section {} of {}", outcome.analysis.section, id);
        self.analyses
            .write_section_analysis(id, &outcome.analysis)
            .await?;
        self.analyses
            .write_interaction(id, &outcome.interaction)
            .await?;
        Ok(())
    }

    /// Load an analysis, degrading unreadable parts instead of failing.
    pub async fn get(&self, id: &str) -> PipelineResult<Analysis> {
        validate_id(id)?;

        if !self.analyses.exists(id).await? {
            return Err(PipelineError::analysis_not_found(id));
        }

        Ok(self.load(id).await)
    }

    async fn load(&self, id: &str) -> Analysis {
        let metadata = self.analyses.read_metadata(id).await.unwrap_or_else(|e| {
            warn!("Metadata of {} unreadable: {}", id, e);
            AnalysisRecord::minimal(id)
        });

        let data = match self.analyses.list_section_analyses(id).await {
            Ok(data) if !data.is_empty() => Some(data),
            Ok(_) => None,
            Err(e) => {
                warn!("Section outputs of {} unreadable: {}", id, e);
                None
            }
        };

        let llm_interactions = match self.analyses.list_interactions(id).await {
            Ok(interactions) if !interactions.is_empty() => Some(interactions),
            Ok(_) => None,
            Err(e) => {
                warn!("Interactions of {} unreadable: {}", id, e);
                None
            }
        };

        Analysis {
            metadata,
            data,
            llm_interactions,
        }
    }

    /// Every stored analysis record, newest first.
    pub async fn list(&self) -> PipelineResult<Vec<AnalysisRecord>> {
        let mut records = Vec::new();

        for id in self.analyses.list_ids().await? {
            let record = self.analyses.read_metadata(&id).await.unwrap_or_else(|e| {
                warn!("Metadata of {} unreadable: {}", id, e);
                AnalysisRecord::minimal(&id)
            });
            records.push(record);
        }

        records.sort_by(|a, b| match (a.started_at, b.started_at) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.id.cmp(&b.id),
        });

        Ok(records)
    }

    /// Remove an analysis entirely.
    pub async fn delete(&self, id: &str) -> PipelineResult<DeleteResult> {
        validate_id(id)?;

        let _guard = self.lock_id(id).await;

        if !self.analyses.exists(id).await? {
            return Err(PipelineError::analysis_not_found(id));
        }

        self.analyses.delete_all(id).await?;
        info!("Deleted analysis {}", id);

        Ok(DeleteResult {
            success: true,
            id: id.to_string(),
        })
    }
}
