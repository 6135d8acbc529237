//! Storage boundaries.
//!
//! The pipeline reads snapshots through `SnapshotStore` and persists
//! analyses through `AnalysisStore`. The filesystem implementations live
//! in `fs`.

pub mod fs;

use crate::models::{AnalysisRecord, LlmInteraction, SectionAnalysis, SectionEntry};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

pub use fs::{FsAnalysisStore, FsSnapshotStore};

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to collected snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn exists(&self, id: &str) -> StoreResult<bool>;

    /// Section names available in the snapshot.
    async fn list_sections(&self, id: &str) -> StoreResult<Vec<String>>;

    async fn read_section(&self, id: &str, section: &str) -> StoreResult<Value>;

    /// Free-text summary written by the collector, if any.
    async fn read_summary_text(&self, id: &str) -> StoreResult<Option<String>>;

    /// Collector metadata (computer name, OS version, ...), if any.
    async fn read_metadata(&self, id: &str) -> StoreResult<Option<Value>>;
}

/// Persistence for analyses.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn exists(&self, id: &str) -> StoreResult<bool>;

    async fn list_ids(&self) -> StoreResult<Vec<String>>;

    async fn write_metadata(&self, record: &AnalysisRecord) -> StoreResult<()>;

    async fn read_metadata(&self, id: &str) -> StoreResult<AnalysisRecord>;

    async fn write_section_analysis(&self, id: &str, analysis: &SectionAnalysis)
        -> StoreResult<()>;

    async fn write_interaction(&self, id: &str, interaction: &LlmInteraction) -> StoreResult<()>;

    async fn list_section_analyses(&self, id: &str) -> StoreResult<BTreeMap<String, SectionEntry>>;

    async fn list_interactions(&self, id: &str) -> StoreResult<BTreeMap<String, LlmInteraction>>;

    /// Remove every trace of the analysis.
    async fn delete_all(&self, id: &str) -> StoreResult<()>;
}
