//! snaplens - LLM-assisted analysis of system configuration snapshots.
//!
//! A snapshot is a directory of JSON sections captured from a machine.
//! The pipeline asks a language model to assess each section, persists
//! the results, and derives prioritized reports and snapshot-to-snapshot
//! comparisons. Model failures never abort an analysis; they turn into
//! clearly marked fallback sections.
//!
//! The entry point is [`service::AnalysisService`].

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod llm;
pub mod models;
pub mod report;
pub mod service;
pub mod store;

pub use error::{PipelineError, PipelineResult};
pub use service::{AnalysisService, CompareOptions};
