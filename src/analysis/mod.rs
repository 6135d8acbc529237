//! Analysis modules.
//!
//! The pipeline runs prompts through the model, interprets the answers
//! and persists per-section results. The aggregator and comparator derive
//! views over stored analyses.

pub mod aggregator;
pub mod comparator;
pub mod interpreter;
pub mod metrics;
pub mod pipeline;
pub mod prompts;
pub mod section;

pub use comparator::compare;
pub use interpreter::{interpret, Interpretation, ResponseShape};
pub use pipeline::{select_sections, validate_options, AnalysisPlan, Orchestrator};
pub use section::{AnalyzerSettings, RunParams, SectionAnalyzer, SectionOutcome};
