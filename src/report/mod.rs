//! Report derivation and rendering.

pub mod formatter;
pub mod generator;

pub use formatter::{format_report, DEFAULT_TOP_ISSUES};
pub use generator::{render_comparison, render_report, write_output, OutputFormat};
