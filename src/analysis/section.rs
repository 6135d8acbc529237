//! Single-section analysis.
//!
//! A `SectionAnalyzer` turns one prompt into a `SectionAnalysis` plus the
//! `LlmInteraction` that produced it. Model failures and timeouts never
//! escape: they become fallback content and an interaction carrying the
//! error message.

use super::interpreter::{self, ResponseShape};
use super::prompts::{self, SummaryContext};
use crate::llm::{GenerateOptions, LlmError, ModelClient};
use crate::models::{Depth, LlmInteraction, SectionAnalysis, SUMMARY_SECTION};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tunables shared by every call in a run.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Upper bound on one model call, enforced here.
    pub timeout: Duration,
    pub max_section_chars: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: Some(4096),
            timeout: Duration::from_secs(120),
            max_section_chars: 10_000,
        }
    }
}

/// Per-analysis parameters.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub model: String,
    pub depth: Depth,
}

/// Output of one section step.
#[derive(Debug, Clone)]
pub struct SectionOutcome {
    pub analysis: SectionAnalysis,
    pub interaction: LlmInteraction,
}

/// Analyzes sections through a `ModelClient`.
#[derive(Clone)]
pub struct SectionAnalyzer {
    client: Arc<dyn ModelClient>,
    settings: AnalyzerSettings,
}

impl SectionAnalyzer {
    pub fn new(client: Arc<dyn ModelClient>, settings: AnalyzerSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Analyze one snapshot section, with data of related sections as context.
    pub async fn analyze_section(
        &self,
        section: &str,
        data: &Value,
        related: &[(String, Value)],
        params: &RunParams,
    ) -> SectionOutcome {
        let prompt = prompts::section_prompt(
            section,
            data,
            related,
            params.depth,
            self.settings.max_section_chars,
        );
        self.run(section, prompt, ResponseShape::Section, params).await
    }

    /// Produce the whole-system summary.
    pub async fn analyze_summary(&self, ctx: &SummaryContext<'_>, params: &RunParams) -> SectionOutcome {
        let prompt = prompts::summary_prompt(ctx);
        self.run(SUMMARY_SECTION, prompt, ResponseShape::Summary, params)
            .await
    }

    async fn run(
        &self,
        section: &str,
        prompt: String,
        shape: ResponseShape,
        params: &RunParams,
    ) -> SectionOutcome {
        let options = GenerateOptions {
            model: params.model.clone(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        info!("Analyzing section: {}", section);
        let timestamp = Utc::now();
        let started = Instant::now();

        let result = match tokio::time::timeout(
            self.settings.timeout,
            self.client.generate(&prompt, &options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                seconds: self.settings.timeout.as_secs(),
            }),
        };

        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(generation) => {
                let interpretation = interpreter::interpret(&generation.content, section, shape);
                debug!(
                    "Section {} answered in {}ms (fallback: {})",
                    section,
                    duration_ms,
                    interpretation.is_fallback()
                );

                SectionOutcome {
                    analysis: interpretation.into_analysis(),
                    interaction: LlmInteraction {
                        section: section.to_string(),
                        prompt,
                        response: Some(generation.content),
                        error: None,
                        model: generation.model,
                        timestamp,
                        tokens: generation.usage,
                        duration_ms,
                    },
                }
            }
            Err(e) => {
                warn!("Model call for section {} failed: {}", section, e);
                let reason = e.to_string();

                SectionOutcome {
                    analysis: interpreter::fallback(shape, section, &reason),
                    interaction: LlmInteraction {
                        section: section.to_string(),
                        prompt,
                        response: None,
                        error: Some(reason),
                        model: params.model.clone(),
                        timestamp,
                        tokens: None,
                        duration_ms,
                    },
                }
            }
        }
    }
}
