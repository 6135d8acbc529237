//! Language-model access.
//!
//! This module provides the model client contract, the HTTP client for
//! OpenAI-compatible servers, and the model-list cache.

pub mod cache;
pub mod client;

pub use cache::{Clock, ModelListCache, SystemClock};
pub use client::{
    ClientConfig, GenerateOptions, Generation, LlmError, ModelClient, OpenAiCompatibleClient,
};
