//! Error types for the enrichment pipeline.
//!
//! Per-task fetch failures are isolated inside the aggregator; everything else
//! escalates to the caller as a `PipelineError`.

use thiserror::Error;

use crate::model::Category;

/// Why one fan-out task produced no data.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no provider registered for category {0}")]
    NoProvider(Category),

    #[error("provider {provider} failed: {source:#}")]
    Provider {
        provider: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("provider {provider} timed out after {after_ms}ms")]
    Timeout { provider: String, after_ms: u64 },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormatError {
    #[error("unknown format style: {0}")]
    UnknownStyle(String),

    #[error("claim span {start}..{end} is outside content of {len} chars")]
    SpanOutOfBounds { start: usize, end: usize, len: usize },
}

#[derive(Error, Debug)]
pub enum ComplianceError {
    #[error("invalid compliance pattern for family {family}: {source}")]
    InvalidPattern {
        family: &'static str,
        #[source]
        source: regex::Error,
    },
}

/// Unrecovered failure of one pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("formatting failed: {0}")]
    Format(#[from] FormatError),

    #[error("compliance scan failed: {0}")]
    Compliance(#[from] ComplianceError),
}
