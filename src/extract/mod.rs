// src/extract/mod.rs
//! Claim extraction: raw text → typed claims in source order.
//!
//! The backend is chosen once, when the extractor is built, from an explicit
//! `ExtractorBackend` variant. Extraction never fails past this boundary: a
//! backend that cannot produce claims logs and returns an empty list.

pub mod llm;
pub mod patterns;
pub mod tickers;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::Claim;

pub use llm::{CompletionClient, LlmExtractor, OpenAiClient, ScriptedClient};
pub use patterns::PatternExtractor;

#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Claims in source order; empty on any internal failure.
    async fn extract(&self, text: &str) -> Vec<Claim>;
    /// Whether the backend can serve requests right now.
    async fn health_check(&self) -> bool {
        true
    }
    fn name(&self) -> &'static str;
}

/// Named extraction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorBackend {
    #[default]
    Pattern,
    Llm,
}

impl ExtractorBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pattern" | "regex" => Some(Self::Pattern),
            "llm" | "openai" => Some(Self::Llm),
            _ => None,
        }
    }
}

/// The selected backend behind a stable handle.
#[derive(Clone)]
pub struct ClaimExtractor {
    backend: Arc<dyn ExtractionBackend>,
}

impl ClaimExtractor {
    pub fn pattern() -> Self {
        Self::with_backend(Arc::new(PatternExtractor::new()))
    }

    pub fn llm(client: Arc<dyn CompletionClient>) -> Self {
        Self::with_backend(Arc::new(LlmExtractor::new(client)))
    }

    pub fn with_backend(backend: Arc<dyn ExtractionBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn health_check(&self) -> bool {
        self.backend.health_check().await
    }

    pub async fn extract(&self, text: &str) -> Vec<Claim> {
        let mut claims = self.backend.extract(text).await;
        claims.sort_by_key(|c| c.start);
        debug!(target: "extract", backend = self.backend.name(), count = claims.len(), "claims extracted");
        claims
    }
}

impl std::fmt::Debug for ClaimExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimExtractor")
            .field("backend", &self.backend.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse() {
        assert_eq!(ExtractorBackend::parse("Pattern"), Some(ExtractorBackend::Pattern));
        assert_eq!(ExtractorBackend::parse(" llm "), Some(ExtractorBackend::Llm));
        assert_eq!(ExtractorBackend::parse("advanced"), None);
    }

    #[tokio::test]
    async fn pattern_extractor_is_always_healthy() {
        let ex = ClaimExtractor::pattern();
        assert!(ex.health_check().await);
        assert_eq!(ex.backend_name(), "pattern");
        let claims = ex.extract("AAPL trades at $10").await;
        assert_eq!(claims.len(), 1);
    }

    #[tokio::test]
    async fn llm_extractor_uses_scripted_reply() {
        let client = Arc::new(ScriptedClient::new(
            r#"[{"text":"NVDA is priced at $900","claim_type":"stock_price","entities":["NVDA"],"confidence":0.95}]"#,
        ));
        let ex = ClaimExtractor::llm(client);
        let claims = ex.extract("Today NVDA is priced at $900.").await;
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].start, 6);
    }
}
