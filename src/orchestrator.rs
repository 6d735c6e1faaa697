// src/orchestrator.rs
//! End-to-end enrichment run: extract → aggregate → format → compliance →
//! metrics.
//!
//! Aggregation absorbs per-task failures. Invalid extractor output, a
//! formatter error or a compliance scanner error fails the whole run.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::aggregate::DataAggregator;
use crate::cache::SharedCache;
use crate::compliance::ComplianceScanner;
use crate::context::EnrichmentContext;
use crate::error::PipelineError;
use crate::extract::ClaimExtractor;
use crate::format::Formatter;
use crate::metrics::{ensure_metrics_described, PIPELINE_FAILURES, PIPELINE_MS, PIPELINE_RUNS};
use crate::model::{Category, Claim, DataPoint, EnrichmentMetrics, EnrichmentRequest, EnrichmentResponse};

/// Short stable id for logs, so raw content never hits the log stream.
pub(crate) fn content_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Requested categories in request order, then claim-implied ones in claim
/// order. Unknown names are dropped with a warning.
pub fn resolve_categories(requested: &[String], claims: &[Claim]) -> Vec<Category> {
    let mut out: Vec<Category> = Vec::new();
    for name in requested {
        match Category::parse(name) {
            Some(c) if !out.contains(&c) => out.push(c),
            Some(_) => {}
            None => warn!(target: "enrich", category = %name, "ignoring unknown enrichment type"),
        }
    }
    for claim in claims {
        for c in claim.claim_type.categories(!claim.entities.is_empty()) {
            if !out.contains(&c) {
                out.push(c);
            }
        }
    }
    out
}

#[derive(Clone)]
pub struct Enricher {
    extractor: ClaimExtractor,
    aggregator: Arc<DataAggregator>,
    cache: SharedCache<DataPoint>,
    formatter: Arc<dyn Formatter>,
    scanner: Arc<dyn ComplianceScanner>,
}

impl Enricher {
    pub fn new(ctx: &EnrichmentContext) -> Self {
        Self {
            extractor: ctx.extractor.clone(),
            aggregator: ctx.aggregator.clone(),
            cache: ctx.cache.clone(),
            formatter: ctx.formatter.clone(),
            scanner: ctx.scanner.clone(),
        }
    }

    pub async fn enrich(&self, req: &EnrichmentRequest) -> Result<EnrichmentResponse, PipelineError> {
        ensure_metrics_described();
        counter!(PIPELINE_RUNS).increment(1);
        let started = Instant::now();
        let id = content_id(&req.content);

        let res = self.run(req, &id, started).await;
        histogram!(PIPELINE_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        if let Err(e) = &res {
            counter!(PIPELINE_FAILURES).increment(1);
            warn!(target: "enrich", content_id = %id, error = %e, "enrichment failed");
        }
        res
    }

    async fn run(
        &self,
        req: &EnrichmentRequest,
        id: &str,
        started: Instant,
    ) -> Result<EnrichmentResponse, PipelineError> {
        let content = req.content.as_str();
        if content.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("content is empty".into()));
        }

        let claims = self.extractor.extract(content).await;
        for claim in &claims {
            claim
                .check_against(content)
                .map_err(|why| PipelineError::Extraction(format!("{why}: {:?}", claim.text)))?;
        }

        let categories = resolve_categories(&req.enrichment_types, &claims);
        let data = self.aggregator.gather(&claims, &categories).await;

        let enriched_content = self
            .formatter
            .format(content, &claims, &data.table, &req.format_style)?;

        let compliance_warnings = if req.include_compliance {
            self.scanner.scan(&claims)?
        } else {
            Vec::new()
        };

        let metrics = EnrichmentMetrics {
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            claims_processed: claims.len(),
            data_sources_used: data.sources.len(),
            cache_hit_rate: self.cache.stats().hit_rate(),
        };

        info!(
            target: "enrich",
            content_id = %id,
            backend = self.extractor.backend_name(),
            claims = claims.len(),
            data_points = data.table.len(),
            failed_tasks = data.failures.len(),
            sources = metrics.data_sources_used,
            hit_rate = metrics.cache_hit_rate,
            elapsed_ms = metrics.processing_time_ms,
            "enrichment complete"
        );

        Ok(EnrichmentResponse {
            original_content: req.content.clone(),
            enriched_content,
            data_points: data.data_points(),
            data_sources: data.sources,
            claims,
            compliance_warnings,
            metrics,
        })
    }
}
