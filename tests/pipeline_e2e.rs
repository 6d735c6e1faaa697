//! End-to-end enrichment runs against mocked providers.
//!
//! Covered:
//! - stock claim + guarantee language → data point from the mock provider and
//!   a compliance warning
//! - warm second run reports a higher cache hit rate
//! - pipeline-level failures: empty content, unknown style, bad extractor
//!   output, scanner error
//! - provider failures stay partial

use std::sync::Arc;

use async_trait::async_trait;
use claim_enricher::compliance::ComplianceScanner;
use claim_enricher::extract::ExtractionBackend;
use claim_enricher::{
    Category, Claim, ClaimExtractor, ClaimType, ComplianceError, Enricher, EnricherConfig,
    EnrichmentContext, EnrichmentRequest, ManualClock, PipelineError, SharedClock, StaticProvider,
};
use serde_json::json;

const CONTENT: &str =
    "AAPL stock is currently trading at $150. Tesla is guaranteed to rise by 20% next month.";

async fn context() -> EnrichmentContext {
    let clock: SharedClock = Arc::new(ManualClock::fixed());
    EnrichmentContext::builder(EnricherConfig::default())
        .clock(clock)
        .provider(
            Category::StockData,
            Arc::new(
                StaticProvider::new("mock-quotes")
                    .with_value("AAPL", json!({"price": 151.25}))
                    .with_value("TSLA", json!({"price": 242.0})),
            ),
        )
        .provider(
            Category::MarketContext,
            Arc::new(StaticProvider::new("mock-context").with_fallback(json!("risk-on"))),
        )
        .build()
        .await
        .expect("build context")
}

#[tokio::test]
async fn stock_claim_and_guarantee_language() {
    let ctx = context().await;
    let enricher = Enricher::new(&ctx);

    let resp = enricher
        .enrich(&EnrichmentRequest::new(CONTENT))
        .await
        .expect("enrich");

    assert_eq!(resp.original_content, CONTENT);
    assert_eq!(resp.claims.len(), 2);
    assert_eq!(resp.claims[0].claim_type, ClaimType::StockPrice);
    assert_eq!(resp.claims[0].entities, vec!["AAPL"]);
    assert_eq!(resp.claims[1].claim_type, ClaimType::MarketPerformance);
    assert_eq!(resp.claims[1].entities, vec!["TSLA"]);

    let aapl = resp
        .data_points
        .iter()
        .find(|dp| dp.symbol.as_deref() == Some("AAPL") && dp.data_type == "stock_data")
        .expect("AAPL quote");
    assert_eq!(aapl.source, "mock-quotes");
    assert_eq!(aapl.value, json!({"price": 151.25}));
    assert!(resp.data_sources.contains(&"mock-quotes".to_string()));
    assert_eq!(resp.metrics.data_sources_used, resp.data_sources.len());

    assert!(!resp.compliance_warnings.is_empty());
    assert!(resp
        .compliance_warnings
        .iter()
        .any(|w| w.contains("guaranteed")));

    assert!(resp
        .enriched_content
        .contains("[AAPL: 151.25 via mock-quotes]"));
    assert_eq!(resp.metrics.claims_processed, 2);
}

#[tokio::test]
async fn warm_run_has_higher_hit_rate() {
    let ctx = context().await;
    let enricher = Enricher::new(&ctx);
    let req = EnrichmentRequest::new(CONTENT);

    let cold = enricher.enrich(&req).await.expect("cold");
    let warm = enricher.enrich(&req).await.expect("warm");

    assert_eq!(cold.metrics.cache_hit_rate, 0.0);
    assert!(warm.metrics.cache_hit_rate > cold.metrics.cache_hit_rate);
    assert_eq!(cold.data_points, warm.data_points);
    assert_eq!(cold.claims, warm.claims);
}

#[tokio::test]
async fn compliance_can_be_switched_off() {
    let ctx = context().await;
    let resp = Enricher::new(&ctx)
        .enrich(&EnrichmentRequest::new(CONTENT).include_compliance(false))
        .await
        .expect("enrich");
    assert!(resp.compliance_warnings.is_empty());
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let ctx = context().await;
    let err = Enricher::new(&ctx)
        .enrich(&EnrichmentRequest::new("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));
}

#[tokio::test]
async fn unknown_style_fails_the_run() {
    let ctx = context().await;
    let err = Enricher::new(&ctx)
        .enrich(&EnrichmentRequest::new(CONTENT).format_style("poster"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Format(_)));
}

#[tokio::test]
async fn footnote_and_summary_styles() {
    let ctx = context().await;
    let enricher = Enricher::new(&ctx);

    let foot = enricher
        .enrich(&EnrichmentRequest::new(CONTENT).format_style("footnote"))
        .await
        .expect("footnote");
    assert!(foot.enriched_content.contains("[1]"));
    assert!(foot.enriched_content.contains("\n\nSources:\n"));

    let summary = enricher
        .enrich(&EnrichmentRequest::new(CONTENT).format_style("summary"))
        .await
        .expect("summary");
    assert!(summary.enriched_content.starts_with(CONTENT));
    assert!(summary.enriched_content.contains("Market data:"));
}

#[tokio::test]
async fn failing_provider_keeps_partial_data() {
    let clock: SharedClock = Arc::new(ManualClock::fixed());
    let ctx = EnrichmentContext::builder(EnricherConfig::default())
        .clock(clock)
        .provider(
            Category::StockData,
            Arc::new(
                StaticProvider::new("mock-quotes")
                    .with_value("AAPL", json!(150))
                    .failing("TSLA"),
            ),
        )
        .build()
        .await
        .expect("build");

    let resp = Enricher::new(&ctx)
        .enrich(&EnrichmentRequest::new(CONTENT).enrichment_types(["stock_data"]))
        .await
        .expect("partial data is not a pipeline failure");
    let symbols: Vec<_> = resp
        .data_points
        .iter()
        .filter_map(|dp| dp.symbol.as_deref())
        .collect();
    assert_eq!(symbols, vec!["AAPL"]);
}

struct BrokenBackend;

#[async_trait]
impl ExtractionBackend for BrokenBackend {
    async fn extract(&self, text: &str) -> Vec<Claim> {
        let len = text.chars().count();
        vec![Claim::new("ghost", ClaimType::StockPrice, len, len + 5)]
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

#[tokio::test]
async fn invalid_extractor_output_is_a_pipeline_failure() {
    let mut ctx = context().await;
    ctx.extractor = ClaimExtractor::with_backend(Arc::new(BrokenBackend));
    let err = Enricher::new(&ctx)
        .enrich(&EnrichmentRequest::new(CONTENT))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Extraction(_)));
}

struct FailingScanner;

impl ComplianceScanner for FailingScanner {
    fn scan(&self, _claims: &[Claim]) -> Result<Vec<String>, ComplianceError> {
        let source = regex::Regex::new("(").unwrap_err();
        Err(ComplianceError::InvalidPattern {
            family: "custom",
            source,
        })
    }
}

#[tokio::test]
async fn scanner_error_propagates() {
    let clock: SharedClock = Arc::new(ManualClock::fixed());
    let ctx = EnrichmentContext::builder(EnricherConfig::default())
        .clock(clock)
        .scanner(Arc::new(FailingScanner))
        .build()
        .await
        .expect("build");
    let err = Enricher::new(&ctx)
        .enrich(&EnrichmentRequest::new(CONTENT))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Compliance(_)));

    // skipped scan cannot fail
    let ok = Enricher::new(&ctx)
        .enrich(&EnrichmentRequest::new(CONTENT).include_compliance(false))
        .await;
    assert!(ok.is_ok());
}
