//! Claim Enricher: binary entrypoint
//! Reads financial text from stdin, runs one enrichment pass and prints the
//! response as JSON on stdout.
//!
//! Env:
//!   ENRICH_TYPES       comma-separated categories (default stock_data,market_context)
//!   ENRICH_STYLE       inline | footnote | summary (default inline)
//!   ENRICH_COMPLIANCE  0 disables the compliance scan
//!   ENRICH_LOG_JSON    1 switches logs to JSON

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claim_enricher::{Enricher, EnricherConfig, EnrichmentContext, EnrichmentRequest};

/// Logs go to stderr so stdout stays pure JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("claim_enricher=info,warn"));
    let json = std::env::var("ENRICH_LOG_JSON").is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn request_from_env(content: String) -> EnrichmentRequest {
    let mut req = EnrichmentRequest::new(content);
    if let Ok(types) = std::env::var("ENRICH_TYPES") {
        req = req.enrichment_types(
            types
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        );
    }
    if let Ok(style) = std::env::var("ENRICH_STYLE") {
        req = req.format_style(style);
    }
    if let Ok(v) = std::env::var("ENRICH_COMPLIANCE") {
        req = req.include_compliance(!matches!(v.trim(), "0" | "false" | "off"));
    }
    req
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = EnricherConfig::load_default()?;
    if let Some(listen) = config.metrics.listen {
        claim_enricher::metrics::install_prometheus(listen)?;
    }

    let ctx = EnrichmentContext::builder(config).build().await?;
    let _sweeper = ctx.spawn_cache_cleanup();

    let mut content = String::new();
    tokio::io::stdin()
        .read_to_string(&mut content)
        .await
        .context("reading content from stdin")?;
    let max_chars = ctx.config.extractor.max_text_chars;
    if content.chars().count() > max_chars {
        content = content.chars().take(max_chars).collect();
    }

    let enricher = Enricher::new(&ctx);
    let response = enricher.enrich(&request_from_env(content)).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
