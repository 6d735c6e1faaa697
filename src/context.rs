// src/context.rs
//! Shared pipeline components, built once at startup and injected into every
//! `Enricher`. The extraction backend is settled here: an LLM backend that
//! fails its health check is replaced by the pattern backend only when
//! `extractor.fallback_to_pattern` allows it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::aggregate::DataAggregator;
use crate::cache::{spawn_cleanup_task, SharedCache, TtlCache};
use crate::clock::{SharedClock, SystemClock};
use crate::compliance::{ComplianceScanner, KeywordScanner};
use crate::config::EnricherConfig;
use crate::extract::{ClaimExtractor, CompletionClient, ExtractorBackend, OpenAiClient};
use crate::format::{AnnotatingFormatter, Formatter};
use crate::model::{Category, DataPoint};
use crate::providers::{DynProvider, ProviderRegistry};

pub struct EnrichmentContext {
    pub config: EnricherConfig,
    pub clock: SharedClock,
    pub cache: SharedCache<DataPoint>,
    pub extractor: ClaimExtractor,
    pub aggregator: Arc<DataAggregator>,
    pub formatter: Arc<dyn Formatter>,
    pub scanner: Arc<dyn ComplianceScanner>,
}

impl EnrichmentContext {
    pub fn builder(config: EnricherConfig) -> EnrichmentContextBuilder {
        EnrichmentContextBuilder::new(config)
    }

    /// Background sweeper for expired cache entries; `None` when disabled.
    pub fn spawn_cache_cleanup(&self) -> Option<JoinHandle<()>> {
        match self.config.cache.cleanup_interval_secs {
            0 => None,
            secs => Some(spawn_cleanup_task(
                self.cache.clone(),
                Duration::from_secs(secs),
            )),
        }
    }
}

impl std::fmt::Debug for EnrichmentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentContext")
            .field("extractor", &self.extractor)
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

pub struct EnrichmentContextBuilder {
    config: EnricherConfig,
    clock: Option<SharedClock>,
    cache: Option<SharedCache<DataPoint>>,
    providers: Vec<(Category, DynProvider)>,
    completion_client: Option<Arc<dyn CompletionClient>>,
    formatter: Option<Arc<dyn Formatter>>,
    scanner: Option<Arc<dyn ComplianceScanner>>,
}

impl EnrichmentContextBuilder {
    pub fn new(config: EnricherConfig) -> Self {
        Self {
            config,
            clock: None,
            cache: None,
            providers: Vec::new(),
            completion_client: None,
            formatter: None,
            scanner: None,
        }
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cache(mut self, cache: SharedCache<DataPoint>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Registered after (and overriding) providers from config.
    pub fn provider(mut self, category: Category, provider: DynProvider) -> Self {
        self.providers.push((category, provider));
        self
    }

    /// Used instead of an `OpenAiClient` when the LLM backend is selected.
    pub fn completion_client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.completion_client = Some(client);
        self
    }

    pub fn formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn scanner(mut self, scanner: Arc<dyn ComplianceScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub async fn build(self) -> Result<EnrichmentContext> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(TtlCache::new(
                config.cache.max_size,
                config.cache.default_ttl_secs,
                clock.clone(),
            ))
        });

        let mut registry = ProviderRegistry::from_config(&config.providers)?;
        for (category, provider) in self.providers {
            registry.register(category, provider);
        }
        if registry.is_empty() {
            warn!(target: "config", "no data providers registered; enrichment will only annotate claims");
        }

        let extractor = select_extractor(&config, self.completion_client).await?;

        let scanner: Arc<dyn ComplianceScanner> = match self.scanner {
            Some(s) => s,
            None => Arc::new(
                KeywordScanner::new(
                    &config.compliance.extra_guarantee_terms,
                    &config.compliance.extra_directive_terms,
                )
                .context("compiling compliance keyword families")?,
            ),
        };
        let formatter = self
            .formatter
            .unwrap_or_else(|| Arc::new(AnnotatingFormatter::new()));

        let aggregator = DataAggregator::new(cache.clone(), registry, clock.clone())
            .with_timeout(Duration::from_millis(config.aggregator.provider_timeout_ms))
            .with_policy(config.aggregator.merge_policy);

        info!(
            target: "config",
            extractor = extractor.backend_name(),
            policy = ?aggregator.policy(),
            cache_max = config.cache.max_size,
            "enrichment context ready"
        );

        Ok(EnrichmentContext {
            config,
            clock,
            cache,
            extractor,
            aggregator: Arc::new(aggregator),
            formatter,
            scanner,
        })
    }
}

async fn select_extractor(
    config: &EnricherConfig,
    client: Option<Arc<dyn CompletionClient>>,
) -> Result<ClaimExtractor> {
    if config.extractor.backend == ExtractorBackend::Pattern {
        return Ok(ClaimExtractor::pattern());
    }
    let fallback = config.extractor.fallback_to_pattern;

    let client: Arc<dyn CompletionClient> = match client {
        Some(c) => c,
        None => {
            let built = config
                .extractor
                .resolve_api_key()
                .and_then(|key| OpenAiClient::new(key, config.extractor.model.clone()));
            match built {
                Ok(c) => Arc::new(c),
                Err(e) if fallback => {
                    warn!(target: "extract", error = %e, "LLM client unavailable; using pattern backend");
                    return Ok(ClaimExtractor::pattern());
                }
                Err(e) => return Err(e.context("building LLM client")),
            }
        }
    };

    let extractor = ClaimExtractor::llm(client);
    if extractor.health_check().await {
        return Ok(extractor);
    }
    if fallback {
        warn!(target: "extract", "LLM backend failed health check; using pattern backend");
        Ok(ClaimExtractor::pattern())
    } else {
        bail!("LLM backend failed health check and fallback_to_pattern is disabled")
    }
}
