// src/config.rs
//! Runtime configuration (TOML). Every section is optional.
//!
//! Resolution order:
//! 1) $ENRICH_CONFIG_PATH
//! 2) config/enricher.toml
//! 3) built-in defaults
//!
//! `ENRICH_EXTRACTOR` overrides `extractor.backend` after loading.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::MergePolicy;
use crate::cache::{DEFAULT_MAX_SIZE, DEFAULT_TTL_SECS};
use crate::extract::ExtractorBackend;
use crate::model::Category;

const ENV_PATH: &str = "ENRICH_CONFIG_PATH";
const ENV_EXTRACTOR: &str = "ENRICH_EXTRACTOR";
const DEFAULT_PATH: &str = "config/enricher.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnricherConfig {
    pub cache: CacheConfig,
    pub aggregator: AggregatorConfig,
    pub extractor: ExtractorConfig,
    pub compliance: ComplianceConfig,
    pub metrics: MetricsConfig,
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_size: usize,
    pub default_ttl_secs: u64,
    /// 0 disables the background sweeper.
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            default_ttl_secs: DEFAULT_TTL_SECS,
            cleanup_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub provider_timeout_ms: u64,
    pub merge_policy: MergePolicy,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            provider_timeout_ms: 5000,
            merge_policy: MergePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub backend: ExtractorBackend,
    /// Use the pattern backend when the LLM backend fails its health check.
    pub fallback_to_pattern: bool,
    pub model: String,
    /// "ENV" means: read OPENAI_API_KEY
    pub api_key: String,
    /// Callers truncate input to this many chars before extraction.
    pub max_text_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            backend: ExtractorBackend::Pattern,
            fallback_to_pattern: true,
            model: "gpt-4o-mini".to_string(),
            api_key: "ENV".to_string(),
            max_text_chars: 20_000,
        }
    }
}

impl ExtractorConfig {
    pub fn resolve_api_key(&self) -> Result<String> {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            std::env::var("OPENAI_API_KEY").map_err(|_| anyhow!("Missing OPENAI_API_KEY env var"))
        } else {
            Ok(self.api_key.clone())
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    pub extra_guarantee_terms: Vec<String>,
    pub extra_directive_terms: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub listen: Option<SocketAddr>,
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub category: Category,
    pub name: String,
    /// URL template containing `{target}`.
    pub url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl EnricherConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: EnricherConfig = toml::from_str(s).context("parsing enricher config")?;
        Ok(cfg)
    }

    /// Load, apply env overrides and validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading enricher config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        info!(target: "config", path = %path.display(), providers = cfg.providers.len(), "config loaded");
        Ok(cfg)
    }

    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var(ENV_EXTRACTOR) {
            self.extractor.backend = ExtractorBackend::parse(&v)
                .ok_or_else(|| anyhow!("{ENV_EXTRACTOR}: unknown backend {v:?}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.max_size == 0 {
            bail!("cache.max_size must be > 0");
        }
        if self.aggregator.provider_timeout_ms == 0 {
            bail!("aggregator.provider_timeout_ms must be > 0");
        }
        for p in &self.providers {
            if p.name.trim().is_empty() {
                bail!("provider for {} has an empty name", p.category);
            }
            if !p.url.contains("{target}") {
                bail!("provider {}: url must contain {{target}}", p.name);
            }
            if let Some(c) = p.confidence {
                if !(0.0..=1.0).contains(&c) {
                    bail!("provider {}: confidence {c} out of [0, 1]", p.name);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = EnricherConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.cache.max_size, 1000);
        assert_eq!(cfg.cache.default_ttl_secs, 3600);
        assert_eq!(cfg.aggregator.provider_timeout_ms, 5000);
        assert_eq!(cfg.aggregator.merge_policy, MergePolicy::LastSubmittedWins);
        assert_eq!(cfg.extractor.backend, ExtractorBackend::Pattern);
        assert!(cfg.extractor.fallback_to_pattern);
        assert!(cfg.metrics.listen.is_none());
        assert!(cfg.providers.is_empty());
        cfg.validate().unwrap();
    }

    #[test]
    fn full_toml_parses() {
        let s = r#"
            [cache]
            max_size = 10
            [aggregator]
            merge_policy = "highest_confidence"
            [extractor]
            backend = "llm"
            api_key = "sk-test"
            [compliance]
            extra_directive_terms = ["go all in"]
            [metrics]
            listen = "127.0.0.1:9100"
            [[providers]]
            category = "stock_data"
            name = "quotes"
            url = "https://example.invalid/q/{target}"
            confidence = 0.8
        "#;
        let cfg = EnricherConfig::from_toml_str(s).unwrap();
        assert_eq!(cfg.cache.max_size, 10);
        assert_eq!(cfg.cache.cleanup_interval_secs, 300);
        assert_eq!(cfg.aggregator.merge_policy, MergePolicy::HighestConfidence);
        assert_eq!(cfg.extractor.backend, ExtractorBackend::Llm);
        assert_eq!(cfg.extractor.resolve_api_key().unwrap(), "sk-test");
        assert_eq!(cfg.compliance.extra_directive_terms, vec!["go all in"]);
        assert_eq!(cfg.metrics.listen.unwrap().port(), 9100);
        assert_eq!(cfg.providers[0].category, Category::StockData);
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = EnricherConfig::default();
        cfg.cache.max_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = EnricherConfig::default();
        cfg.aggregator.provider_timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = EnricherConfig::default();
        cfg.providers.push(ProviderConfig {
            category: Category::StockData,
            name: "quotes".into(),
            url: "https://example.invalid/static".into(),
            api_key_env: None,
            confidence: None,
        });
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("{target}"));
    }

    #[test]
    fn unknown_category_fails_to_parse() {
        let s = r#"
            [[providers]]
            category = "weather"
            name = "w"
            url = "https://example.invalid/{target}"
        "#;
        assert!(EnricherConfig::from_toml_str(s).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_path_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);
        env::remove_var(ENV_EXTRACTOR);

        // nothing on disk → defaults
        let cfg = EnricherConfig::load_default().unwrap();
        assert_eq!(cfg.cache.max_size, 1000);

        let p = tmp.path().join("custom.toml");
        fs::write(&p, "[cache]\nmax_size = 7\n").unwrap();
        env::set_var(ENV_PATH, p.display().to_string());
        assert_eq!(EnricherConfig::load_default().unwrap().cache.max_size, 7);

        env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(EnricherConfig::load_default().is_err());
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }

    #[serial_test::serial]
    #[test]
    fn extractor_env_override() {
        env::remove_var(ENV_PATH);
        let mut cfg = EnricherConfig::default();
        env::set_var(ENV_EXTRACTOR, "llm");
        cfg.apply_env_overrides().unwrap();
        assert_eq!(cfg.extractor.backend, ExtractorBackend::Llm);

        env::set_var(ENV_EXTRACTOR, "quantum");
        assert!(cfg.apply_env_overrides().is_err());
        env::remove_var(ENV_EXTRACTOR);
    }
}
