//! Generic HTTP provider: GET a URL template with `{target}` substituted and
//! use the JSON body as the value. Provider-specific wire formats stay out of
//! the pipeline; whatever JSON comes back is stored as-is.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::DataProvider;
use crate::config::ProviderConfig;

pub struct HttpJsonProvider {
    name: String,
    url_template: String,
    api_key: Option<String>,
    confidence: f32,
    client: reqwest::Client,
}

impl HttpJsonProvider {
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("claim-enricher/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            name: name.into(),
            url_template: url_template.into(),
            api_key: None,
            confidence: 1.0,
            client,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Build from a `[[providers]]` entry. A configured `api_key_env` that is
    /// unset is an error, not a silently anonymous provider.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let mut p = Self::new(cfg.name.clone(), cfg.url.clone())?;
        if let Some(var) = &cfg.api_key_env {
            let key = std::env::var(var)
                .with_context(|| format!("provider {}: missing {var} env var", cfg.name))?;
            p = p.with_api_key(key);
        }
        if let Some(c) = cfg.confidence {
            p = p.with_confidence(c);
        }
        Ok(p)
    }

    pub fn url_for(&self, target: &str) -> Result<String> {
        let ok = !target.is_empty()
            && target
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !ok {
            bail!("{}: refusing unsafe target {target:?}", self.name);
        }
        Ok(self.url_template.replace("{target}", target))
    }
}

#[async_trait]
impl DataProvider for HttpJsonProvider {
    async fn resolve(&self, target: &str) -> Result<Value> {
        let url = self.url_for(target)?;
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("{} GET {url}", self.name))?
            .error_for_status()
            .with_context(|| format!("{} status for {target}", self.name))?;
        resp.json::<Value>()
            .await
            .with_context(|| format!("{} body for {target}", self.name))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_template_substitution_and_target_guard() {
        let p = HttpJsonProvider::new("quotes", "https://example.invalid/q/{target}?f=json").unwrap();
        assert_eq!(
            p.url_for("BRK.B").unwrap(),
            "https://example.invalid/q/BRK.B?f=json"
        );
        assert!(p.url_for("../admin").is_err());
        assert!(p.url_for("").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn from_config_requires_declared_key_env() {
        std::env::remove_var("ENRICH_TEST_MISSING_KEY");
        let cfg = ProviderConfig {
            category: crate::model::Category::StockData,
            name: "quotes".into(),
            url: "https://example.invalid/{target}".into(),
            api_key_env: Some("ENRICH_TEST_MISSING_KEY".into()),
            confidence: None,
        };
        assert!(HttpJsonProvider::from_config(&cfg).is_err());

        std::env::set_var("ENRICH_TEST_MISSING_KEY", "k");
        assert!(HttpJsonProvider::from_config(&cfg).is_ok());
        std::env::remove_var("ENRICH_TEST_MISSING_KEY");
    }
}
