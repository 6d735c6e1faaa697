//! Fixture-backed provider for tests and offline runs. Supports per-target
//! delays and injected failures so fan-out ordering and isolation can be
//! exercised deterministically.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::DataProvider;

pub struct StaticProvider {
    name: String,
    values: HashMap<String, Value>,
    fallback: Option<Value>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    confidence: f32,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
            fallback: None,
            failing: HashSet::new(),
            delays: HashMap::new(),
            confidence: 1.0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_value(mut self, target: impl Into<String>, value: Value) -> Self {
        self.values.insert(target.into(), value);
        self
    }

    /// Returned for targets without an explicit fixture.
    pub fn with_fallback(mut self, value: Value) -> Self {
        self.fallback = Some(value);
        self
    }

    pub fn failing(mut self, target: impl Into<String>) -> Self {
        self.failing.insert(target.into());
        self
    }

    pub fn with_delay(mut self, target: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(target.into(), delay);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Number of `resolve` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataProvider for StaticProvider {
    async fn resolve(&self, target: &str) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(target) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(target) {
            bail!("{}: upstream error for {target}", self.name);
        }
        match self.values.get(target).or(self.fallback.as_ref()) {
            Some(v) => Ok(v.clone()),
            None => bail!("{}: no data for {target}", self.name),
        }
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
    use serde_json::json;

    #[tokio::test]
    async fn serves_fixtures_fallbacks_and_failures() {
        let p = StaticProvider::new("quotes")
            .with_value("AAPL", json!({"price": 151.2}))
            .with_fallback(json!({"price": 1.0}))
            .failing("BADSYM");

        assert_eq!(p.resolve("AAPL").await.unwrap(), json!({"price": 151.2}));
        assert_eq!(p.resolve("ZZZ").await.unwrap(), json!({"price": 1.0}));
        assert!(p.resolve("BADSYM").await.is_err());
        assert_eq!(p.calls(), 3);
    }

    #[tokio::test]
    async fn missing_fixture_without_fallback_is_an_error() {
        let p = StaticProvider::new("fred");
        let err = p.resolve("CPI").await.unwrap_err();
        assert!(err.to_string().contains("no data for CPI"));
    }
}
