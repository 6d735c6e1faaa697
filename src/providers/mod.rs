// src/providers/mod.rs
//! Data provider plug-in boundary: `resolve(symbol-or-category) → value or error`.
//! Which provider backs which category is decided by the registry, not here.

pub mod fixture;
pub mod http_json;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::model::Category;

pub use fixture::StaticProvider;
pub use http_json::HttpJsonProvider;

#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetch the current value for a symbol, indicator code or general topic.
    async fn resolve(&self, target: &str) -> Result<Value>;
    fn name(&self) -> &str;
    /// Confidence attached to data points from this provider.
    fn confidence(&self) -> f32 {
        1.0
    }
}

pub type DynProvider = Arc<dyn DataProvider>;

/// Category → provider.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    by_category: HashMap<Category, DynProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, category: Category, provider: DynProvider) -> &mut Self {
        self.by_category.insert(category, provider);
        self
    }

    pub fn with(mut self, category: Category, provider: DynProvider) -> Self {
        self.register(category, provider);
        self
    }

    pub fn get(&self, category: Category) -> Option<&DynProvider> {
        self.by_category.get(&category)
    }

    pub fn categories(&self) -> Vec<Category> {
        let mut v: Vec<Category> = self.by_category.keys().copied().collect();
        v.sort();
        v
    }

    pub fn is_empty(&self) -> bool {
        self.by_category.is_empty()
    }

    /// HTTP providers from `[[providers]]` config entries.
    pub fn from_config(entries: &[ProviderConfig]) -> Result<Self> {
        let mut reg = Self::new();
        for entry in entries {
            let provider = HttpJsonProvider::from_config(entry)?;
            reg.register(entry.category, Arc::new(provider));
        }
        Ok(reg)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut m = f.debug_map();
        for c in self.categories() {
            if let Some(p) = self.by_category.get(&c) {
                m.entry(&c.as_str(), &p.name());
            }
        }
        m.finish()
    }
}
