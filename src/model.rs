//! # Data model
//! Claims, data points, enrichment categories and the request/response shapes
//! exchanged with the transport layer.
//!
//! Wire shapes use camelCase field names; enum tags use snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed claim vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    StockPrice,
    MarketPerformance,
    EconomicIndicator,
    CompanyFundamental,
    SectorPerformance,
    Unknown,
}

impl ClaimType {
    /// Lenient parse used for language-model output. Unrecognized → `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "stock_price" => ClaimType::StockPrice,
            "market_performance" | "prediction" => ClaimType::MarketPerformance,
            "economic_indicator" => ClaimType::EconomicIndicator,
            "company_fundamental" | "company_fundamentals" => ClaimType::CompanyFundamental,
            "sector_performance" => ClaimType::SectorPerformance,
            _ => ClaimType::Unknown,
        }
    }

    /// Enrichment categories a claim of this type drives.
    pub fn categories(self, has_symbols: bool) -> Vec<Category> {
        match self {
            ClaimType::StockPrice => vec![Category::StockData],
            ClaimType::CompanyFundamental => {
                vec![Category::CompanyFundamentals, Category::StockData]
            }
            ClaimType::EconomicIndicator => vec![Category::EconomicIndicators],
            ClaimType::SectorPerformance => vec![Category::SectorPerformance],
            ClaimType::MarketPerformance if has_symbols => {
                vec![Category::StockData, Category::MarketContext]
            }
            ClaimType::MarketPerformance => vec![Category::MarketContext],
            ClaimType::Unknown => Vec::new(),
        }
    }
}

/// Surface form the claim was phrased in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClaimForm {
    #[default]
    Statement,
    Price,
    Prediction,
    Percentage,
    Metric,
}

/// A typed assertion detected in text. Offsets are character offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub text: String,
    pub claim_type: ClaimType,
    #[serde(default)]
    pub form: ClaimForm,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub confidence: f32,
    pub start: usize,
    pub end: usize,
}

impl Claim {
    pub fn new(text: impl Into<String>, claim_type: ClaimType, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            claim_type,
            form: ClaimForm::Statement,
            entities: Vec::new(),
            value: None,
            confidence: 1.0,
            start,
            end,
        }
    }

    pub fn form(mut self, form: ClaimForm) -> Self {
        self.form = form;
        self
    }

    pub fn entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = entities.into_iter().map(Into::into).collect();
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Clamped into `[0.0, 1.0]`.
    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = clamp01(confidence);
        self
    }

    /// Checks the claim invariants against the text it was extracted from.
    pub fn check_against(&self, source: &str) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} out of [0, 1]", self.confidence));
        }
        let len = source.chars().count();
        if self.start > self.end || self.end > len {
            return Err(format!(
                "offsets {}..{} invalid for text of {} chars",
                self.start, self.end, len
            ));
        }
        Ok(())
    }
}

/// Requested enrichment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    StockData,
    EconomicIndicators,
    MarketContext,
    CompanyFundamentals,
    SectorPerformance,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::StockData,
        Category::EconomicIndicators,
        Category::MarketContext,
        Category::CompanyFundamentals,
        Category::SectorPerformance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::StockData => "stock_data",
            Category::EconomicIndicators => "economic_indicators",
            Category::MarketContext => "market_context",
            Category::CompanyFundamentals => "company_fundamentals",
            Category::SectorPerformance => "sector_performance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let norm = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == norm)
    }

    /// Categories that also get one claim-independent task when requested.
    pub fn is_general(self) -> bool {
        matches!(self, Category::EconomicIndicators | Category::MarketContext)
    }

    /// Volatile data is bucketed per hour; slow-moving data per day.
    pub fn hourly_bucket(self) -> bool {
        matches!(
            self,
            Category::StockData | Category::MarketContext | Category::SectorPerformance
        )
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fact obtained from a provider. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub source: String,
    pub data_type: String,
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub confidence: f32,
}

impl DataPoint {
    pub fn new(
        source: impl Into<String>,
        data_type: impl Into<String>,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            data_type: data_type.into(),
            value,
            timestamp,
            symbol: None,
            confidence: 1.0,
        }
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Clamped into `[0.0, 1.0]`.
    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = clamp01(confidence);
        self
    }
}

fn default_enrichment_types() -> Vec<String> {
    vec!["stock_data".to_string(), "market_context".to_string()]
}

fn default_format_style() -> String {
    "inline".to_string()
}

fn default_true() -> bool {
    true
}

/// Immutable pipeline input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRequest {
    pub content: String,
    #[serde(default = "default_enrichment_types")]
    pub enrichment_types: Vec<String>,
    #[serde(default = "default_true")]
    pub include_compliance: bool,
    #[serde(default = "default_format_style")]
    pub format_style: String,
}

impl EnrichmentRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            enrichment_types: default_enrichment_types(),
            include_compliance: true,
            format_style: default_format_style(),
        }
    }

    pub fn enrichment_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enrichment_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn include_compliance(mut self, on: bool) -> Self {
        self.include_compliance = on;
        self
    }

    pub fn format_style(mut self, style: impl Into<String>) -> Self {
        self.format_style = style.into();
        self
    }
}

/// Per-run snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentMetrics {
    pub processing_time_ms: f64,
    pub claims_processed: usize,
    pub data_sources_used: usize,
    pub cache_hit_rate: f64,
}

/// Built once per pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResponse {
    pub original_content: String,
    pub enriched_content: String,
    pub claims: Vec<Claim>,
    pub data_points: Vec<DataPoint>,
    pub data_sources: Vec<String>,
    pub compliance_warnings: Vec<String>,
    pub metrics: EnrichmentMetrics,
}

fn clamp01(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_confidence_is_clamped() {
        let c = Claim::new("x", ClaimType::Unknown, 0, 1).confidence(1.7);
        assert_eq!(c.confidence, 1.0);
        let c = Claim::new("x", ClaimType::Unknown, 0, 1).confidence(f32::NAN);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn check_against_uses_char_offsets() {
        let src = "€100 is AAPL";
        let c = Claim::new("AAPL", ClaimType::StockPrice, 8, 12);
        assert!(c.check_against(src).is_ok());
        let bad = Claim::new("AAPL", ClaimType::StockPrice, 8, 15);
        assert!(bad.check_against(src).is_err());
    }

    #[test]
    fn category_round_trips_through_str() {
        for c in Category::ALL {
            assert_eq!(Category::parse(c.as_str()), Some(c));
        }
        assert_eq!(Category::parse(" Stock_Data "), Some(Category::StockData));
        assert_eq!(Category::parse("weather"), None);
    }

    #[test]
    fn claim_type_lenient_parse() {
        assert_eq!(ClaimType::parse("Stock Price"), ClaimType::StockPrice);
        assert_eq!(ClaimType::parse("prediction"), ClaimType::MarketPerformance);
        assert_eq!(ClaimType::parse("gossip"), ClaimType::Unknown);
    }

    #[test]
    fn request_defaults_from_json() {
        let req: EnrichmentRequest =
            serde_json::from_str(r#"{"content":"AAPL trades at $1"}"#).unwrap();
        assert_eq!(req.enrichment_types, vec!["stock_data", "market_context"]);
        assert!(req.include_compliance);
        assert_eq!(req.format_style, "inline");
    }

    #[test]
    fn response_serializes_camel_case() {
        let resp = EnrichmentResponse {
            original_content: "a".into(),
            enriched_content: "a".into(),
            claims: vec![],
            data_points: vec![],
            data_sources: vec![],
            compliance_warnings: vec![],
            metrics: EnrichmentMetrics {
                processing_time_ms: 1.5,
                claims_processed: 0,
                data_sources_used: 0,
                cache_hit_rate: 0.0,
            },
        };
        let s = serde_json::to_string(&resp).unwrap();
        assert!(s.contains("\"originalContent\""));
        assert!(s.contains("\"cacheHitRate\""));
        assert!(s.contains("\"complianceWarnings\""));
    }
}
