//! Symbol resolution: company names → tickers, sectors → SPDR sector ETFs,
//! macro topics → indicator series codes.
//!
//! Lookups are case-insensitive; multi-word subjects are resolved by trying
//! the longest word windows first ("The Apple" → "apple" → AAPL).

use std::collections::HashMap;

use once_cell::sync::Lazy;

static COMPANIES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("apple", "AAPL"),
        ("microsoft", "MSFT"),
        ("alphabet", "GOOGL"),
        ("google", "GOOGL"),
        ("amazon", "AMZN"),
        ("tesla", "TSLA"),
        ("meta", "META"),
        ("facebook", "META"),
        ("nvidia", "NVDA"),
        ("netflix", "NFLX"),
        ("jpmorgan", "JPM"),
        ("jp morgan", "JPM"),
        ("goldman sachs", "GS"),
        ("bank of america", "BAC"),
        ("berkshire hathaway", "BRK.B"),
        ("intel", "INTC"),
        ("amd", "AMD"),
        ("ibm", "IBM"),
        ("oracle", "ORCL"),
        ("salesforce", "CRM"),
        ("adobe", "ADBE"),
        ("disney", "DIS"),
        ("walmart", "WMT"),
        ("coca-cola", "KO"),
        ("boeing", "BA"),
        ("exxon", "XOM"),
        ("exxonmobil", "XOM"),
        ("chevron", "CVX"),
        ("pfizer", "PFE"),
        ("visa", "V"),
        ("mastercard", "MA"),
        ("nike", "NKE"),
        ("starbucks", "SBUX"),
        ("uber", "UBER"),
    ]
    .into_iter()
    .collect()
});

static SECTORS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("technology", "XLK"),
        ("tech", "XLK"),
        ("energy", "XLE"),
        ("financial", "XLF"),
        ("financials", "XLF"),
        ("healthcare", "XLV"),
        ("health care", "XLV"),
        ("utilities", "XLU"),
        ("real estate", "XLRE"),
        ("consumer staples", "XLP"),
        ("consumer discretionary", "XLY"),
        ("industrials", "XLI"),
        ("materials", "XLB"),
        ("communication services", "XLC"),
    ]
    .into_iter()
    .collect()
});

/// All-caps words that look like tickers but are not.
const NOT_TICKERS: &[&str] = &[
    "A", "I", "AI", "CEO", "CFO", "CTO", "US", "USA", "UK", "EU", "GDP", "CPI", "IPO", "ETF",
    "THE", "AND", "FED", "SEC", "YOY", "EPS", "PE", "Q1", "Q2", "Q3", "Q4", "NYSE", "IT",
];

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uppercase 1–5 letter token that is not a common acronym.
pub fn is_plausible_ticker(s: &str) -> bool {
    (1..=5).contains(&s.len())
        && s.chars().all(|c| c.is_ascii_uppercase())
        && !NOT_TICKERS.contains(&s)
}

/// Canonical ticker for a known company name.
pub fn company_ticker(name: &str) -> Option<&'static str> {
    COMPANIES.get(collapse_ws(name).to_lowercase().as_str()).copied()
}

/// Sector ETF symbol for a sector keyword.
pub fn sector_symbol(sector: &str) -> Option<&'static str> {
    SECTORS.get(collapse_ws(sector).to_lowercase().as_str()).copied()
}

/// Indicator series code for a macro topic keyword.
pub fn indicator_code(topic: &str) -> Option<&'static str> {
    let t = collapse_ws(topic).to_lowercase();
    if t.contains("inflation") || t == "cpi" {
        Some("CPI")
    } else if t.contains("fed funds") || t.starts_with("interest rate") {
        Some("FEDFUNDS")
    } else if t.starts_with("unemployment") {
        Some("UNRATE")
    } else if t.starts_with("gdp") {
        Some("GDP")
    } else {
        None
    }
}

/// Resolve a free-form subject ("AAPL", "Apple", "The Apple", "Apple's") to a ticker.
pub fn resolve_subject(subject: &str) -> Option<String> {
    let cleaned = subject
        .trim()
        .trim_end_matches("'s")
        .trim_matches(|c: char| !c.is_alphanumeric());
    if cleaned.is_empty() {
        return None;
    }
    if is_plausible_ticker(cleaned) {
        return Some(cleaned.to_string());
    }

    let words: Vec<&str> = cleaned.split_whitespace().collect();
    for n in (1..=words.len()).rev() {
        for window in words.windows(n) {
            let candidate = window.join(" ");
            if let Some(t) = company_ticker(&candidate) {
                return Some(t.to_string());
            }
            if n == 1 && is_plausible_ticker(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}
