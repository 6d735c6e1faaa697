//! Deterministic pattern backend. No network, no configuration.
//!
//! Pattern families, in precedence order (an overlapping later match is dropped):
//! 1. price quotes: "AAPL stock is currently trading at $150", "Apple's stock is priced at $150.25"
//! 2. percentage predictions: "Apple stock will increase by 50%"
//! 3. company fundamentals: "Apple's revenue was $94.8 billion"
//! 4. sector moves: "technology sector rose 2.1%"
//! 5. macro percentages: "inflation is 3.2%", "the 10-year yield hit 4.5%"
//!
//! Regexes must be compatible with the `regex` crate (no lookarounds).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::tickers::{indicator_code, is_plausible_ticker, resolve_subject, sector_symbol};
use super::ExtractionBackend;
use crate::model::{Claim, ClaimForm, ClaimType};

static RE_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        (?:\b(?P<name>[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)(?:'s)?\s+)?
        (?:\(?\b(?P<ticker>[A-Z]{1,5})\)?\s+)?
        (?:(?i:stock|shares)\s+)?
        (?:(?i:is|are)\s+)?
        (?:(?i:currently)\s+)?
        (?i:trading|trades|traded|trade|priced|valued)\s+
        (?i:at)\s+
        \$(?P<amount>\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)
        ",
    )
    .expect("price regex")
});

static RE_PREDICTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b
        (?P<subject>[A-Z][A-Za-z&.\-]*(?:\s+[A-Z][A-Za-z&.\-]*)*)(?:'s)?
        (?:\s+\((?P<ticker>[A-Z]{1,5})\))?
        (?:\s+(?i:stock|shares))?
        \s+(?i:will|could|may|should|is\s+going\s+to|are\s+going\s+to|is\s+expected\s+to|are\s+expected\s+to|is\s+guaranteed\s+to|are\s+guaranteed\s+to|is\s+set\s+to)
        \s+(?P<direction>(?i:increase|rise|grow|gain|climb|jump|surge|soar|decrease|fall|drop|decline|sink|plunge|lose))
        (?:\s+(?i:by))?
        \s+(?P<pct>\d+(?:\.\d+)?)\s*%
        ",
    )
    .expect("prediction regex")
});

static RE_FUNDAMENTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b
        (?P<subject>[A-Z][A-Za-z&.\-]*(?:\s+[A-Z][A-Za-z&.\-]*)*)(?:'s)?
        \s+(?P<metric>(?i:p/e\s+ratio|pe\s+ratio|market\s+cap(?:italization)?|revenue|earnings\s+per\s+share|earnings|eps|net\s+income|profit\s+margin))
        \s+(?i:is|was|of|reached|hit|came\s+in\s+at|stands\s+at|rose\s+to|fell\s+to)
        \s+(?P<amount>\$?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)
        (?:\s*(?P<unit>(?i:trillion|billion|million)|%))?
        ",
    )
    .expect("fundamental regex")
});

static RE_SECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?xi)
        \b
        (?P<sector>technology|tech|energy|financials?|health\s*care|utilities|real\s+estate|consumer\s+staples|consumer\s+discretionary|industrials|materials|communication\s+services)
        \s+(?:sector|stocks|shares)
        (?:\s+(?:is|was|has|have))?
        \s+(?P<direction>up|down|rose|fell|gained|lost|climbed|dropped|jumped|slid|declined|advanced)
        (?:\s+by)?
        \s+(?P<pct>\d+(?:\.\d+)?)\s*%
        ",
    )
    .expect("sector regex")
});

static RE_MACRO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?xi)
        \b
        (?P<topic>core\s+inflation|inflation|cpi|fed\s+funds\s+rate|interest\s+rates?|unemployment(?:\s+rate)?|gdp(?:\s+growth)?|returns?|yields?)
        \b
        [^.%\d]{0,40}?
        (?P<pct>-?\d+(?:\.\d+)?)\s*%
        ",
    )
    .expect("macro regex")
});

type Builder = fn(&str, &Captures) -> Option<Claim>;

/// Regex-driven extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Claims in source order.
    pub fn extract_claims(&self, text: &str) -> Vec<Claim> {
        let mut accepted: Vec<(usize, usize, Claim)> = Vec::new();

        let families: [(&Regex, Builder); 5] = [
            (&*RE_PRICE, price_claim as Builder),
            (&*RE_PREDICTION, prediction_claim as Builder),
            (&*RE_FUNDAMENTAL, fundamental_claim as Builder),
            (&*RE_SECTOR, sector_claim as Builder),
            (&*RE_MACRO, macro_claim as Builder),
        ];

        for (re, build) in families {
            for caps in re.captures_iter(text) {
                let Some(m) = caps.get(0) else { continue };
                let (bs, be) = (m.start(), m.end());
                if accepted.iter().any(|(s, e, _)| bs < *e && *s < be) {
                    continue;
                }
                if let Some(claim) = build(text, &caps) {
                    accepted.push((bs, be, claim));
                }
            }
        }

        accepted.sort_by_key(|(s, _, _)| *s);
        accepted.into_iter().map(|(_, _, c)| c).collect()
    }
}

#[async_trait]
impl ExtractionBackend for PatternExtractor {
    async fn extract(&self, text: &str) -> Vec<Claim> {
        self.extract_claims(text)
    }

    fn name(&self) -> &'static str {
        "pattern"
    }
}

/// Byte span → character span.
fn char_span(text: &str, start: usize, end: usize) -> (usize, usize) {
    let s = text[..start].chars().count();
    let e = s + text[start..end].chars().count();
    (s, e)
}

fn base_claim(text: &str, caps: &Captures, claim_type: ClaimType) -> Option<Claim> {
    let m = caps.get(0)?;
    let (s, e) = char_span(text, m.start(), m.end());
    Some(Claim::new(m.as_str(), claim_type, s, e))
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim_start_matches('$').replace(',', "").parse().ok()
}

fn is_downward(direction: &str) -> bool {
    matches!(
        direction.to_ascii_lowercase().as_str(),
        "decrease" | "fall" | "drop" | "decline" | "sink" | "plunge" | "lose" | "down" | "fell"
            | "lost" | "dropped" | "slid" | "declined"
    )
}

fn signed_pct(pct: &str, down: bool) -> String {
    if down {
        format!("-{pct}%")
    } else {
        format!("{pct}%")
    }
}

fn price_claim(text: &str, caps: &Captures) -> Option<Claim> {
    let amount = parse_amount(caps.name("amount")?.as_str())?;
    let ticker = caps
        .name("ticker")
        .map(|m| m.as_str())
        .filter(|t| is_plausible_ticker(t));
    let name = caps.name("name").map(|m| m.as_str());
    if ticker.is_none() && name.is_none() {
        return None;
    }

    let (symbol, confidence) = match (ticker, name.and_then(resolve_subject)) {
        (Some(t), _) => (Some(t.to_string()), 0.9),
        (None, Some(resolved)) => (Some(resolved), 0.85),
        (None, None) => (None, 0.5),
    };

    Some(
        base_claim(text, caps, ClaimType::StockPrice)?
            .form(ClaimForm::Price)
            .entities(symbol)
            .value(format!("{amount:.2}"))
            .confidence(confidence),
    )
}

fn prediction_claim(text: &str, caps: &Captures) -> Option<Claim> {
    let pct = caps.name("pct")?.as_str();
    let direction = caps.name("direction")?.as_str();
    let symbol = match caps.name("ticker") {
        Some(t) => Some(t.as_str().to_string()),
        None => {
            let subject = caps.name("subject")?.as_str();
            // macro topics belong to the indicator family
            if indicator_code(subject).is_some() {
                return None;
            }
            resolve_subject(subject)
        }
    };
    let confidence = if symbol.is_some() { 0.7 } else { 0.5 };

    Some(
        base_claim(text, caps, ClaimType::MarketPerformance)?
            .form(ClaimForm::Prediction)
            .entities(symbol)
            .value(signed_pct(pct, is_downward(direction)))
            .confidence(confidence),
    )
}

fn fundamental_claim(text: &str, caps: &Captures) -> Option<Claim> {
    let symbol = resolve_subject(caps.name("subject")?.as_str())?;
    let amount = caps.name("amount")?.as_str();
    let value = match caps.name("unit").map(|u| u.as_str().to_ascii_lowercase()) {
        Some(u) if u == "%" => format!("{amount}%"),
        Some(u) => format!("{amount} {u}"),
        None => amount.to_string(),
    };

    Some(
        base_claim(text, caps, ClaimType::CompanyFundamental)?
            .form(ClaimForm::Metric)
            .entities([symbol])
            .value(value)
            .confidence(0.8),
    )
}

fn sector_claim(text: &str, caps: &Captures) -> Option<Claim> {
    let symbol = sector_symbol(caps.name("sector")?.as_str());
    let down = is_downward(caps.name("direction")?.as_str());
    let pct = caps.name("pct")?.as_str();

    Some(
        base_claim(text, caps, ClaimType::SectorPerformance)?
            .form(ClaimForm::Percentage)
            .entities(symbol)
            .value(signed_pct(pct, down))
            .confidence(0.75),
    )
}

fn macro_claim(text: &str, caps: &Captures) -> Option<Claim> {
    let topic = caps.name("topic")?.as_str();
    let pct = caps.name("pct")?.as_str();
    let code = indicator_code(topic);
    let claim_type = if code.is_some() {
        ClaimType::EconomicIndicator
    } else {
        ClaimType::MarketPerformance
    };

    Some(
        base_claim(text, caps, claim_type)?
            .form(ClaimForm::Percentage)
            .entities(code)
            .value(format!("{pct}%"))
            .confidence(0.7),
    )
}
