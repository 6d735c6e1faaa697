//! Compliance scan: flag risky phrasing in claim texts.
//!
//! Two keyword families ship by default, guarantee language and unqualified
//! buy/sell directives. Extra terms from config are regex fragments appended
//! to a family's alternation.

use std::collections::HashSet;

use regex::Regex;

use crate::error::ComplianceError;
use crate::model::Claim;

pub trait ComplianceScanner: Send + Sync {
    /// Warnings in claim order, de-duplicated.
    fn scan(&self, claims: &[Claim]) -> Result<Vec<String>, ComplianceError>;
}

const GUARANTEE_TERMS: &[&str] = &[
    r"guarantee(?:d|s)?",
    r"risk[- ]free",
    r"can(?:'|no)?t lose",
    r"cannot lose",
    r"sure thing",
    r"certain to",
    r"no[- ]risk",
];

const DIRECTIVE_TERMS: &[&str] = &[
    r"(?:buy|sell) (?:now|immediately|today)",
    r"(?:must|should) (?:buy|sell)",
    r"strong (?:buy|sell)",
    r"load up on",
    r"dump (?:your|all)",
];

#[derive(Debug)]
struct Family {
    name: &'static str,
    label: &'static str,
    re: Regex,
}

impl Family {
    fn compile(
        name: &'static str,
        label: &'static str,
        defaults: &[&str],
        extra: &[String],
    ) -> Result<Self, ComplianceError> {
        let alternation = defaults
            .iter()
            .copied()
            .chain(extra.iter().map(String::as_str).filter(|t| !t.trim().is_empty()))
            .collect::<Vec<_>>()
            .join("|");
        let re = Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
            .map_err(|source| ComplianceError::InvalidPattern { family: name, source })?;
        Ok(Self { name, label, re })
    }
}

#[derive(Debug)]
pub struct KeywordScanner {
    families: Vec<Family>,
}

impl KeywordScanner {
    pub fn new(extra_guarantee: &[String], extra_directive: &[String]) -> Result<Self, ComplianceError> {
        Ok(Self {
            families: vec![
                Family::compile("guarantee", "Guarantee language", GUARANTEE_TERMS, extra_guarantee)?,
                Family::compile("directive", "Unqualified trade directive", DIRECTIVE_TERMS, extra_directive)?,
            ],
        })
    }

    pub fn family_names(&self) -> Vec<&'static str> {
        self.families.iter().map(|f| f.name).collect()
    }
}

impl ComplianceScanner for KeywordScanner {
    fn scan(&self, claims: &[Claim]) -> Result<Vec<String>, ComplianceError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for claim in claims {
            for fam in &self.families {
                if let Some(m) = fam.re.find(&claim.text) {
                    let w = format!(
                        "{}: \"{}\" in claim \"{}\"",
                        fam.label,
                        m.as_str().to_lowercase(),
                        claim.text
                    );
                    if seen.insert(w.clone()) {
                        out.push(w);
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClaimType;

    fn claim(text: &str) -> Claim {
        Claim::new(text, ClaimType::MarketPerformance, 0, text.chars().count())
    }

    #[test]
    fn flags_guarantee_and_directive_language() {
        let s = KeywordScanner::new(&[], &[]).unwrap();
        let warnings = s
            .scan(&[
                claim("Tesla is guaranteed to rise by 20%"),
                claim("AAPL trades at $150"),
                claim("You should buy NVDA"),
            ])
            .unwrap();
        assert_eq!(
            warnings,
            vec![
                "Guarantee language: \"guaranteed\" in claim \"Tesla is guaranteed to rise by 20%\"",
                "Unqualified trade directive: \"should buy\" in claim \"You should buy NVDA\"",
            ]
        );
    }

    #[test]
    fn duplicate_claims_warn_once() {
        let s = KeywordScanner::new(&[], &[]).unwrap();
        let c = claim("This is a risk-free trade");
        assert_eq!(s.scan(&[c.clone(), c]).unwrap().len(), 1);
    }

    #[test]
    fn extra_terms_extend_families() {
        let s = KeywordScanner::new(&["moon(?:shot)?".into()], &[]).unwrap();
        let w = s.scan(&[claim("AAPL is a moonshot")]).unwrap();
        assert_eq!(w.len(), 1);
        assert!(w[0].starts_with("Guarantee language"));
        assert_eq!(s.family_names(), vec!["guarantee", "directive"]);
    }

    #[test]
    fn invalid_extra_term_is_rejected() {
        let err = KeywordScanner::new(&[], &["(unclosed".into()]).unwrap_err();
        assert!(err.to_string().contains("family directive"));
    }

    #[test]
    fn clean_claims_produce_no_warnings() {
        let s = KeywordScanner::new(&[], &[]).unwrap();
        assert!(s.scan(&[claim("Inflation is 3.2%")]).unwrap().is_empty());
    }
}
