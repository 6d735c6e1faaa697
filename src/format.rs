//! Output formatting: original content + claims + merged data → enriched text.
//!
//! Pure function of its inputs. Claim offsets are character offsets and are
//! validated against the content before anything is written.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::FormatError;
use crate::model::{Claim, DataPoint};

pub trait Formatter: Send + Sync {
    fn format(
        &self,
        content: &str,
        claims: &[Claim],
        data: &BTreeMap<String, DataPoint>,
        style: &str,
    ) -> Result<String, FormatError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStyle {
    /// Bracketed note right after each claim span.
    Inline,
    /// Numbered markers plus a trailing sources section.
    Footnote,
    /// Original text plus a market data list.
    Summary,
}

impl FormatStyle {
    pub fn parse(s: &str) -> Result<Self, FormatError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "footnote" | "footnotes" => Ok(Self::Footnote),
            "summary" => Ok(Self::Summary),
            _ => Err(FormatError::UnknownStyle(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotatingFormatter;

impl AnnotatingFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl Formatter for AnnotatingFormatter {
    fn format(
        &self,
        content: &str,
        claims: &[Claim],
        data: &BTreeMap<String, DataPoint>,
        style: &str,
    ) -> Result<String, FormatError> {
        let style = FormatStyle::parse(style)?;
        let len = content.chars().count();
        for c in claims {
            if c.start > c.end || c.end > len {
                return Err(FormatError::SpanOutOfBounds {
                    start: c.start,
                    end: c.end,
                    len,
                });
            }
        }

        Ok(match style {
            FormatStyle::Inline => inline(content, claims, data),
            FormatStyle::Footnote => footnote(content, claims, data),
            FormatStyle::Summary => summary(content, data),
        })
    }
}

fn inline(content: &str, claims: &[Claim], data: &BTreeMap<String, DataPoint>) -> String {
    let notes: Vec<(usize, String)> = claims
        .iter()
        .filter_map(|c| claim_note(c, data).map(|n| (c.end, format!(" [{n}]"))))
        .collect();
    insert_at_chars(content, notes)
}

fn footnote(content: &str, claims: &[Claim], data: &BTreeMap<String, DataPoint>) -> String {
    let mut marks = Vec::new();
    let mut section = String::new();
    for c in claims {
        if let Some(note) = claim_note(c, data) {
            let n = marks.len() + 1;
            marks.push((c.end, format!("[{n}]")));
            section.push_str(&format!("\n[{n}] {note}"));
        }
    }
    if marks.is_empty() {
        return content.to_string();
    }
    let mut out = insert_at_chars(content, marks);
    out.push_str("\n\nSources:");
    out.push_str(&section);
    out
}

fn summary(content: &str, data: &BTreeMap<String, DataPoint>) -> String {
    if data.is_empty() {
        return content.to_string();
    }
    let mut out = format!("{content}\n\nMarket data:");
    for (key, dp) in data {
        out.push_str(&format!(
            "\n- {key}: {} ({}, {})",
            render_value(&dp.value),
            dp.source,
            dp.timestamp.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    out
}

/// `AAPL: 151.2 via quotes` for every data point tied to one of the claim's
/// entities, joined with `; `. `None` when nothing matches.
fn claim_note(claim: &Claim, data: &BTreeMap<String, DataPoint>) -> Option<String> {
    let parts: Vec<String> = claim
        .entities
        .iter()
        .flat_map(move |sym| {
            data.values()
                .filter(move |dp| dp.symbol.as_deref() == Some(sym.as_str()))
                .map(move |dp| format!("{sym}: {} via {}", render_value(&dp.value), dp.source))
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}

fn render_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Object(m) => m
            .get("price")
            .or_else(|| m.get("value"))
            .map(render_value)
            .unwrap_or_else(|| v.to_string()),
        other => other.to_string(),
    }
}

/// Insert each text at its character offset. Equal offsets keep input order.
fn insert_at_chars(content: &str, mut inserts: Vec<(usize, String)>) -> String {
    inserts.sort_by_key(|(at, _)| *at);
    let mut out = String::with_capacity(content.len() + inserts.iter().map(|(_, s)| s.len()).sum::<usize>());
    let mut pending = inserts.into_iter().peekable();
    for (i, ch) in content.chars().enumerate() {
        while let Some((_, text)) = pending.next_if(|(at, _)| *at == i) {
            out.push_str(&text);
        }
        out.push(ch);
    }
    for (_, text) in pending {
        out.push_str(&text);
    }
    out
}
