//! Language-model backend: one completion request per extraction, asking for a
//! JSON array of claims.
//!
//! A response that does not parse into the expected structure yields no claims
//! at all. Callers decide whether to retry or switch to the pattern backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ExtractionBackend;
use crate::model::{Claim, ClaimForm, ClaimType};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_MODELS_URL: &str = "https://api.openai.com/v1/models";

const SYSTEM_PROMPT: &str = "You extract verifiable financial claims from text. \
Return ONLY a JSON array. Each element: {\"text\": exact substring of the input, \
\"claim_type\": one of stock_price|market_performance|economic_indicator|company_fundamental|sector_performance|unknown, \
\"entities\": [ticker symbols or indicator codes], \"confidence\": number 0..1, \
\"value\": the quantity as written (optional)}. Return [] when there are no claims.";

/// Low-level chat completion call. Separated so tests can script responses.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
    /// Explicit availability probe, run once when the backend is selected.
    async fn health_check(&self) -> bool;
    fn name(&self) -> &str;
}

/// OpenAI Chat Completions client.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("claim-enricher/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        anyhow::ensure!(!self.api_key.is_empty(), "OpenAI API key is empty");

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let resp = self
            .http
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai chat request")?
            .error_for_status()
            .context("openai chat status")?;
        let body: Resp = resp.json().await.context("openai chat body")?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("openai response has no choices")
    }

    async fn health_check(&self) -> bool {
        if self.api_key.is_empty() {
            return false;
        }
        let url = format!("{OPENAI_MODELS_URL}/{}", self.model);
        match self.http.get(url).bearer_auth(&self.api_key).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(target: "extract", error = %e, "openai health check failed");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Deterministic client for tests/local runs: replays queued replies, then
/// repeats the fallback reply.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    healthy: bool,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
            healthy: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies
            .lock()
            .expect("scripted replies poisoned")
            .push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.replies
            .lock()
            .expect("scripted replies poisoned")
            .push_back(Err(message.into()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .replies
            .lock()
            .expect("scripted replies poisoned")
            .pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(msg)) => Err(anyhow::anyhow!(msg)),
            None => Ok(self.fallback.clone()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Claim extraction through a completion client.
pub struct LlmExtractor {
    client: Arc<dyn CompletionClient>,
}

impl LlmExtractor {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExtractionBackend for LlmExtractor {
    async fn extract(&self, text: &str) -> Vec<Claim> {
        let reply = match self.client.complete(SYSTEM_PROMPT, text).await {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "extract", provider = self.client.name(), error = %e, "completion failed");
                return Vec::new();
            }
        };
        match parse_claims(&reply, text) {
            Ok(claims) => claims,
            Err(reason) => {
                warn!(target: "extract", provider = self.client.name(), %reason, "rejected model response");
                Vec::new()
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.client.health_check().await
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

#[derive(Debug, Deserialize)]
struct RawClaim {
    text: String,
    claim_type: String,
    #[serde(default)]
    entities: Vec<String>,
    confidence: f32,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawReply {
    List(Vec<RawClaim>),
    Wrapped { claims: Vec<RawClaim> },
}

/// Models sometimes wrap JSON in markdown code fences.
fn strip_code_fence(reply: &str) -> &str {
    let t = reply.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse a model reply into claims located in `source`. All-or-nothing.
pub fn parse_claims(reply: &str, source: &str) -> Result<Vec<Claim>, String> {
    let raw: RawReply =
        serde_json::from_str(strip_code_fence(reply)).map_err(|e| format!("json: {e}"))?;
    let items = match raw {
        RawReply::List(v) => v,
        RawReply::Wrapped { claims } => claims,
    };

    let mut claims = Vec::with_capacity(items.len());
    let mut cursor = 0usize;
    for (idx, item) in items.into_iter().enumerate() {
        let text = item.text.trim();
        if text.is_empty() {
            return Err(format!("claim {idx}: empty text"));
        }
        if !item.confidence.is_finite() || !(0.0..=1.0).contains(&item.confidence) {
            return Err(format!("claim {idx}: confidence {} out of [0, 1]", item.confidence));
        }
        let byte_start = source[cursor..]
            .find(text)
            .map(|i| i + cursor)
            .or_else(|| source.find(text))
            .ok_or_else(|| format!("claim {idx}: text not found in input"))?;
        let byte_end = byte_start + text.len();
        cursor = byte_end;

        let start = source[..byte_start].chars().count();
        let end = start + text.chars().count();
        let claim_type = ClaimType::parse(&item.claim_type);
        let form = match (claim_type, item.value.as_deref()) {
            (ClaimType::StockPrice, _) => ClaimForm::Price,
            (_, Some(v)) if v.trim_end().ends_with('%') => ClaimForm::Percentage,
            _ => ClaimForm::Statement,
        };
        let entities = item
            .entities
            .iter()
            .map(|e| e.trim().to_ascii_uppercase())
            .filter(|e| !e.is_empty());

        let mut claim = Claim::new(text, claim_type, start, end)
            .form(form)
            .entities(entities)
            .confidence(item.confidence);
        claim.value = item.value;
        claims.push(claim);
    }

    claims.sort_by_key(|c| c.start);
    debug!(target: "extract", count = claims.len(), "parsed model claims");
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "AAPL trades at $150. Inflation is 3.2%.";

    #[test]
    fn parses_plain_and_fenced_arrays() {
        let reply = r#"[{"text":"AAPL trades at $150","claim_type":"stock_price","entities":["aapl"],"confidence":0.9,"value":"150"}]"#;
        let claims = parse_claims(reply, SRC).unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].entities, vec!["AAPL"]);
        assert_eq!((claims[0].start, claims[0].end), (0, 19));
        assert_eq!(claims[0].form, ClaimForm::Price);

        let fenced = format!("```json\n{reply}\n```");
        assert_eq!(parse_claims(&fenced, SRC).unwrap(), claims);
    }

    #[test]
    fn accepts_wrapped_object_and_sorts_by_offset() {
        let reply = r#"{"claims":[
            {"text":"Inflation is 3.2%","claim_type":"economic_indicator","entities":["CPI"],"confidence":0.8,"value":"3.2%"},
            {"text":"AAPL trades at $150","claim_type":"stock_price","confidence":0.9}
        ]}"#;
        let claims = parse_claims(reply, SRC).unwrap();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].claim_type, ClaimType::StockPrice);
        assert_eq!(claims[1].form, ClaimForm::Percentage);
    }

    #[test]
    fn any_malformed_element_rejects_the_whole_reply() {
        let bad_conf = r#"[
            {"text":"AAPL trades at $150","claim_type":"stock_price","confidence":0.9},
            {"text":"Inflation is 3.2%","claim_type":"economic_indicator","confidence":1.4}
        ]"#;
        assert!(parse_claims(bad_conf, SRC).is_err());

        let hallucinated = r#"[{"text":"MSFT trades at $1","claim_type":"stock_price","confidence":0.5}]"#;
        assert!(parse_claims(hallucinated, SRC).is_err());

        assert!(parse_claims("Sure! Here are the claims:", SRC).is_err());
        assert!(parse_claims(r#"[{"claim_type":"stock_price"}]"#, SRC).is_err());
    }

    #[tokio::test]
    async fn extractor_returns_empty_on_client_error_or_garbage() {
        let client = Arc::new(ScriptedClient::new("not json"));
        client.push_error("HTTP 500");
        let ex = LlmExtractor::new(client.clone());

        assert!(ex.extract(SRC).await.is_empty());
        assert!(ex.extract(SRC).await.is_empty());
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn health_check_is_delegated() {
        let ex = LlmExtractor::new(Arc::new(ScriptedClient::new("[]").unhealthy()));
        assert!(!ex.health_check().await);
    }
}
