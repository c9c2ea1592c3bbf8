// Generation oracle: asks an external LLM for monster content and turns
// whatever comes back into a usable record, falling back to fixed defaults.

pub mod openrouter;
pub mod prompts;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::engine::config::{FALLBACK_ATK, FALLBACK_DEF, FALLBACK_HP, FALLBACK_SPD, MAX_STAT};
use crate::engine::model::{MonsterDraft, Rarity};
use crate::metrics;

pub use openrouter::OpenRouterGenerator;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("generator unavailable: {0}")]
    Unavailable(String),

    #[error("generator timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed generator output: {0}")]
    Malformed(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A text generator that answers a prompt with free-form text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Replays canned responses in order. With nothing scripted every call
/// fails, which is how the server runs when no API key is configured.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    repeat: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Generator that never answers.
    pub fn offline() -> Self {
        Self::default()
    }

    /// Answers with each response once, in order, then fails.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Answers every prompt with the same text.
    pub fn repeating(response: impl Into<String>) -> Self {
        Self {
            repeat: Some(response.into()),
            ..Self::default()
        }
    }

    /// Sleep before answering (to exercise timeouts).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.or_else(|| self.repeat.clone())
            .ok_or_else(|| OracleError::Unavailable("no generator configured".into()))
    }
}

/// Outcome of a draft: either parsed from the generator or the caller's
/// fallback record.
#[derive(Debug, Clone, PartialEq)]
pub enum Drafted<T> {
    Parsed(T),
    Fallback(T),
}

impl<T> Drafted<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Drafted::Fallback(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Drafted::Parsed(v) | Drafted::Fallback(v) => v,
        }
    }
}

/// Rival for a battle plus the narration of an already decided outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct RivalDraft {
    pub name: String,
    pub element: String,
    pub atk: i64,
    pub hp: i64,
    pub narrative: String,
}

/// The adapter the engine talks to. One generator attempt per call, bounded
/// by `timeout`; every failure turns into the fallback.
#[derive(Clone)]
pub struct Oracle {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl Oracle {
    pub fn new(generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    async fn ask(&self, prompt: &str) -> Result<String, OracleError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.generator.generate(prompt)).await
        {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.timeout)),
        };
        metrics::ORACLE_LATENCY_SECONDS.observe(started.elapsed().as_secs_f64());
        result
    }

    fn recover<T>(&self, kind: &str, err: OracleError, fallback: T) -> Drafted<T> {
        tracing::warn!("Oracle {kind} draft fell back to defaults: {err}");
        metrics::ORACLE_CALLS_TOTAL
            .with_label_values(&[kind, "fallback"])
            .inc();
        Drafted::Fallback(fallback)
    }

    /// Draft a monster from `instruction`. Missing stats default to the
    /// fixed fallback constants; missing text is taken from `fallback`.
    pub async fn draft_monster(
        &self,
        instruction: &str,
        fallback: MonsterDraft,
    ) -> Drafted<MonsterDraft> {
        let prompt = prompts::with_contract(instruction, prompts::MONSTER_FORMAT);
        let parsed = match self.ask(&prompt).await {
            Ok(text) => parse_monster(&text, &fallback),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(draft) => {
                metrics::ORACLE_CALLS_TOTAL
                    .with_label_values(&["monster", "ok"])
                    .inc();
                Drafted::Parsed(draft)
            }
            Err(e) => self.recover("monster", e, fallback),
        }
    }

    /// Draft a battle rival together with the narration.
    pub async fn draft_rival(&self, instruction: &str, fallback: RivalDraft) -> Drafted<RivalDraft> {
        let prompt = prompts::with_contract(instruction, prompts::RIVAL_FORMAT);
        let parsed = match self.ask(&prompt).await {
            Ok(text) => parse_rival(&text, &fallback),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(draft) => {
                metrics::ORACLE_CALLS_TOTAL
                    .with_label_values(&["rival", "ok"])
                    .inc();
                Drafted::Parsed(draft)
            }
            Err(e) => self.recover("rival", e, fallback),
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────

/// Strip code fences and surrounding chatter, returning the outermost
/// `{ ... }` span.
pub fn extract_json(text: &str) -> Option<String> {
    let cleaned = text.replace("```json", "").replace("```JSON", "").replace("```", "");
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    Some(cleaned[start..=end].to_string())
}

fn parse_object(text: &str) -> Result<Map<String, Value>, OracleError> {
    let json = extract_json(text).ok_or_else(|| OracleError::Malformed("no JSON object".into()))?;
    match serde_json::from_str::<Value>(&json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(OracleError::Malformed("top-level value is not an object".into())),
        Err(e) => Err(OracleError::Malformed(e.to_string())),
    }
}

/// Coerce a JSON value to a positive integer no larger than `MAX_STAT`.
/// Accepts numbers, floats and numeric strings ("45", " 60 ", "72.5").
pub fn coerce_int(value: Option<&Value>) -> Option<i64> {
    let n = match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }?;
    (n > 0).then(|| n.min(MAX_STAT))
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

/// Look up a stat at the top level or nested under `stats`.
fn stat_field(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    coerce_int(obj.get(key)).or_else(|| {
        obj.get("stats")
            .and_then(Value::as_object)
            .and_then(|stats| coerce_int(stats.get(key)))
    })
}

/// A name is mandatory; without one the whole draft is rejected.
pub fn parse_monster(text: &str, fallback: &MonsterDraft) -> Result<MonsterDraft, OracleError> {
    let obj = parse_object(text)?;
    let name = text_field(&obj, &["name"])
        .ok_or_else(|| OracleError::Malformed("missing name".into()))?;
    Ok(MonsterDraft {
        name,
        element: text_field(&obj, &["element", "type"]).unwrap_or_else(|| fallback.element.clone()),
        element_lore: text_field(&obj, &["elementLore", "elLore", "element_lore", "lore"])
            .unwrap_or_else(|| fallback.element_lore.clone()),
        bio: text_field(&obj, &["bio", "description"]).unwrap_or_else(|| fallback.bio.clone()),
        rarity: text_field(&obj, &["rarity"])
            .and_then(|r| Rarity::parse(&r))
            .unwrap_or(fallback.rarity),
        ability: text_field(&obj, &["ability", "move"]).unwrap_or_else(|| fallback.ability.clone()),
        atk: stat_field(&obj, "atk").unwrap_or(FALLBACK_ATK),
        def: stat_field(&obj, "def").unwrap_or(FALLBACK_DEF),
        spd: stat_field(&obj, "spd").unwrap_or(FALLBACK_SPD),
        hp: stat_field(&obj, "hp").unwrap_or(FALLBACK_HP),
    })
}

pub fn parse_rival(text: &str, fallback: &RivalDraft) -> Result<RivalDraft, OracleError> {
    let obj = parse_object(text)?;
    let name = text_field(&obj, &["rivalName", "name"])
        .ok_or_else(|| OracleError::Malformed("missing rival name".into()))?;
    Ok(RivalDraft {
        name,
        element: text_field(&obj, &["rivalElement", "element"])
            .unwrap_or_else(|| fallback.element.clone()),
        atk: stat_field(&obj, "atk").unwrap_or(FALLBACK_ATK),
        hp: stat_field(&obj, "hp").unwrap_or(FALLBACK_HP),
        narrative: text_field(&obj, &["narrative", "story", "log"])
            .unwrap_or_else(|| fallback.narrative.clone()),
    })
}
