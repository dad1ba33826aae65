//! Scoring backends for recommendation matching.
//!
//! `LexicalScorer` is the default: a deterministic term-overlap heuristic
//! that needs no network and always produces the same scores for the same
//! inputs. `LlmRelevanceScorer` asks the model to judge the whole catalog
//! in one batched call and is available for callers that want semantic
//! judgement and accept the latency.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::llm_client::payload::{as_object, optional_string};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{LlmClient, LlmError, LlmRequest};
use crate::matching::prompts::RELEVANCE_PROMPT_TEMPLATE;
use crate::matching::MatchResult;
use crate::models::opportunity::CatalogItem;
use crate::profile::StudentProfile;

const SCORE_TEMPERATURE: f32 = 0.0;
const SCORE_MAX_TOKENS: u32 = 2048;

// Component weights, renormalized over whichever components the profile
// actually fills in so a sparse profile still spans the full 0-100 range.
const WEIGHT_INTERESTS: f64 = 0.45;
const WEIGHT_SKILLS: f64 = 0.35;
const WEIGHT_MAJOR: f64 = 0.20;

const STRENGTH_EXACT: f64 = 1.0;
const STRENGTH_SUBSTRING: f64 = 0.6;
const STRENGTH_TOKEN: f64 = 0.3;

// Tokens shorter than this carry no signal ("in", "lab", "the").
const MIN_TOKEN_LEN: usize = 4;
const MAX_RATIONALE_TERMS: usize = 3;

/// Assigns a 0-100 relevance score to every catalog item. Implementations
/// score; ordering and truncation stay in `rank_matches_with`.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score(
        &self,
        profile: &StudentProfile,
        catalog: &[CatalogItem],
    ) -> Result<Vec<MatchResult>, PipelineError>;
}

/// Deterministic term-overlap scorer.
///
/// Each profile component (interests, skills, major) is matched against
/// the item summary on a three-tier strength ladder: exact match with the
/// research area or a listed skill, substring containment, shared content
/// token. The weighted component means are renormalized over the
/// components the profile provides.
pub struct LexicalScorer;

#[async_trait]
impl RelevanceScorer for LexicalScorer {
    async fn score(
        &self,
        profile: &StudentProfile,
        catalog: &[CatalogItem],
    ) -> Result<Vec<MatchResult>, PipelineError> {
        let needles = ProfileNeedles::build(profile);
        Ok(catalog
            .iter()
            .map(|item| score_item(&needles, item))
            .collect())
    }
}

struct Needle {
    display: String,
    lowered: String,
    tokens: HashSet<String>,
}

fn build_needle(term: &str) -> Needle {
    let lowered = term.trim().to_lowercase();
    Needle {
        display: term.trim().to_string(),
        tokens: tokenize(&lowered),
        lowered,
    }
}

struct ProfileNeedles {
    interests: Vec<Needle>,
    skills: Vec<Needle>,
    major: Option<Needle>,
}

impl ProfileNeedles {
    fn build(profile: &StudentProfile) -> Self {
        ProfileNeedles {
            interests: profile
                .research_interests
                .iter()
                .map(|t| build_needle(t))
                .collect(),
            skills: profile.skills.iter().map(|t| build_needle(t)).collect(),
            major: profile.major.as_deref().map(build_needle),
        }
    }
}

struct ItemIndex {
    area: Option<String>,
    text: String,
    skills: Vec<String>,
    tokens: HashSet<String>,
}

impl ItemIndex {
    fn build(item: &CatalogItem) -> Self {
        let summary = &item.summary;
        let area = summary.research_area.as_ref().map(|a| a.to_lowercase());
        let mut text = summary.one_liner.to_lowercase();
        if let Some(area) = &area {
            text.push(' ');
            text.push_str(area);
        }
        let skills: Vec<String> = summary.skills.iter().map(|s| s.to_lowercase()).collect();
        for skill in &skills {
            text.push(' ');
            text.push_str(skill);
        }
        let tokens = tokenize(&text);
        ItemIndex {
            area,
            text,
            skills,
            tokens,
        }
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .map(|t| t.to_lowercase())
        .collect()
}

fn match_strength(needle: &Needle, index: &ItemIndex) -> f64 {
    if needle.lowered.is_empty() {
        return 0.0;
    }
    if index.area.as_deref() == Some(needle.lowered.as_str())
        || index.skills.iter().any(|s| *s == needle.lowered)
    {
        return STRENGTH_EXACT;
    }
    let area_in_needle = index
        .area
        .as_deref()
        .is_some_and(|a| needle.lowered.contains(a));
    if index.text.contains(&needle.lowered) || area_in_needle {
        return STRENGTH_SUBSTRING;
    }
    if needle.tokens.iter().any(|t| index.tokens.contains(t)) {
        return STRENGTH_TOKEN;
    }
    0.0
}

/// Mean strength over the component's terms, plus the terms that matched
/// at substring grade or better (for the rationale).
fn score_component(needles: &[Needle], index: &ItemIndex) -> (f64, Vec<String>) {
    let mut total = 0.0;
    let mut hits = Vec::new();
    for needle in needles {
        let strength = match_strength(needle, index);
        total += strength;
        if strength >= STRENGTH_SUBSTRING {
            hits.push(needle.display.clone());
        }
    }
    (total / needles.len() as f64, hits)
}

fn score_item(needles: &ProfileNeedles, item: &CatalogItem) -> MatchResult {
    let index = ItemIndex::build(item);
    let mut weighted = 0.0;
    let mut weight_total = 0.0;
    let mut interest_hits = Vec::new();
    let mut skill_hits = Vec::new();
    let mut major_hit = None;

    if !needles.interests.is_empty() {
        let (component, hits) = score_component(&needles.interests, &index);
        weighted += WEIGHT_INTERESTS * component;
        weight_total += WEIGHT_INTERESTS;
        interest_hits = hits;
    }
    if !needles.skills.is_empty() {
        let (component, hits) = score_component(&needles.skills, &index);
        weighted += WEIGHT_SKILLS * component;
        weight_total += WEIGHT_SKILLS;
        skill_hits = hits;
    }
    if let Some(major) = &needles.major {
        let strength = match_strength(major, &index);
        weighted += WEIGHT_MAJOR * strength;
        weight_total += WEIGHT_MAJOR;
        if strength >= STRENGTH_SUBSTRING {
            major_hit = Some(major.display.as_str());
        }
    }

    let score = if weight_total > 0.0 {
        (weighted / weight_total * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    MatchResult {
        opportunity_id: item.id,
        score,
        rationale: build_rationale(&interest_hits, &skill_hits, major_hit),
    }
}

fn build_rationale(
    interests: &[String],
    skills: &[String],
    major: Option<&str>,
) -> Option<String> {
    let list = |terms: &[String]| {
        terms
            .iter()
            .take(MAX_RATIONALE_TERMS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut parts = Vec::new();
    if !interests.is_empty() {
        parts.push(format!("matches interests: {}", list(interests)));
    }
    if !skills.is_empty() {
        parts.push(format!("uses skills: {}", list(skills)));
    }
    if let Some(major) = major {
        parts.push(format!("fits major: {major}"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

/// LLM-judged scorer: one batched call covering the whole catalog.
pub struct LlmRelevanceScorer {
    llm: LlmClient,
}

impl LlmRelevanceScorer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl RelevanceScorer for LlmRelevanceScorer {
    async fn score(
        &self,
        profile: &StudentProfile,
        catalog: &[CatalogItem],
    ) -> Result<Vec<MatchResult>, PipelineError> {
        let profile_json =
            serde_json::to_string_pretty(profile).map_err(anyhow::Error::from)?;
        let entries: Vec<Value> = catalog.iter().map(judge_entry).collect();
        let catalog_json =
            serde_json::to_string_pretty(&entries).map_err(anyhow::Error::from)?;

        let prompt = RELEVANCE_PROMPT_TEMPLATE
            .replace("{profile_json}", &profile_json)
            .replace("{catalog_json}", &catalog_json);
        let request = LlmRequest {
            system_instruction: JSON_ONLY_SYSTEM,
            user_content: &prompt,
            json_response_mode: true,
            temperature: SCORE_TEMPERATURE,
            max_output_tokens: SCORE_MAX_TOKENS,
        };

        let value = self
            .llm
            .generate_value(&request)
            .await
            .map_err(PipelineError::MatchingFailure)?;
        parse_judge_scores(&value, catalog).map_err(PipelineError::MatchingFailure)
    }
}

fn judge_entry(item: &CatalogItem) -> Value {
    json!({
        "id": item.id,
        "one_liner": item.summary.one_liner,
        "skills": item.summary.skills,
        "time_commitment": item.summary.time_commitment,
        "research_area": item.summary.research_area,
    })
}

fn parse_judge_scores(
    value: &Value,
    catalog: &[CatalogItem],
) -> Result<Vec<MatchResult>, LlmError> {
    let obj = as_object(value, "relevance")?;
    let entries = obj
        .get("scores")
        .and_then(|v| v.as_array())
        .ok_or_else(|| LlmError::Schema("field 'scores' must be an array".to_string()))?;

    let known: HashSet<Uuid> = catalog.iter().map(|item| item.id).collect();
    let mut by_id: HashMap<Uuid, (f64, Option<String>)> = HashMap::new();

    for entry in entries {
        let entry = as_object(entry, "score entry")?;
        let id = match entry.get("id").and_then(|v| v.as_str()) {
            Some(raw) => Uuid::parse_str(raw)
                .map_err(|_| LlmError::Schema(format!("invalid opportunity id '{raw}'")))?,
            None => {
                return Err(LlmError::Schema(
                    "score entry is missing 'id'".to_string(),
                ))
            }
        };
        if !known.contains(&id) {
            warn!("Relevance judge scored unknown opportunity {id}, dropping");
            continue;
        }
        let score = entry.get("score").and_then(|v| v.as_f64()).ok_or_else(|| {
            LlmError::Schema("score entry is missing a numeric 'score'".to_string())
        })?;
        let rationale = optional_string(entry, "rationale")?;
        by_id.insert(id, (score.clamp(0.0, 100.0), rationale));
    }

    // Catalog items the judge skipped read as "no connection found".
    Ok(catalog
        .iter()
        .map(|item| {
            let (score, rationale) = by_id.remove(&item.id).unwrap_or((0.0, None));
            MatchResult {
                opportunity_id: item.id,
                score,
                rationale,
            }
        })
        .collect())
}
