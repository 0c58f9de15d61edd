//! Search ranking and mode dispatch (spec §4.6.2-§4.6.4). Grounded on
//! `original_source/src/mcp_jive/utils/search_query_builder.py`'s
//! `SearchResultRanker`/`SearchValidator`, implemented against
//! [`StoreAdapter`] rather than a concrete vector database (spec §6.2).

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;

use super::query::{FilterOperator, SearchFilter, SearchQuery};
use crate::error::ToolError;
use crate::models::{Priority, Status, WorkItem};
use crate::store::StoreAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Semantic,
    Keyword,
    Hybrid,
}

/// Drop semantic matches beyond this cosine distance (spec §4.6.2).
const SEMANTIC_DISTANCE_CUTOFF: f32 = 0.8;
const HYBRID_SEMANTIC_WEIGHT: f64 = 0.7;
const HYBRID_KEYWORD_WEIGHT: f64 = 0.3;
const HYBRID_COOCCURRENCE_BOOST: f64 = 1.2;

fn field_weight(field: &str) -> f64 {
    match field {
        "title" => 3.0,
        "description" => 2.0,
        "tags" => 2.5,
        "acceptance_criteria" | "content" => 1.5,
        "notes" => 1.0,
        "comments" => 0.8,
        _ => 1.0,
    }
}

fn status_weight(status: Status) -> f64 {
    match status {
        Status::NotStarted => 1.2,
        Status::InProgress => 1.1,
        Status::Completed => 0.9,
        Status::Blocked => 1.0,
        Status::Cancelled => 0.5,
    }
}

fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let max_len = a.len().max(b.len());
    let matches = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
    matches as f64 / max_len as f64
}

/// Substring-or-sliding-window fuzzy match (spec §4.6.2 "fuzzy substring
/// matching ... at similarity >= 0.8").
fn fuzzy_match(term: &str, text: &str, threshold: f64) -> bool {
    if text.contains(term) {
        return true;
    }
    if term.len() < 3 {
        return false;
    }
    let text_bytes: Vec<char> = text.chars().collect();
    let term_len = term.chars().count();
    if text_bytes.len() < term_len {
        return false;
    }
    for start in 0..=(text_bytes.len() - term_len) {
        let window: String = text_bytes[start..start + term_len].iter().collect();
        if similarity(term, &window) >= threshold {
            return true;
        }
    }
    false
}

fn field_text(item: &WorkItem, field: &str) -> String {
    match field {
        "title" => item.title.to_lowercase(),
        "description" => item.description.to_lowercase(),
        "tags" => item.tags.join(" ").to_lowercase(),
        "acceptance_criteria" | "content" => item.acceptance_criteria.join(" ").to_lowercase(),
        _ => String::new(),
    }
}

/// Field-weighted term score plus per-field `**term**` highlights (spec
/// §4.6.3 text score: exact hit = 2, fuzzy hit = 1).
fn text_match(item: &WorkItem, terms: &[String]) -> (f64, BTreeMap<String, String>) {
    if terms.is_empty() {
        return (0.0, BTreeMap::new());
    }
    let mut total = 0.0;
    let mut highlights = BTreeMap::new();

    for field in ["title", "description", "tags", "acceptance_criteria"] {
        let value = field_text(item, field);
        if value.is_empty() {
            continue;
        }
        let mut field_score = 0.0;
        let mut hit_terms = Vec::new();
        for term in terms {
            if value.contains(term.as_str()) {
                field_score += 2.0;
                hit_terms.push(term.clone());
            } else if fuzzy_match(term, &value, 0.8) {
                field_score += 1.0;
                hit_terms.push(term.clone());
            }
        }
        if !hit_terms.is_empty() {
            total += field_score * field_weight(field);
            let mut highlighted = value;
            for term in &hit_terms {
                highlighted = highlighted.replace(term.as_str(), &format!("**{term}**"));
            }
            highlights.insert(field.to_string(), highlighted);
        }
    }
    (total, highlights)
}

fn filter_value(item: &WorkItem, field: &str) -> Option<String> {
    match field {
        "title" => Some(item.title.clone()),
        "description" => Some(item.description.clone()),
        "status" => Some(item.status.as_str().to_string()),
        "priority" => Some(item.priority.as_str().to_string()),
        "item_type" | "type" => Some(item.item_type.as_str().to_string()),
        "content" => Some(format!("{} {}", item.title, item.description)),
        _ => None,
    }
}

fn filter_match(item: &WorkItem, filters: &[SearchFilter]) -> f64 {
    filters
        .iter()
        .filter_map(|f| {
            let value = filter_value(item, &f.field)?;
            let hit = match f.operator {
                FilterOperator::Exact => value.to_lowercase() == f.value.to_lowercase(),
                FilterOperator::Fuzzy => fuzzy_match(&f.value.to_lowercase(), &value.to_lowercase(), 0.8),
                FilterOperator::Wildcard => value.to_lowercase().contains(&f.value.to_lowercase()),
            };
            if !hit {
                return None;
            }
            let base = match f.operator {
                FilterOperator::Exact => 2.0,
                FilterOperator::Fuzzy => 1.5,
                FilterOperator::Wildcard => 1.0,
            };
            Some(base * f.weight)
        })
        .sum()
}

fn recency_boost(item: &WorkItem) -> f64 {
    let days_old = (Utc::now() - item.updated_at).num_days();
    if days_old <= 7 {
        1.3
    } else if days_old <= 30 {
        1.1
    } else if days_old <= 90 {
        1.0
    } else {
        0.9
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RankedResult {
    #[serde(flatten)]
    pub item: WorkItem,
    pub score: f64,
    pub factors: BTreeMap<String, f64>,
    pub highlighted_fields: BTreeMap<String, String>,
    pub match_summary: String,
    pub relevance_indicators: Vec<String>,
}

fn match_summary(factors: &BTreeMap<String, f64>, item: &WorkItem) -> String {
    let mut parts = Vec::new();
    if factors.get("text_match").copied().unwrap_or(0.0) > 0.0 {
        parts.push(format!("Text match (score: {:.1})", factors["text_match"]));
    }
    if factors.get("filter_match").copied().unwrap_or(0.0) > 0.0 {
        parts.push(format!("Filter match (score: {:.1})", factors["filter_match"]));
    }
    if factors.get("status_weight").copied().unwrap_or(1.0) != 1.0 {
        parts.push(format!("Status: {}", item.status.as_str()));
    }
    if factors.get("priority_weight").copied().unwrap_or(1.0) != 1.0 {
        parts.push(format!("Priority: {}", item.priority.as_str()));
    }
    if factors.get("recency_boost").copied().unwrap_or(1.0) != 1.0 {
        parts.push("Recent activity".to_string());
    }
    if parts.is_empty() {
        "General match".to_string()
    } else {
        parts.join("; ")
    }
}

/// Ranks one candidate (spec §4.6.3). `retrieval_score` carries the
/// mode-specific signal (semantic similarity or FTS rank); `hybrid_bonus`
/// is 1.2 when the item was found by both legs of a hybrid search.
fn rank(item: WorkItem, query: &SearchQuery, retrieval_score: f64, hybrid_bonus: f64) -> RankedResult {
    let (text_score, highlights) = text_match(&item, &query.terms);
    let filter_score = filter_match(&item, &query.filters);
    let mut factors = BTreeMap::new();
    factors.insert("text_match".to_string(), text_score);
    factors.insert("filter_match".to_string(), filter_score);
    factors.insert("retrieval_score".to_string(), retrieval_score);

    let mut score = text_score + filter_score + retrieval_score;

    let sw = status_weight(item.status);
    factors.insert("status_weight".to_string(), sw);
    score *= sw;

    let pw = item.priority.hybrid_boost();
    factors.insert("priority_weight".to_string(), pw);
    score *= pw;

    if query.boost_recent {
        let rb = recency_boost(&item);
        factors.insert("recency_boost".to_string(), rb);
        score *= rb;
    }

    if hybrid_bonus != 1.0 {
        factors.insert("cooccurrence_boost".to_string(), hybrid_bonus);
        score *= hybrid_bonus;
    }

    let summary = match_summary(&factors, &item);
    RankedResult {
        item,
        score,
        factors,
        highlighted_fields: highlights,
        match_summary: summary,
        relevance_indicators: Vec::new(),
    }
}

async fn semantic_candidates(
    store: &dyn StoreAdapter,
    embedding_model: &str,
    text: &str,
    limit: usize,
) -> Result<Vec<(WorkItem, f64)>, ToolError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let query_vector = crate::embedding::embed(embedding_model, text);
    let hits = store.vector_search_work_items(&query_vector, limit).await?;
    Ok(hits
        .into_iter()
        .filter(|(_, distance)| *distance <= SEMANTIC_DISTANCE_CUTOFF)
        .map(|(item, distance)| (item, (1.0 - distance as f64) * 10.0))
        .collect())
}

async fn keyword_candidates(
    store: &dyn StoreAdapter,
    text: &str,
    limit: usize,
) -> Result<Vec<(WorkItem, f64)>, ToolError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let hits = store.fts_search_work_items(text, limit).await?;
    if !hits.is_empty() {
        return Ok(hits);
    }
    // Empty FTS result: fall back to substring scanning, in case the index
    // hasn't been built for this store yet (spec §4.6.2).
    let all = store.list_work_items().await?;
    let needle = text.to_lowercase();
    Ok(all
        .into_iter()
        .filter(|i| i.title.to_lowercase().contains(&needle) || i.description.to_lowercase().contains(&needle))
        .map(|i| (i, 1.0))
        .take(limit)
        .collect())
}

/// Runs a search in the given mode and returns ranked, validated results
/// (spec §4.6.2-§4.6.4).
pub async fn search(
    store: &dyn StoreAdapter,
    embedding_model: &str,
    raw_query_text: &str,
    query: &SearchQuery,
    mode: SearchMode,
) -> Result<Vec<RankedResult>, ToolError> {
    let limit = query.limit.max(1);
    let mut ranked = match mode {
        SearchMode::Semantic => {
            let candidates = semantic_candidates(store, embedding_model, raw_query_text, limit).await?;
            candidates.into_iter().map(|(item, score)| rank(item, query, score, 1.0)).collect::<Vec<_>>()
        }
        SearchMode::Keyword => {
            let candidates = keyword_candidates(store, raw_query_text, limit).await?;
            candidates.into_iter().map(|(item, score)| rank(item, query, score, 1.0)).collect::<Vec<_>>()
        }
        SearchMode::Hybrid => {
            let half = (limit / 2).max(1);
            let semantic = semantic_candidates(store, embedding_model, raw_query_text, half).await?;
            let keyword = keyword_candidates(store, raw_query_text, half).await?;

            let semantic_ids: HashSet<String> = semantic.iter().map(|(i, _)| i.id.clone()).collect();
            let keyword_ids: HashSet<String> = keyword.iter().map(|(i, _)| i.id.clone()).collect();

            let mut merged: BTreeMap<String, (WorkItem, f64)> = BTreeMap::new();
            for (item, score) in semantic {
                merged.insert(item.id.clone(), (item, score * HYBRID_SEMANTIC_WEIGHT));
            }
            for (item, score) in keyword {
                merged
                    .entry(item.id.clone())
                    .and_modify(|(_, existing)| *existing += score * HYBRID_KEYWORD_WEIGHT)
                    .or_insert((item, score * HYBRID_KEYWORD_WEIGHT));
            }

            merged
                .into_values()
                .map(|(item, score)| {
                    let bonus =
                        if semantic_ids.contains(&item.id) && keyword_ids.contains(&item.id) {
                            HYBRID_COOCCURRENCE_BOOST
                        } else {
                            1.0
                        };
                    rank(item, query, score, bonus)
                })
                .collect::<Vec<_>>()
        }
    };

    validate_results(&mut ranked);
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(limit);
    Ok(ranked)
}

/// Post-filters and tags results (spec §4.6.4).
fn validate_results(results: &mut Vec<RankedResult>) {
    results.retain(|r| {
        !r.item.id.is_empty()
            && (!r.item.title.trim().is_empty()
                || !r.item.description.trim().is_empty()
                || !r.item.acceptance_criteria.is_empty())
    });

    for r in results.iter_mut() {
        r.score = r.score.clamp(0.0, 10.0);
        let mut indicators = Vec::new();
        if r.highlighted_fields.contains_key("title") {
            indicators.push("title_match".to_string());
        }
        if r.highlighted_fields.contains_key("description") {
            indicators.push("description_match".to_string());
        }
        if r.highlighted_fields.contains_key("tags") {
            indicators.push("tag_match".to_string());
        }
        if r.score > 5.0 {
            indicators.push("high_relevance".to_string());
        }
        if matches!(r.item.priority, Priority::Critical | Priority::High) {
            indicators.push("high_priority".to_string());
        }
        r.relevance_indicators = indicators;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemType;
    use crate::store::sqlite::SqliteStore;

    async fn store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        store.ensure_fts_index().await.unwrap();
        (store, dir)
    }

    fn seeded_item(title: &str, priority: Priority) -> WorkItem {
        let mut item = WorkItem::new(ItemType::Task, title.to_string(), String::new());
        item.priority = priority;
        item.vector = crate::embedding::embed("local-hash-384", &item.embedding_text());
        item
    }

    #[tokio::test]
    async fn priority_boosts_identical_titles() {
        let (store, _dir) = store().await;
        let critical = seeded_item("Alpha", Priority::Critical);
        let medium = seeded_item("Alpha", Priority::Medium);
        store.add_work_item(&critical).await.unwrap();
        store.add_work_item(&medium).await.unwrap();

        let query = super::super::query::parse_natural_query("Alpha");
        let results = search(&store, "local-hash-384", "Alpha", &query, SearchMode::Hybrid).await.unwrap();

        let critical_score = results.iter().find(|r| r.item.id == critical.id).unwrap().score;
        let medium_score = results.iter().find(|r| r.item.id == medium.id).unwrap().score;
        assert!(critical_score > medium_score);
    }

    #[tokio::test]
    async fn keyword_search_finds_title_term() {
        let (store, _dir) = store().await;
        let item = seeded_item("rebuild the parser", Priority::Medium);
        store.add_work_item(&item).await.unwrap();

        let query = super::super::query::parse_natural_query("parser");
        let results = search(&store, "local-hash-384", "parser", &query, SearchMode::Keyword).await.unwrap();
        assert!(results.iter().any(|r| r.item.id == item.id));
    }

    #[tokio::test]
    async fn semantic_search_drops_far_results() {
        let (store, _dir) = store().await;
        let mut near = WorkItem::new(ItemType::Task, "alpha beta".into(), String::new());
        near.vector = crate::embedding::embed("local-hash-384", &near.embedding_text());
        store.add_work_item(&near).await.unwrap();

        let query = super::super::query::parse_natural_query("alpha beta");
        let results =
            search(&store, "local-hash-384", "alpha beta", &query, SearchMode::Semantic).await.unwrap();
        assert!(results.iter().any(|r| r.item.id == near.id));
    }
}
