//! Search query model (spec §4.6.1). Grounded on
//! `original_source/src/mcp_jive/utils/search_query_builder.py`'s
//! `SearchQueryBuilder.parse_natural_query`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const MAX_TERMS: usize = 20;
const MIN_TERM_LEN: usize = 2;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
        "it", "its", "of", "on", "that", "the", "to", "was", "will", "with",
    ]
    .into_iter()
    .collect()
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-_.]").unwrap());
static QUOTED_PHRASE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).unwrap());
static FIELD_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+):(\S+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Exact,
    Fuzzy,
    Wildcard,
}

#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    All,
    WorkItems,
    Executions,
    Notes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Relevance,
    DateDesc,
    DateAsc,
    TitleAsc,
    TitleDesc,
    PriorityDesc,
    StatusAsc,
}

/// A structured search query (spec §4.6.1).
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    pub filters: Vec<SearchFilter>,
    pub scope: SearchScope,
    pub sort_order: SortOrder,
    pub limit: usize,
    pub offset: usize,
    pub fuzzy_threshold: f64,
    pub boost_recent: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            filters: Vec::new(),
            scope: SearchScope::All,
            sort_order: SortOrder::Relevance,
            limit: 50,
            offset: 0,
            fuzzy_threshold: 0.8,
            boost_recent: true,
        }
    }
}

fn clean_term(term: &str) -> Option<String> {
    let cleaned = NON_WORD.replace_all(&term.to_lowercase(), "").to_string();
    if STOP_WORDS.contains(cleaned.as_str()) || cleaned.len() < MIN_TERM_LEN {
        None
    } else {
        Some(cleaned)
    }
}

/// Parses a natural-language query string into a [`SearchQuery`] (spec
/// §4.6.1): quoted phrases become exact filters on `content` (weight
/// 2.0), `field:value` tokens become fuzzy filters (weight 1.5), and the
/// rest is cleaned, deduped, stop-word-filtered term list capped at 20.
#[must_use]
pub fn parse_natural_query(query_string: &str) -> SearchQuery {
    let mut query = SearchQuery::default();
    if query_string.trim().is_empty() {
        return query;
    }

    for caps in QUOTED_PHRASE.captures_iter(query_string) {
        query.filters.push(SearchFilter {
            field: "content".to_string(),
            operator: FilterOperator::Exact,
            value: caps[1].to_string(),
            weight: 2.0,
        });
    }
    let without_phrases = QUOTED_PHRASE.replace_all(query_string, "");

    for caps in FIELD_VALUE.captures_iter(&without_phrases) {
        query.filters.push(SearchFilter {
            field: caps[1].to_string(),
            operator: FilterOperator::Fuzzy,
            value: caps[2].to_string(),
            weight: 1.5,
        });
    }
    let without_fields = FIELD_VALUE.replace_all(&without_phrases, "");

    let mut seen = HashSet::new();
    for raw in without_fields.split_whitespace() {
        if let Some(term) = clean_term(raw) {
            if seen.insert(term.clone()) {
                query.terms.push(term);
            }
        }
    }
    if query.terms.len() > MAX_TERMS {
        query.terms.truncate(MAX_TERMS);
    }

    let mut seen_filters = HashSet::new();
    query.filters.retain(|f| {
        seen_filters.insert((f.field.clone(), format!("{:?}", f.operator), f.value.clone()))
    });

    query
}

#[derive(Debug, Clone, Default)]
pub struct QueryValidation {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Validates a query's shape (spec §4.6.4 / `SearchValidator.validate_query`).
#[must_use]
pub fn validate_query(query: &SearchQuery) -> QueryValidation {
    let mut result = QueryValidation { is_valid: true, ..Default::default() };

    if query.terms.is_empty() && query.filters.is_empty() {
        result.warnings.push("empty search query - will return all results".to_string());
    }
    if query.terms.len() > MAX_TERMS {
        result.warnings.push("too many search terms - query may be slow".to_string());
    }
    if query.limit > 1000 {
        result.errors.push("result limit too high (max: 1000)".to_string());
        result.is_valid = false;
    }
    if query.limit < 1 {
        result.errors.push("result limit must be at least 1".to_string());
        result.is_valid = false;
    }
    if !(0.0..=1.0).contains(&query.fuzzy_threshold) {
        result.errors.push("fuzzy threshold must be between 0.0 and 1.0".to_string());
        result.is_valid = false;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_quoted_phrase_as_exact_filter() {
        let q = parse_natural_query(r#""hello world" status:open foo"#);
        assert!(q.filters.iter().any(|f| f.operator == FilterOperator::Exact && f.value == "hello world"));
        assert!(q.filters.iter().any(|f| f.field == "status" && f.value == "open"));
        assert!(q.terms.contains(&"foo".to_string()));
    }

    #[test]
    fn drops_stop_words_and_short_terms() {
        let q = parse_natural_query("the a fix parser bug");
        assert!(!q.terms.contains(&"the".to_string()));
        assert!(!q.terms.contains(&"a".to_string()));
        assert!(q.terms.contains(&"fix".to_string()));
    }

    #[test]
    fn caps_terms_at_twenty() {
        let long: Vec<String> = (0..30).map(|i| format!("term{i}")).collect();
        let q = parse_natural_query(&long.join(" "));
        assert_eq!(q.terms.len(), 20);
    }

    #[test]
    fn empty_query_warns() {
        let v = validate_query(&SearchQuery::default());
        assert!(v.is_valid);
        assert!(!v.warnings.is_empty());
    }

    #[test]
    fn out_of_range_limit_is_invalid() {
        let mut q = SearchQuery::default();
        q.limit = 5000;
        let v = validate_query(&q);
        assert!(!v.is_valid);
    }
}
