//! In-memory search index
//!
//! A small, process-local [`SearchIndex`] used by tests and demos so the
//! core can run without a real backend. It implements the subset of query
//! behavior the core relies on: conjunctive term filters, multi-clause
//! sorting, pagination, terms aggregation, and boosted text relevance with
//! bounded edit-distance fuzziness.

use super::{
    Hit, IndexError, IndexSchema, MarketDocument, MatchClause, QuerySpec, SearchIndex,
    SearchResponse, SortClause, SortOrder, TermBucket, TermFilter,
};
use crate::domain::MarketId;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct StoredIndex {
    docs: BTreeMap<String, MarketDocument>,
}

/// Process-local search index
#[derive(Debug, Default)]
pub struct MemoryIndex {
    indices: RwLock<HashMap<String, StoredIndex>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn index_exists(&self, name: &str) -> Result<bool, IndexError> {
        Ok(self.indices.read().await.contains_key(name))
    }

    async fn create_index(&self, name: &str, _schema: &IndexSchema) -> Result<(), IndexError> {
        self.indices
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<(), IndexError> {
        self.indices
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| IndexError::NoSuchIndex(name.to_string()))
    }

    async fn upsert_document(
        &self,
        name: &str,
        id: &MarketId,
        doc: MarketDocument,
    ) -> Result<(), IndexError> {
        let mut indices = self.indices.write().await;
        let index = indices
            .get_mut(name)
            .ok_or_else(|| IndexError::NoSuchIndex(name.to_string()))?;
        // full replacement, never a merge
        index.docs.insert(id.as_str().to_string(), doc);
        Ok(())
    }

    async fn get_document(
        &self,
        name: &str,
        id: &MarketId,
    ) -> Result<Option<MarketDocument>, IndexError> {
        let indices = self.indices.read().await;
        let index = indices
            .get(name)
            .ok_or_else(|| IndexError::NoSuchIndex(name.to_string()))?;
        Ok(index.docs.get(id.as_str()).cloned())
    }

    async fn search(&self, name: &str, query: &QuerySpec) -> Result<SearchResponse, IndexError> {
        let indices = self.indices.read().await;
        let index = indices
            .get(name)
            .ok_or_else(|| IndexError::NoSuchIndex(name.to_string()))?;

        let mut matched: Vec<Hit> = index
            .docs
            .iter()
            .filter(|(_, doc)| query.filters.iter().all(|f| term_matches(doc, f)))
            .filter_map(|(id, doc)| {
                let score = match &query.text {
                    Some(text) => {
                        let score = text
                            .clauses
                            .iter()
                            .filter(|c| clause_matches(doc, c))
                            .map(|c| c.boost)
                            .sum::<f32>();
                        if score == 0.0 {
                            return None;
                        }
                        score
                    }
                    None => 1.0,
                };
                Some(Hit {
                    id: id.clone(),
                    score,
                    source: doc.clone(),
                })
            })
            .collect();

        if query.sort.is_empty() && query.text.is_some() {
            matched.sort_by(|a, b| b.score.total_cmp(&a.score));
        } else {
            matched.sort_by(|a, b| compare_by_clauses(&a.source, &b.source, &query.sort));
        }

        let aggregations = match &query.aggregation {
            Some(agg) => aggregate_terms(&matched, &agg.field, agg.size),
            None => Vec::new(),
        };

        let total = matched.len();
        let hits = matched
            .into_iter()
            .skip(query.from)
            .take(query.size)
            .collect();

        Ok(SearchResponse {
            hits,
            total,
            aggregations,
        })
    }
}

/// A document field as seen by filters and sort clauses
enum FieldValue<'a> {
    Float(f64),
    Long(i64),
    Str(&'a str),
    Bool(bool),
    Terms(&'a [String]),
}

fn field_value<'a>(doc: &'a MarketDocument, field: &str) -> Option<FieldValue<'a>> {
    Some(match field {
        "makerFee" => FieldValue::Float(doc.maker_fee),
        "takerFee" => FieldValue::Float(doc.taker_fee),
        "tradingFee" => FieldValue::Float(doc.trading_fee),
        "tradingPeriod" => FieldValue::Long(doc.trading_period),
        "creationTime" => FieldValue::Long(doc.creation_time),
        "endDate" => FieldValue::Long(doc.end_date),
        "branchId" => FieldValue::Str(&doc.branch_id),
        "description" => FieldValue::Str(&doc.description),
        "extraInfo" => FieldValue::Str(&doc.extra_info),
        "tags" => FieldValue::Terms(&doc.tags),
        "tags_exact" => FieldValue::Terms(&doc.tags_exact),
        "volume" => FieldValue::Float(doc.volume),
        "active" => FieldValue::Bool(doc.active),
        _ => return None,
    })
}

fn term_matches(doc: &MarketDocument, filter: &TermFilter) -> bool {
    match field_value(doc, &filter.field) {
        Some(FieldValue::Str(s)) => filter.value.as_str() == Some(s),
        Some(FieldValue::Bool(b)) => filter.value.as_bool() == Some(b),
        Some(FieldValue::Float(f)) => filter.value.as_f64() == Some(f),
        Some(FieldValue::Long(l)) => filter.value.as_i64() == Some(l),
        Some(FieldValue::Terms(terms)) => filter
            .value
            .as_str()
            .map(|v| terms.iter().any(|t| t == v))
            .unwrap_or(false),
        None => false,
    }
}

fn clause_matches(doc: &MarketDocument, clause: &MatchClause) -> bool {
    let query = clause.query.to_lowercase();
    let haystack: String = match field_value(doc, &clause.field) {
        Some(FieldValue::Str(s)) => s.to_lowercase(),
        Some(FieldValue::Terms(terms)) => terms.join(" ").to_lowercase(),
        _ => return false,
    };

    if clause.phrase {
        return haystack.contains(&query);
    }

    let doc_tokens: Vec<&str> = haystack.split_whitespace().collect();
    query.split_whitespace().any(|q| {
        doc_tokens
            .iter()
            .any(|t| edit_distance(q, t) <= clause.fuzziness as usize)
    })
}

fn compare_by_clauses(a: &MarketDocument, b: &MarketDocument, clauses: &[SortClause]) -> Ordering {
    for clause in clauses {
        let ord = compare_field(a, b, &clause.field);
        let ord = match clause.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_field(a: &MarketDocument, b: &MarketDocument, field: &str) -> Ordering {
    match (field_value(a, field), field_value(b, field)) {
        (Some(FieldValue::Float(x)), Some(FieldValue::Float(y))) => x.total_cmp(&y),
        (Some(FieldValue::Long(x)), Some(FieldValue::Long(y))) => x.cmp(&y),
        (Some(FieldValue::Str(x)), Some(FieldValue::Str(y))) => x.cmp(y),
        (Some(FieldValue::Bool(x)), Some(FieldValue::Bool(y))) => x.cmp(&y),
        _ => Ordering::Equal,
    }
}

fn aggregate_terms(hits: &[Hit], field: &str, size: usize) -> Vec<TermBucket> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for hit in hits {
        if let Some(FieldValue::Terms(terms)) = field_value(&hit.source, field) {
            for term in terms {
                *counts.entry(term.clone()).or_default() += 1;
            }
        }
    }
    let mut buckets: Vec<TermBucket> = counts
        .into_iter()
        .map(|(key, doc_count)| TermBucket { key, doc_count })
        .collect();
    // highest count first; BTreeMap already gave us a stable key order
    buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count));
    buckets.truncate(size);
    buckets
}

/// Plain Levenshtein distance, used to emulate bounded fuzziness
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
