//! Search index collaborator interface
//!
//! Markets are projected into a flat document schema and written with
//! upsert semantics: re-indexing an id fully replaces the stored document.
//! The backend is expected to serialize conflicting writes to the same id
//! itself; the core does no application-level locking.

pub mod memory;

use crate::domain::MarketId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryIndex;

/// Search index errors
#[derive(Error, Debug)]
pub enum IndexError {
    /// The index backend has no live connection
    #[error("index not connected")]
    NotConnected,

    /// The named index does not exist
    #[error("no such index: {0}")]
    NoSuchIndex(String),

    /// Backend-side failure
    #[error("index backend error: {0}")]
    Backend(String),
}

/// Field types the index schema is declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Float,
    Long,
    Integer,
    /// Analyzed full-text field
    Text,
    /// Exact-match token field, never analyzed
    Keyword,
    Boolean,
}

/// Declared mapping for one index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSchema {
    pub fields: Vec<(String, FieldType)>,
}

/// A market projected into the index
///
/// Field names match the wire schema of the backend. `tags` is the
/// analyzed copy used for relevance search; `tags_exact` carries the same
/// values as unanalyzed tokens for precise filtering and aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDocument {
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub trading_fee: f64,
    pub trading_period: i64,
    pub creation_time: i64,
    pub end_date: i64,
    pub branch_id: String,
    pub description: String,
    pub extra_info: String,
    pub tags: Vec<String>,
    #[serde(rename = "tags_exact")]
    pub tags_exact: Vec<String>,
    pub volume: f64,
    pub active: bool,
}

impl MarketDocument {
    /// The fixed schema every market index is created with
    pub fn schema() -> IndexSchema {
        use FieldType::*;
        IndexSchema {
            fields: vec![
                ("makerFee".into(), Float),
                ("takerFee".into(), Float),
                ("tradingFee".into(), Float),
                ("tradingPeriod".into(), Integer),
                ("creationTime".into(), Long),
                ("endDate".into(), Long),
                ("branchId".into(), Text),
                ("description".into(), Text),
                ("extraInfo".into(), Text),
                ("tags".into(), Text),
                ("tags_exact".into(), Keyword),
                ("volume".into(), Float),
                ("active".into(), Boolean),
            ],
        }
    }
}

/// Sort direction for a query clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One sort clause; clauses earlier in the list take precedence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortClause {
    pub field: String,
    pub order: SortOrder,
}

impl SortClause {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Exact-match filter on one field; filters are conjunctive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermFilter {
    pub field: String,
    pub value: serde_json::Value,
}

impl TermFilter {
    pub fn new(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// One clause of a relevance query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchClause {
    pub field: String,
    pub query: String,
    pub boost: f32,
    /// Maximum edit distance tolerated; 0 means exact
    pub fuzziness: u8,
    /// Match the query as a whole phrase rather than term by term
    pub phrase: bool,
}

/// Disjunctive relevance query; a document matching any clause is a hit,
/// scored by the sum of matching clause boosts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextQuery {
    pub clauses: Vec<MatchClause>,
}

/// Terms aggregation over an exact-match field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsAggregation {
    pub field: String,
    pub size: usize,
}

/// A fully built query, ready to hand to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub filters: Vec<TermFilter>,
    pub text: Option<TextQuery>,
    pub sort: Vec<SortClause>,
    pub from: usize,
    /// Number of hits to return; 0 is legal and means aggregation-only
    pub size: usize,
    pub aggregation: Option<TermsAggregation>,
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    pub score: f32,
    pub source: MarketDocument,
}

/// One bucket of a terms aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermBucket {
    pub key: String,
    pub doc_count: usize,
}

/// Result of a search call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<Hit>,
    /// Total matching documents, independent of pagination
    pub total: usize,
    pub aggregations: Vec<TermBucket>,
}

/// The search backend markets are projected into
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Whether the named index exists
    async fn index_exists(&self, name: &str) -> Result<bool, IndexError>;

    /// Create the named index with the given schema
    async fn create_index(&self, name: &str, schema: &IndexSchema) -> Result<(), IndexError>;

    /// Drop the named index and everything in it
    async fn delete_index(&self, name: &str) -> Result<(), IndexError>;

    /// Create-or-replace the document stored at `id`
    async fn upsert_document(
        &self,
        name: &str,
        id: &MarketId,
        doc: MarketDocument,
    ) -> Result<(), IndexError>;

    /// Fetch the document stored at `id`, if any
    async fn get_document(
        &self,
        name: &str,
        id: &MarketId,
    ) -> Result<Option<MarketDocument>, IndexError>;

    /// Execute a query
    async fn search(&self, name: &str, query: &QuerySpec) -> Result<SearchResponse, IndexError>;
}
