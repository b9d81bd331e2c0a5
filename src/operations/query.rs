//! Query building for the read side
//!
//! Builds [`QuerySpec`]s for the three read operations: sorted market
//! listings, free-text relevance search, and tag aggregation. All filters
//! are conjunctive; the tag filter always targets the exact-match tag
//! field.

use crate::domain::BranchId;
use crate::error::CoreError;
use crate::infrastructure::index::{
    MatchClause, QuerySpec, SortClause, TermFilter, TermsAggregation, TextQuery,
};
use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_TAG_COUNT: usize = 100;

/// Recognized sort keys for market listings
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortKey {
    NewestMarket,
    OldestMarket,
    #[default]
    MostVolume,
    LeastVolume,
    SoonestExpiry,
    FurthestExpiry,
    LowestMakerFee,
    LowestTakerFee,
    HighestMakerFee,
    HighestTakerFee,
}

impl SortKey {
    /// Primary sort plus tiebreak. Everything except the pure volume
    /// sorts tie-breaks on descending volume.
    fn clauses(self) -> Vec<SortClause> {
        match self {
            SortKey::NewestMarket => vec![
                SortClause::desc("creationTime"),
                SortClause::desc("volume"),
            ],
            SortKey::OldestMarket => {
                vec![SortClause::asc("creationTime"), SortClause::desc("volume")]
            }
            SortKey::MostVolume => vec![SortClause::desc("volume")],
            SortKey::LeastVolume => vec![SortClause::asc("volume")],
            SortKey::SoonestExpiry => {
                vec![SortClause::asc("endDate"), SortClause::desc("volume")]
            }
            SortKey::FurthestExpiry => {
                vec![SortClause::desc("endDate"), SortClause::desc("volume")]
            }
            SortKey::LowestMakerFee => {
                vec![SortClause::asc("makerFee"), SortClause::desc("volume")]
            }
            SortKey::LowestTakerFee => {
                vec![SortClause::asc("takerFee"), SortClause::desc("volume")]
            }
            SortKey::HighestMakerFee => {
                vec![SortClause::desc("makerFee"), SortClause::desc("volume")]
            }
            SortKey::HighestTakerFee => {
                vec![SortClause::desc("takerFee"), SortClause::desc("volume")]
            }
        }
    }
}

/// Conjunctive filters shared by the read operations
#[derive(Debug, Clone, Default)]
pub struct MarketFilter {
    pub branch: Option<BranchId>,
    /// Tri-state: unset means no active filter at all
    pub active: Option<bool>,
    /// Exact match against the unanalyzed tag field
    pub tag: Option<String>,
}

impl MarketFilter {
    pub fn branch(branch: impl Into<BranchId>) -> Self {
        Self {
            branch: Some(branch.into()),
            ..Default::default()
        }
    }

    fn term_filters(&self) -> Vec<TermFilter> {
        let mut filters = Vec::new();
        if let Some(branch) = &self.branch {
            filters.push(TermFilter::new("branchId", branch.as_str()));
        }
        if let Some(active) = self.active {
            filters.push(TermFilter::new("active", active));
        }
        if let Some(tag) = &self.tag {
            filters.push(TermFilter::new("tags_exact", tag.as_str()));
        }
        filters
    }

    fn require_branch(&self) -> Result<(), CoreError> {
        if self.branch.is_none() {
            return Err(CoreError::Validation("branch required".to_string()));
        }
        Ok(())
    }
}

/// Pagination for the read operations
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// 1-based page number
    pub page: usize,
    /// Hits per page; `Some(0)` is legal and means aggregation-only
    pub page_size: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: None,
        }
    }
}

impl QueryOptions {
    fn from_and_size(&self) -> (usize, usize) {
        let size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let page = self.page.max(1);
        ((page - 1) * size, size)
    }
}

/// Build a sorted, filtered market listing query
pub fn load_markets(
    filter: &MarketFilter,
    sort: SortKey,
    options: &QueryOptions,
) -> Result<QuerySpec, CoreError> {
    filter.require_branch()?;
    let (from, size) = options.from_and_size();
    Ok(QuerySpec {
        filters: filter.term_filters(),
        text: None,
        sort: sort.clauses(),
        from,
        size,
        aggregation: None,
    })
}

/// Build a free-text relevance query over description, tags, and extra
/// info. An exact phrase hit on the description ranks highest; the other
/// clauses tolerate edit distance 2.
pub fn market_search(
    filter: &MarketFilter,
    text: &str,
    options: &QueryOptions,
) -> Result<QuerySpec, CoreError> {
    filter.require_branch()?;
    if text.trim().is_empty() {
        return Err(CoreError::Validation("query required".to_string()));
    }

    let clause = |field: &str, boost: f32, fuzziness: u8, phrase: bool| MatchClause {
        field: field.to_string(),
        query: text.to_string(),
        boost,
        fuzziness,
        phrase,
    };
    let text_query = TextQuery {
        clauses: vec![
            clause("description", 10.0, 0, true),
            clause("description", 3.0, 2, false),
            clause("tags", 2.0, 2, false),
            clause("extraInfo", 1.0, 2, false),
        ],
    };

    let (from, size) = options.from_and_size();
    Ok(QuerySpec {
        filters: filter.term_filters(),
        text: Some(text_query),
        sort: Vec::new(),
        from,
        size,
        aggregation: None,
    })
}

/// Build a tag aggregation query: the most used exact tags, no hits
pub fn top_tags(filter: &MarketFilter, tag_count: Option<usize>) -> Result<QuerySpec, CoreError> {
    Ok(QuerySpec {
        filters: filter.term_filters(),
        text: None,
        sort: Vec::new(),
        from: 0,
        size: 0,
        aggregation: Some(TermsAggregation {
            field: "tags_exact".to_string(),
            size: tag_count.unwrap_or(DEFAULT_TAG_COUNT),
        }),
    })
}
