//! Write and read pipelines: mapping, single-record indexing, the bulk
//! scanner, and query building

pub mod indexer;
pub mod mapper;
pub mod query;
pub mod scan;

pub use indexer::MarketIndexer;
pub use mapper::to_document;
pub use query::{MarketFilter, QueryOptions, SortKey};
pub use scan::{JobFailure, MarketScanner, ScanJob, ScanOptions, ScanSummary};
