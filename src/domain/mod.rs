//! Domain types for the market index

pub mod market;

pub use market::{BranchId, ChainEvent, ChainEventKind, MarketId, MarketInfo};
