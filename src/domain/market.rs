//! Market - a prediction market tracked by the index
//!
//! Markets live on a branch of the chain and are addressed by a hex id.
//! Ids arriving from event filters are sometimes zero-padded, so every id
//! entering the system goes through [`MarketId::parse`] first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Branch of the chain a market belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub String);

impl BranchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BranchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Normalized market identifier
///
/// Always lowercase, always `0x`-prefixed, never zero-padded. The same
/// market can show up as `0x0A12345` in one filter payload and `0xa12345`
/// in another; both normalize to the same `MarketId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Parse and normalize a raw id. Returns `None` for anything that is
    /// not a `0x`-prefixed hex string.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        let rest = lowered.strip_prefix("0x")?;
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let stripped = rest.trim_start_matches('0');
        // an all-zero id collapses to the canonical 0x0
        if stripped.is_empty() {
            return Some(Self("0x0".to_string()));
        }
        Some(Self(format!("0x{stripped}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Raw market state as returned by the chain RPC
///
/// Fee and volume fields come over the wire as decimal strings; they are
/// only coerced to floats when the market is projected into the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketInfo {
    /// Branch the market lives on; absent on malformed upstream records
    pub branch_id: Option<BranchId>,
    pub maker_fee: String,
    pub taker_fee: String,
    pub trading_fee: String,
    pub trading_period: i64,
    pub creation_time: i64,
    pub end_date: i64,
    pub description: String,
    pub extra_info: String,
    pub tags: Vec<String>,
    pub volume: String,
    /// Resolution outcomes; empty while the market is still trading.
    /// Once an outcome lands the market is permanently inactive.
    pub winning_outcomes: Vec<String>,
}

impl Default for MarketInfo {
    fn default() -> Self {
        Self {
            branch_id: None,
            maker_fee: String::new(),
            taker_fee: String::new(),
            trading_fee: String::new(),
            trading_period: 0,
            creation_time: 0,
            end_date: 0,
            description: String::new(),
            extra_info: String::new(),
            tags: Vec::new(),
            volume: String::new(),
            winning_outcomes: Vec::new(),
        }
    }
}

/// Event kinds the live watcher subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChainEventKind {
    MarketCreated,
    LogFillTx,
    TradingFeeUpdated,
    LogAddTx,
    LogCancel,
}

impl ChainEventKind {
    /// The full set of kinds the watcher cares about
    pub const ALL: [ChainEventKind; 5] = [
        ChainEventKind::MarketCreated,
        ChainEventKind::LogFillTx,
        ChainEventKind::TradingFeeUpdated,
        ChainEventKind::LogAddTx,
        ChainEventKind::LogCancel,
    ];

    /// Payload key the affected market id nests under.
    /// The key genuinely differs per event kind upstream.
    fn id_key(self) -> &'static str {
        match self {
            ChainEventKind::MarketCreated | ChainEventKind::TradingFeeUpdated => "marketID",
            ChainEventKind::LogFillTx | ChainEventKind::LogAddTx | ChainEventKind::LogCancel => {
                "market"
            }
        }
    }
}

/// A change notification from an upstream event filter
#[derive(Debug, Clone)]
pub struct ChainEvent {
    pub kind: ChainEventKind,
    /// Raw filter payload; shape varies by kind
    pub payload: serde_json::Value,
}

impl ChainEvent {
    pub fn new(kind: ChainEventKind, payload: serde_json::Value) -> Self {
        Self { kind, payload }
    }

    /// Extract and normalize the affected market id, if the payload has one
    pub fn market_id(&self) -> Option<MarketId> {
        self.payload
            .get(self.kind.id_key())
            .and_then(|v| v.as_str())
            .and_then(MarketId::parse)
    }
}
