//! Projection of raw market state into index documents
//!
//! Pure, deterministic, no side effects. The only hard failures are a
//! malformed id and a missing branch id; a fee or volume string that does
//! not parse degrades to NaN instead of failing the record, matching the
//! tolerance of the upstream data.

use crate::domain::{MarketId, MarketInfo};
use crate::error::CoreError;
use crate::infrastructure::index::MarketDocument;

/// Map a raw market record to its index document
///
/// Returns the normalized id alongside the document; the document is
/// always stored under the normalized id.
pub fn to_document(raw_id: &str, info: &MarketInfo) -> Result<(MarketId, MarketDocument), CoreError> {
    let id = MarketId::parse(raw_id)
        .ok_or_else(|| CoreError::Validation(format!("invalid market id: {raw_id}")))?;

    let branch_id = info
        .branch_id
        .as_ref()
        .ok_or_else(|| CoreError::Validation(format!("market {id} has no branch id")))?;

    let doc = MarketDocument {
        maker_fee: parse_decimal(&info.maker_fee),
        taker_fee: parse_decimal(&info.taker_fee),
        trading_fee: parse_decimal(&info.trading_fee),
        trading_period: info.trading_period,
        creation_time: info.creation_time,
        end_date: info.end_date,
        branch_id: branch_id.as_str().to_string(),
        description: info.description.clone(),
        extra_info: info.extra_info.clone(),
        tags: info.tags.clone(),
        tags_exact: info.tags.clone(),
        volume: parse_decimal(&info.volume),
        // derived, never taken from the input: a market is active until
        // the first resolution outcome lands
        active: info.winning_outcomes.is_empty(),
    };

    Ok((id, doc))
}

fn parse_decimal(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}
