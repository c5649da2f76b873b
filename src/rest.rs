//! REST bootstrap of the full order book.
//!
//! The [`Book`](https://docs.bitfinex.com/reference/rest-public-book)
//! endpoint returns an array of `[PRICE, COUNT, AMOUNT]` entries. It is
//! fetched once, out-of-band, and never feeds the streamed book state.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::Result;
use crate::exchange::ExchangeName;
use crate::models::book::{BookRecord, PriceLevel, Side, Snapshot};

/// Builds the book endpoint URL for a wire symbol.
#[must_use]
pub fn book_url(rest_url: &str, symbol: &str, precision: &str) -> String {
    format!("{}/book/{symbol}/{precision}", rest_url.trim_end_matches('/'))
}

/// Fetches the current book for `symbol` and converts it to a [`Snapshot`].
///
/// # Errors
///
/// Returns [`BookFeedError::Http`](crate::BookFeedError::Http) if the
/// request fails, the venue answers with a non-success status, or the
/// body is not a JSON array.
pub async fn fetch_snapshot(
    client: &reqwest::Client,
    rest_url: &str,
    symbol: &str,
    precision: &str,
    length: &str,
) -> Result<Snapshot> {
    let url = book_url(rest_url, symbol, precision);
    info!(url = %url, "Fetching orderbook snapshot");

    let response = client
        .get(&url)
        .query(&[("len", length)])
        .send()
        .await?
        .error_for_status()?;
    let entries: Vec<Value> = response.json().await?;

    let snapshot = convert_snapshot(ExchangeName::Bitfinex, symbol, &entries);
    info!(
        symbol,
        bids = snapshot.bids.len(),
        asks = snapshot.asks.len(),
        "Fetched orderbook snapshot"
    );
    Ok(snapshot)
}

/// Splits raw entries into bid and ask levels; invalid entries are skipped.
#[must_use]
pub fn convert_snapshot(exchange: ExchangeName, symbol: &str, entries: &[Value]) -> Snapshot {
    let mut bids = Vec::new();
    let mut asks = Vec::new();

    for entry in entries {
        let record = match BookRecord::from_value(entry) {
            Ok(record) if !record.is_removal() => record,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "Skipping snapshot entry");
                continue;
            }
        };
        let level = PriceLevel::new(record.price_key(), record.quantity());
        match record.side() {
            Side::Bid => bids.push(level),
            Side::Ask => asks.push(level),
        }
    }

    Snapshot {
        exchange,
        symbol: symbol.to_string(),
        last_update_id: 0,
        bids,
        asks,
        timestamp: Utc::now(),
    }
}
