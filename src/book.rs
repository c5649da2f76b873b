//! Local order book reconstructed from streamed snapshots and deltas.
//!
//! Each side maps a canonical price string to a canonical quantity string.
//! A price lives on at most one side and every stored quantity is strictly
//! positive; removals delete the key instead of storing zero.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::models::book::{BookRecord, PriceLevel, Side, parse_decimal};

/// Authoritative in-memory book for one instrument.
#[derive(Debug, Default)]
pub struct BookState {
    bids: HashMap<String, String>,
    asks: HashMap<String, String>,
    /// Bumped by exactly one for every applied snapshot or delta.
    revision: u64,
}

/// Best prices derived from the current book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopOfBook {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub mid_price: Option<Decimal>,
}

impl BookState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces both sides with the given records.
    ///
    /// Order counts are not stored and zero-count entries are skipped.
    /// Returns the new revision.
    pub fn apply_snapshot(&mut self, records: &[BookRecord]) -> u64 {
        self.bids.clear();
        self.asks.clear();
        for record in records.iter().filter(|r| !r.is_removal()) {
            self.upsert(record);
        }
        self.bump()
    }

    /// Merges one incremental record. Returns the new revision.
    ///
    /// A zero count removes the price; any other count inserts or
    /// overwrites it with the absolute amount.
    pub fn apply_delta(&mut self, record: &BookRecord) -> u64 {
        if record.is_removal() {
            let key = record.price_key();
            // A deleted price is absent from both sides afterwards.
            self.side_mut(record.side()).remove(&key);
            self.side_mut(record.side().opposite()).remove(&key);
        } else {
            self.upsert(record);
        }
        self.bump()
    }

    fn upsert(&mut self, record: &BookRecord) {
        let key = record.price_key();
        let side = record.side();
        self.side_mut(side.opposite()).remove(&key);
        self.side_mut(side).insert(key, record.quantity());
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn side_mut(&mut self, side: Side) -> &mut HashMap<String, String> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Copies both sides as `(bids, asks)`, in no particular price order.
    #[must_use]
    pub fn export_levels(&self) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        (levels(&self.bids), levels(&self.asks))
    }

    #[must_use]
    pub fn bid(&self, price: &str) -> Option<&str> {
        self.bids.get(price).map(String::as_str)
    }

    #[must_use]
    pub fn ask(&self, price: &str) -> Option<&str> {
        self.asks.get(price).map(String::as_str)
    }

    #[must_use]
    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    #[must_use]
    pub fn ask_count(&self) -> usize {
        self.asks.len()
    }

    /// Best bid, best ask, and when both exist, spread and mid price.
    #[must_use]
    pub fn top_of_book(&self) -> TopOfBook {
        let best_bid = prices(&self.bids).max();
        let best_ask = prices(&self.asks).min();
        let (spread, mid_price) = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => (Some(ask - bid), Some((ask + bid) / Decimal::TWO)),
            _ => (None, None),
        };
        TopOfBook {
            best_bid,
            best_ask,
            spread,
            mid_price,
        }
    }
}

fn levels(side: &HashMap<String, String>) -> Vec<PriceLevel> {
    side.iter()
        .map(|(price, quantity)| PriceLevel::new(price.as_str(), quantity.as_str()))
        .collect()
}

/// Prices outside the decimal range are skipped.
fn prices(side: &HashMap<String, String>) -> impl Iterator<Item = Decimal> + '_ {
    side.keys().filter_map(|price| parse_decimal(price).ok())
}
