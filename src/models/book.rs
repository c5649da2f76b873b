//! Order book channel models.
//!
//! Wire records arrive as `[PRICE, COUNT, AMOUNT]` tuples of JSON numbers;
//! the canonical records republished to consumers carry prices and
//! quantities as fixed-notation decimal text.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::BookFeedError;
use crate::exchange::ExchangeName;

/// Book side, inferred from the sign of a record's amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Positive amounts are bids; everything else is an ask.
    #[must_use]
    pub fn from_amount(amount: f64) -> Self {
        if amount > 0.0 { Side::Bid } else { Side::Ask }
    }

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// A single validated `[PRICE, COUNT, AMOUNT]` record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookRecord {
    pub price: f64,
    /// Number of orders at this level; zero deletes the level.
    pub count: u64,
    /// Signed size: positive for bids, negative for asks.
    pub amount: f64,
}

impl BookRecord {
    /// Decodes a record from an untyped JSON tuple.
    ///
    /// Trailing elements beyond the third are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BookFeedError::MalformedMessage`] if the value is not an
    /// array of at least three finite numbers, the count is not a
    /// non-negative integer, or an upsert carries a zero amount.
    pub fn from_value(value: &Value) -> crate::Result<Self> {
        let fields = value
            .as_array()
            .filter(|fields| fields.len() >= 3)
            .ok_or_else(|| malformed("book record must be an array of three numbers", value))?;

        let price = finite(&fields[0]).ok_or_else(|| malformed("invalid price", value))?;
        let count = order_count(&fields[1]).ok_or_else(|| malformed("invalid count", value))?;
        let amount = finite(&fields[2]).ok_or_else(|| malformed("invalid amount", value))?;

        if count != 0 && amount == 0.0 {
            return Err(malformed("non-empty level with zero amount", value));
        }

        Ok(Self {
            price,
            count,
            amount,
        })
    }

    #[must_use]
    pub fn side(&self) -> Side {
        Side::from_amount(self.amount)
    }

    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.count == 0
    }

    /// Canonical price key.
    #[must_use]
    pub fn price_key(&self) -> String {
        canonical_decimal(self.price)
    }

    /// Canonical unsigned quantity.
    #[must_use]
    pub fn quantity(&self) -> String {
        canonical_decimal(self.amount.abs())
    }
}

fn malformed(reason: &str, value: &Value) -> BookFeedError {
    BookFeedError::MalformedMessage(format!("{reason}: {value}"))
}

fn finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

fn order_count(value: &Value) -> Option<u64> {
    if let Some(count) = value.as_u64() {
        return Some(count);
    }
    // Some payloads encode integral counts as floats (`2.0`).
    value
        .as_f64()
        .filter(|c| c.is_finite() && *c >= 0.0 && c.fract() == 0.0 && *c <= u64::MAX as f64)
        .map(|c| c as u64)
}

/// Formats a float as fixed-notation decimal text.
///
/// Uses the shortest digits that round-trip the value and never an
/// exponent; integral values keep one fractional digit (`101.0`).
#[must_use]
pub fn canonical_decimal(value: f64) -> String {
    // `-0.0` would otherwise render as "-0.0".
    let value = if value == 0.0 { 0.0 } else { value };
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

/// A single price level in a canonical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceLevel {
    pub price: String,
    pub quantity: String,
}

impl PriceLevel {
    #[must_use]
    pub fn new(price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            quantity: quantity.into(),
        }
    }

    /// Parses the price as an exact decimal.
    ///
    /// # Errors
    ///
    /// Returns [`BookFeedError::MalformedMessage`] if the text is not a decimal.
    pub fn price_decimal(&self) -> crate::Result<Decimal> {
        parse_decimal(&self.price)
    }

    /// Parses the quantity as an exact decimal.
    ///
    /// # Errors
    ///
    /// Returns [`BookFeedError::MalformedMessage`] if the text is not a decimal.
    pub fn quantity_decimal(&self) -> crate::Result<Decimal> {
        parse_decimal(&self.quantity)
    }
}

pub(crate) fn parse_decimal(text: &str) -> crate::Result<Decimal> {
    text.parse::<Decimal>()
        .map_err(|e| BookFeedError::MalformedMessage(format!("invalid decimal {text:?}: {e}")))
}

/// Canonical depth update published after every applied book mutation.
///
/// `first_update_id == final_update_id` and `prev_update_id ==
/// final_update_id - 1`, so consumers can detect dropped updates.
#[derive(Debug, Clone, Serialize)]
pub struct DepthUpdate {
    pub exchange: ExchangeName,
    pub symbol: String,
    pub event_time: DateTime<Utc>,
    pub first_update_id: u64,
    pub final_update_id: u64,
    pub prev_update_id: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// Full book fetched out-of-band at connect time.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub exchange: ExchangeName,
    pub symbol: String,
    /// Always zero for the REST bootstrap.
    pub last_update_id: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub timestamp: DateTime<Utc>,
}
