//! Generic-to-wire symbol mapping.
//!
//! Bitfinex prefixes trading pairs with `t` and quotes tether as `UST`,
//! so `BTCUSDT` becomes `tBTCUSD` on the wire.

/// Marker prefixed to every trading pair.
const TRADING_PREFIX: char = 't';

/// Quote suffixes whose trailing character the venue drops.
const TRUNCATED_QUOTES: &[&str] = &["USDT"];

/// Maps a generic symbol such as `BTCUSDT` to the venue's wire symbol.
///
/// Malformed input is not rejected here; the venue refuses the subscription
/// and reports it as an `error` event.
#[must_use]
pub fn to_wire_symbol(symbol: &str) -> String {
    // Quotes are ASCII, so dropping the last byte stays on a char boundary.
    if symbol.len() >= 6 && TRUNCATED_QUOTES.iter().any(|q| symbol.ends_with(q)) {
        return format!("{TRADING_PREFIX}{}", &symbol[..symbol.len() - 1]);
    }
    format!("{TRADING_PREFIX}{symbol}")
}
