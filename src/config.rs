//! Application configuration loaded from environment variables.
//!
//! Every variable is optional; empty values are treated as absent:
//! - `BITFINEX_WEBSOCKET_URL`: overrides the public WebSocket endpoint
//! - `BITFINEX_REST_URL`: overrides the public REST base URL
//! - `BITFINEX_SYMBOL`: generic instrument symbol (e.g. `BTCUSDT`)
//! - `BITFINEX_BOOK_PRECISION`: `P0`..`P4`
//! - `BITFINEX_BOOK_FREQUENCY`: `F0` (realtime) or `F1` (throttled)
//! - `BITFINEX_BOOK_LENGTH`: `1`, `25`, `100` or `250`
//! - `BITFINEX_UPDATE_CAPACITY`: bounded update channel capacity

use std::time::Duration;

use crate::BookFeedError;

/// Default public WebSocket endpoint.
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://api-pub.bitfinex.com/ws/2";

/// Default public REST base URL.
pub const DEFAULT_REST_URL: &str = "https://api-pub.bitfinex.com/v2";

const DEFAULT_SYMBOL: &str = "BTCUSDT";
const DEFAULT_PRECISION: &str = "P0";
const DEFAULT_FREQUENCY: &str = "F0";
const DEFAULT_LENGTH: &str = "100";
const DEFAULT_UPDATE_CAPACITY: usize = 1000;

/// Bound on the WebSocket handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on the REST bootstrap request.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

const PRECISIONS: &[&str] = &["P0", "P1", "P2", "P3", "P4"];
const FREQUENCIES: &[&str] = &["F0", "F1"];
const LENGTHS: &[&str] = &["1", "25", "100", "250"];

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bitfinex: BitfinexConfig,
}

/// Bitfinex-specific configuration values.
#[derive(Debug, Clone)]
pub struct BitfinexConfig {
    pub websocket_url: String,
    pub rest_url: String,
    /// Generic symbol; mapped to the wire symbol by the connector.
    pub symbol: String,
    pub precision: String,
    pub frequency: String,
    pub length: String,
    pub update_capacity: usize,
    pub handshake_timeout: Duration,
    pub snapshot_timeout: Duration,
}

impl Default for BitfinexConfig {
    fn default() -> Self {
        Self {
            websocket_url: DEFAULT_WEBSOCKET_URL.to_string(),
            rest_url: DEFAULT_REST_URL.to_string(),
            symbol: DEFAULT_SYMBOL.to_string(),
            precision: DEFAULT_PRECISION.to_string(),
            frequency: DEFAULT_FREQUENCY.to_string(),
            length: DEFAULT_LENGTH.to_string(),
            update_capacity: DEFAULT_UPDATE_CAPACITY,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            snapshot_timeout: SNAPSHOT_TIMEOUT,
        }
    }
}

impl BitfinexConfig {
    /// Returns the default configuration for the given generic symbol.
    #[must_use]
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`BookFeedError::Config`] if a variable is set to a value the
/// venue does not accept.
pub fn fetch_config() -> crate::Result<AppConfig> {
    from_lookup(|name| std::env::var(name).ok())
}

/// Builds the configuration from an arbitrary variable lookup.
///
/// # Errors
///
/// Returns [`BookFeedError::Config`] naming the first offending variable.
pub fn from_lookup<F>(lookup: F) -> crate::Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|s| !s.is_empty());
    let mut config = BitfinexConfig::default();

    if let Some(url) = var("BITFINEX_WEBSOCKET_URL") {
        config.websocket_url = url;
    }
    if let Some(url) = var("BITFINEX_REST_URL") {
        config.rest_url = url.trim_end_matches('/').to_string();
    }
    if let Some(symbol) = var("BITFINEX_SYMBOL") {
        config.symbol = symbol.to_ascii_uppercase();
    }
    if let Some(precision) = var("BITFINEX_BOOK_PRECISION") {
        config.precision = one_of("BITFINEX_BOOK_PRECISION", precision, PRECISIONS)?;
    }
    if let Some(frequency) = var("BITFINEX_BOOK_FREQUENCY") {
        config.frequency = one_of("BITFINEX_BOOK_FREQUENCY", frequency, FREQUENCIES)?;
    }
    if let Some(length) = var("BITFINEX_BOOK_LENGTH") {
        config.length = one_of("BITFINEX_BOOK_LENGTH", length, LENGTHS)?;
    }
    if let Some(capacity) = var("BITFINEX_UPDATE_CAPACITY") {
        config.update_capacity = match capacity.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(BookFeedError::Config(format!(
                    "BITFINEX_UPDATE_CAPACITY must be a positive integer, got {capacity:?}"
                )));
            }
        };
    }

    Ok(AppConfig { bitfinex: config })
}

fn one_of(name: &str, value: String, allowed: &[&str]) -> crate::Result<String> {
    if allowed.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(BookFeedError::Config(format!(
            "{name} must be one of {allowed:?}, got {value:?}"
        )))
    }
}
