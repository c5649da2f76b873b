//! Venue-agnostic boundary consumed by multi-exchange orchestrators.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::Result;
use crate::health::HealthStatus;
use crate::models::book::{DepthUpdate, Snapshot};

/// Venues with a connector in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeName {
    Bitfinex,
}

impl ExchangeName {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeName::Bitfinex => "bitfinex",
        }
    }
}

impl fmt::Display for ExchangeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Streaming order book connector for a single instrument on one venue.
///
/// Implementations are single-use: after the stream ends for any reason,
/// reconnecting means building a fresh connector.
#[async_trait]
pub trait Exchange: Send + Sync {
    fn name(&self) -> ExchangeName;

    /// Wire symbol the connector subscribes to.
    fn symbol(&self) -> &str;

    /// Opens the transport, subscribes, and starts the read loop.
    async fn connect(&self) -> Result<()>;

    /// One-shot REST fetch of the full current book.
    async fn get_snapshot(&self) -> Result<Snapshot>;

    /// Takes the live update stream. Returns `None` after the first call.
    fn updates(&self) -> Option<mpsc::Receiver<DepthUpdate>>;

    fn is_connected(&self) -> bool;

    /// Copy of the current health record.
    fn health(&self) -> HealthStatus;

    /// Stops the read loop, closes the update stream and the transport.
    async fn close(&self) -> Result<()>;
}
