//! Delivery of canonical depth updates to the consumer.
//!
//! Sends never block: when the bounded channel is full the new update is
//! dropped and a warning logged. Consumers detect the gap through the
//! revision ids on the next update they receive.

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::book::BookState;
use crate::exchange::ExchangeName;
use crate::models::book::DepthUpdate;

/// What happened to a published update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    /// Channel full; update discarded.
    Dropped,
    /// Shutdown observed; nothing sent.
    ShuttingDown,
    /// The receiver was dropped.
    ConsumerGone,
}

/// Owns the sending half of the update channel.
///
/// Dropping the publisher closes the channel.
pub struct UpdatePublisher {
    exchange: ExchangeName,
    symbol: String,
    tx: mpsc::Sender<DepthUpdate>,
    shutdown: CancellationToken,
    dropped: u64,
}

impl UpdatePublisher {
    #[must_use]
    pub fn new(
        exchange: ExchangeName,
        symbol: impl Into<String>,
        tx: mpsc::Sender<DepthUpdate>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
            tx,
            shutdown,
            dropped: 0,
        }
    }

    /// Total updates discarded because the channel was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Builds the update for the book's current revision.
    #[must_use]
    pub fn stamp(&self, book: &BookState) -> DepthUpdate {
        let (bids, asks) = book.export_levels();
        let revision = book.revision();
        DepthUpdate {
            exchange: self.exchange,
            symbol: self.symbol.clone(),
            event_time: Utc::now(),
            first_update_id: revision,
            final_update_id: revision,
            prev_update_id: revision.saturating_sub(1),
            bids,
            asks,
        }
    }

    /// Stamps and offers the current book to the consumer.
    ///
    /// Call with the book still locked for the mutation just applied so the
    /// exported levels match the stamped revision.
    pub fn publish(&mut self, book: &BookState) -> PublishOutcome {
        if self.shutdown.is_cancelled() {
            return PublishOutcome::ShuttingDown;
        }

        match self.tx.try_send(self.stamp(book)) {
            Ok(()) => PublishOutcome::Delivered,
            Err(TrySendError::Full(update)) => {
                self.dropped += 1;
                warn!(
                    exchange = %self.exchange,
                    symbol = %self.symbol,
                    revision = update.final_update_id,
                    dropped = self.dropped,
                    "Update channel full, skipping update"
                );
                PublishOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                trace!(exchange = %self.exchange, "Update receiver dropped");
                PublishOutcome::ConsumerGone
            }
        }
    }
}
