//! Per-connector read loop.
//!
//! [`ReadLoop`] owns the session's read half, the channel binding and the
//! update publisher. It is the only writer of the book: each snapshot or
//! delta is applied and published under one exclusive lock, so readers
//! never see a half-applied mutation and no revision is skipped.

use std::sync::{Arc, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::Session;
use super::handler::{Classifier, ControlMessage, DataPayload, Inbound};
use crate::BookFeedError;
use crate::book::BookState;
use crate::health::HealthTracker;
use crate::publisher::UpdatePublisher;

/// Info code asking clients to reconnect.
const INFO_RECONNECT: i64 = 20051;

/// Info code announcing maintenance mode.
const INFO_MAINTENANCE: i64 = 20060;

/// Why the read loop stopped.
#[derive(Debug)]
pub enum LoopExit {
    /// Cancellation or local close.
    Shutdown,
    /// Transport failure or remote close.
    Transport(BookFeedError),
}

pub struct ReadLoop {
    session: Session,
    classifier: Classifier,
    book: Arc<RwLock<BookState>>,
    health: Arc<HealthTracker>,
    publisher: UpdatePublisher,
    shutdown: CancellationToken,
    symbol: String,
}

impl ReadLoop {
    #[must_use]
    pub fn new(
        session: Session,
        book: Arc<RwLock<BookState>>,
        health: Arc<HealthTracker>,
        publisher: UpdatePublisher,
        shutdown: CancellationToken,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            session,
            classifier: Classifier::new(),
            book,
            health,
            publisher,
            shutdown,
            symbol: symbol.into(),
        }
    }

    /// Reads until shutdown or transport failure.
    ///
    /// On return the session is closed, the connection is marked
    /// disconnected and the publisher is dropped, which closes the update
    /// channel.
    pub async fn run(mut self) -> LoopExit {
        info!(symbol = %self.symbol, "Read loop started");

        let exit = loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    info!(symbol = %self.symbol, "Shutdown signalled, stopping message reading");
                    break LoopExit::Shutdown;
                }
                next = self.session.read_next() => next,
            };

            match next {
                Ok(text) => {
                    self.health.record_message();
                    self.handle(&text);
                }
                Err(BookFeedError::SessionClosed) => break LoopExit::Shutdown,
                Err(e) => {
                    self.health.record_error();
                    error!(symbol = %self.symbol, error = %e, "WebSocket read error");
                    break LoopExit::Transport(e);
                }
            }
        };

        match exit {
            LoopExit::Shutdown => self.session.close().await,
            LoopExit::Transport(_) => self.session.release().await,
        }
        self.health.set_connected(false);
        info!(
            symbol = %self.symbol,
            dropped = self.publisher.dropped(),
            "Read loop stopped"
        );
        exit
    }

    fn handle(&mut self, text: &str) {
        match self.classifier.classify(text) {
            Inbound::Control(control) => self.on_control(control),
            Inbound::Data { payload, .. } => self.on_data(payload),
            Inbound::Ignored => trace!(raw = %text, "Ignoring message"),
        }
    }

    fn on_control(&self, control: ControlMessage) {
        match control {
            ControlMessage::Subscribed {
                chan_id,
                channel,
                symbol,
            } => {
                info!(symbol = %self.symbol, chan_id, ?channel, venue_symbol = ?symbol, "Subscribed to channel");
            }
            ControlMessage::Info { code, msg, version } => match code {
                Some(code @ (INFO_RECONNECT | INFO_MAINTENANCE)) => {
                    warn!(symbol = %self.symbol, code, ?msg, "Venue requested reconnect or entered maintenance");
                }
                _ => info!(symbol = %self.symbol, ?code, ?msg, ?version, "Info"),
            },
            ControlMessage::Error { code, msg } => {
                self.health.record_error();
                warn!(symbol = %self.symbol, ?code, msg = %msg, "Venue reported error");
            }
            ControlMessage::Other(event) => {
                debug!(symbol = %self.symbol, event = %event, "Ignoring control event");
            }
        }
    }

    fn on_data(&mut self, payload: DataPayload) {
        match payload {
            DataPayload::Snapshot(records) => {
                debug!(levels = records.len(), "Applying book snapshot");
                self.apply(|book| book.apply_snapshot(&records));
            }
            DataPayload::Delta(record) => self.apply(|book| book.apply_delta(&record)),
            DataPayload::Heartbeat => trace!("Heartbeat"),
            DataPayload::Rejected(reason) => {
                debug!(reason = %reason, "Dropping malformed book record");
            }
            DataPayload::Unrecognized => trace!("Ignoring unrecognized data payload"),
        }
    }

    fn apply(&mut self, mutate: impl FnOnce(&mut BookState) -> u64) {
        let mut book = self.book.write().unwrap_or_else(PoisonError::into_inner);
        let revision = mutate(&mut *book);
        let outcome = self.publisher.publish(&*book);
        trace!(revision, ?outcome, "Applied book mutation");
    }
}
