//! Bitfinex order book connector.
//!
//! Wires the session, classifier, book state and publisher into one
//! lifecycle:
//!
//! ```text
//! Idle -> Connecting -> Subscribing -> Streaming -> Closing -> Closed
//!            \              \              \
//!             +--------------+--------------+--> Errored
//! ```
//!
//! A connector is single-use. Reconnecting is the caller's policy and
//! means building a new connector.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::book::{BookState, TopOfBook};
use crate::config::BitfinexConfig;
use crate::exchange::{Exchange, ExchangeName};
use crate::health::{HealthStatus, HealthTracker};
use crate::models::SubscribeRequest;
use crate::models::book::{DepthUpdate, PriceLevel, Snapshot};
use crate::publisher::UpdatePublisher;
use crate::rest::fetch_snapshot;
use crate::symbol::to_wire_symbol;
use crate::websocket::{LoopExit, ReadLoop, Session, SessionCloser};
use crate::{BookFeedError, Result};

/// Lifecycle state of a [`BitfinexConnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Idle,
    Connecting,
    Subscribing,
    Streaming,
    Closing,
    Closed,
    /// Absorbing: the transport failed while connecting or streaming.
    Errored,
}

impl ConnectorState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorState::Idle => "idle",
            ConnectorState::Connecting => "connecting",
            ConnectorState::Subscribing => "subscribing",
            ConnectorState::Streaming => "streaming",
            ConnectorState::Closing => "closing",
            ConnectorState::Closed => "closed",
            ConnectorState::Errored => "errored",
        }
    }

    fn is_active(self) -> bool {
        matches!(
            self,
            ConnectorState::Connecting | ConnectorState::Subscribing | ConnectorState::Streaming
        )
    }
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Streams one Bitfinex order book and republishes it as [`DepthUpdate`]s.
pub struct BitfinexConnector {
    config: BitfinexConfig,
    /// Wire symbol, e.g. `tBTCUSD`.
    symbol: String,
    http: reqwest::Client,
    state: Arc<Mutex<ConnectorState>>,
    book: Arc<RwLock<BookState>>,
    health: Arc<HealthTracker>,
    shutdown: CancellationToken,
    updates_tx: Mutex<Option<mpsc::Sender<DepthUpdate>>>,
    updates_rx: Mutex<Option<mpsc::Receiver<DepthUpdate>>>,
    closer: Mutex<Option<SessionCloser>>,
    task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl BitfinexConnector {
    /// Creates an idle connector.
    ///
    /// # Errors
    ///
    /// Returns [`BookFeedError::Http`] if the HTTP client cannot be built.
    pub fn new(config: BitfinexConfig) -> Result<Self> {
        Self::with_shutdown(config, &CancellationToken::new())
    }

    /// Creates an idle connector that also stops when `parent` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`BookFeedError::Http`] if the HTTP client cannot be built.
    pub fn with_shutdown(config: BitfinexConfig, parent: &CancellationToken) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.snapshot_timeout)
            .build()?;
        let (tx, rx) = mpsc::channel(config.update_capacity.max(1));

        Ok(Self {
            symbol: to_wire_symbol(&config.symbol),
            config,
            http,
            state: Arc::new(Mutex::new(ConnectorState::Idle)),
            book: Arc::new(RwLock::new(BookState::new())),
            health: Arc::new(HealthTracker::new()),
            shutdown: parent.child_token(),
            updates_tx: Mutex::new(Some(tx)),
            updates_rx: Mutex::new(Some(rx)),
            closer: Mutex::new(None),
            task: AsyncMutex::new(None),
        })
    }

    #[must_use]
    pub fn config(&self) -> &BitfinexConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> ConnectorState {
        *lock(&self.state)
    }

    /// Revision of the last applied snapshot or delta.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.read_book(BookState::revision)
    }

    /// Point-in-time copy of the streamed book as `(bids, asks)`.
    #[must_use]
    pub fn book_levels(&self) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        self.read_book(BookState::export_levels)
    }

    #[must_use]
    pub fn top_of_book(&self) -> TopOfBook {
        self.read_book(BookState::top_of_book)
    }

    fn read_book<T>(&self, f: impl FnOnce(&BookState) -> T) -> T {
        f(&self.book.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn advance(
        &self,
        operation: &'static str,
        from: ConnectorState,
        to: ConnectorState,
    ) -> Result<()> {
        let mut state = lock(&self.state);
        if *state != from {
            return Err(BookFeedError::InvalidState {
                operation,
                state: *state,
            });
        }
        *state = to;
        Ok(())
    }

    /// Ends a connect attempt: cancellation moves an active connector to
    /// `Closed`, any other failure to `Errored` with the error counted.
    ///
    /// The update sender is dropped so consumers see end-of-stream.
    fn fail(&self, err: BookFeedError) -> BookFeedError {
        let cancelled = matches!(err, BookFeedError::SessionClosed);
        if !cancelled {
            self.health.record_error();
        }
        drop(lock(&self.updates_tx).take());

        let mut state = lock(&self.state);
        if state.is_active() {
            *state = if cancelled {
                ConnectorState::Closed
            } else {
                ConnectorState::Errored
            };
        }
        if cancelled {
            info!(exchange = %ExchangeName::Bitfinex, symbol = %self.symbol, state = %*state, "Connect cancelled");
        } else {
            error!(exchange = %ExchangeName::Bitfinex, symbol = %self.symbol, error = %err, state = %*state, "Connect failed");
        }
        err
    }

    async fn open_session(&self) -> Result<Session> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(BookFeedError::SessionClosed),
            session = Session::connect(
                &self.config.websocket_url,
                self.config.handshake_timeout,
                &self.shutdown,
            ) => session,
        }
    }

    /// Releases a session abandoned part-way through `connect`.
    async fn abandon(&self, session: Session) {
        session.close().await;
        self.health.set_connected(false);
    }
}

#[async_trait]
impl Exchange for BitfinexConnector {
    fn name(&self) -> ExchangeName {
        ExchangeName::Bitfinex
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn connect(&self) -> Result<()> {
        self.advance("connect", ConnectorState::Idle, ConnectorState::Connecting)?;
        info!(
            exchange = %self.name(),
            symbol = %self.symbol,
            url = %self.config.websocket_url,
            "Connecting to WebSocket"
        );

        let session = match self.open_session().await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e)),
        };
        self.health.set_connected(true);
        info!(exchange = %self.name(), "WebSocket connected successfully");

        if let Err(e) = self.advance(
            "subscribe",
            ConnectorState::Connecting,
            ConnectorState::Subscribing,
        ) {
            self.abandon(session).await;
            return Err(e);
        }

        let request = SubscribeRequest::book(
            &self.symbol,
            &self.config.precision,
            &self.config.frequency,
            &self.config.length,
        );
        if let Err(e) = session.subscribe(&request).await {
            self.abandon(session).await;
            return Err(self.fail(e));
        }

        // Held until the handle is stored so `close` always finds the task.
        let mut task = self.task.lock().await;
        if let Err(e) = self.advance(
            "stream",
            ConnectorState::Subscribing,
            ConnectorState::Streaming,
        ) {
            self.abandon(session).await;
            return Err(e);
        }
        let tx = lock(&self.updates_tx).take();
        let Some(tx) = tx else {
            self.abandon(session).await;
            return Err(BookFeedError::InvalidState {
                operation: "stream",
                state: self.state(),
            });
        };

        let publisher = UpdatePublisher::new(
            self.name(),
            self.symbol.clone(),
            tx,
            self.shutdown.clone(),
        );
        *lock(&self.closer) = Some(session.closer());
        let read_loop = ReadLoop::new(
            session,
            Arc::clone(&self.book),
            Arc::clone(&self.health),
            publisher,
            self.shutdown.clone(),
            self.symbol.clone(),
        );

        let state = Arc::clone(&self.state);
        *task = Some(tokio::spawn(async move {
            let exit = read_loop.run().await;
            let mut state = lock(&state);
            if *state == ConnectorState::Streaming {
                *state = match exit {
                    LoopExit::Shutdown => ConnectorState::Closed,
                    LoopExit::Transport(_) => ConnectorState::Errored,
                };
            }
        }));

        Ok(())
    }

    async fn get_snapshot(&self) -> Result<Snapshot> {
        fetch_snapshot(
            &self.http,
            &self.config.rest_url,
            &self.symbol,
            &self.config.precision,
            &self.config.length,
        )
        .await
        .inspect_err(|e| {
            self.health.record_error();
            warn!(exchange = %self.name(), symbol = %self.symbol, error = %e, "Snapshot fetch failed");
        })
    }

    fn updates(&self) -> Option<mpsc::Receiver<DepthUpdate>> {
        lock(&self.updates_rx).take()
    }

    fn is_connected(&self) -> bool {
        self.health.is_connected()
    }

    fn health(&self) -> HealthStatus {
        self.health.snapshot()
    }

    async fn close(&self) -> Result<()> {
        {
            let mut state = lock(&self.state);
            if !matches!(*state, ConnectorState::Closed | ConnectorState::Errored) {
                *state = ConnectorState::Closing;
            }
        }
        self.shutdown.cancel();

        // Concurrent callers queue here until the loop has fully exited.
        let mut task = self.task.lock().await;
        if let Some(handle) = task.take()
            && let Err(e) = handle.await
        {
            error!(exchange = %self.name(), error = %e, "Read loop task failed");
        }

        let closer = lock(&self.closer).take();
        if let Some(closer) = closer {
            closer.close().await;
        }
        // Closes the stream if `connect` never handed the sender off.
        drop(lock(&self.updates_tx).take());
        drop(task);

        if self.health.is_connected() {
            self.health.set_connected(false);
        }
        let mut state = lock(&self.state);
        if *state == ConnectorState::Closing {
            *state = ConnectorState::Closed;
        }
        info!(exchange = %self.name(), symbol = %self.symbol, state = %*state, "Connector closed");
        Ok(())
    }
}

impl Drop for BitfinexConnector {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
