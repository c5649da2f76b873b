//! Async WebSocket client for the Bitfinex WebSocket V2 API.
//!
//! This module is organized by concern:
//! - [`subscription`] - Book channel subscribe request
//! - [`handler`] - Inbound message classification
//! - [`connection`] - The per-connector read loop

pub mod connection;
pub mod handler;
pub mod subscription;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use tungstenite::Message;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

use crate::models::SubscribeRequest;
use crate::{BookFeedError, Result};

pub use connection::{LoopExit, ReadLoop};
pub use handler::{Classifier, ControlMessage, DataPayload, Inbound, decode};
pub use subscription::subscribe_book;

/// Write half of a Bitfinex WebSocket connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a Bitfinex WebSocket connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Establishes a WebSocket connection to the given URL within `timeout`.
///
/// # Errors
///
/// Returns [`BookFeedError::HandshakeTimeout`] if the handshake does not
/// finish in time, or [`BookFeedError::WebSocket`] if it fails.
pub async fn connect(url: &str, timeout: Duration) -> Result<(WsWriter, WsReader)> {
    let (ws_stream, response) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| BookFeedError::HandshakeTimeout(timeout))??;
    info!(url, status = ?response.status(), "WebSocket handshake completed");

    Ok(ws_stream.split())
}

/// One persistent duplex connection to the venue.
///
/// The read half is owned by whoever calls [`Session::read_next`]; the
/// write half is shared with any [`SessionCloser`] handed out.
pub struct Session {
    reader: WsReader,
    writer: Arc<Mutex<WsWriter>>,
    closed: CancellationToken,
    close_sent: Arc<AtomicBool>,
}

impl Session {
    /// Opens a session. Cancelling `parent` closes the session's reads too.
    ///
    /// # Errors
    ///
    /// See [`connect`].
    pub async fn connect(url: &str, timeout: Duration, parent: &CancellationToken) -> Result<Self> {
        let (writer, reader) = connect(url, timeout).await?;
        Ok(Self {
            reader,
            writer: Arc::new(Mutex::new(writer)),
            closed: parent.child_token(),
            close_sent: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Sends a book subscription request.
    ///
    /// # Errors
    ///
    /// Returns a [`BookFeedError`] if serializing or sending fails.
    pub async fn subscribe(&self, request: &SubscribeRequest) -> Result<()> {
        let mut writer = self.writer.lock().await;
        subscribe_book(&mut writer, request).await
    }

    /// Waits for the next text payload from the venue.
    ///
    /// Control frames are skipped; binary frames are accepted if they are
    /// valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`BookFeedError::SessionClosed`] once the session is closed
    /// locally, [`BookFeedError::ConnectionClosed`] if the venue closes the
    /// connection, or [`BookFeedError::WebSocket`] on transport failure.
    pub async fn read_next(&mut self) -> Result<String> {
        loop {
            let frame = tokio::select! {
                biased;
                () = self.closed.cancelled() => return Err(BookFeedError::SessionClosed),
                frame = self.reader.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(text),
                    Err(_) => trace!("Skipping non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "WebSocket closed by venue");
                    return Err(BookFeedError::ConnectionClosed);
                }
                Some(Ok(_)) => {} // Ping/Pong/raw frames
                Some(Err(e)) => return Err(e.into()),
                None => return Err(BookFeedError::ConnectionClosed),
            }
        }
    }

    /// Returns a handle that can close this session from another task.
    #[must_use]
    pub fn closer(&self) -> SessionCloser {
        SessionCloser {
            writer: Arc::clone(&self.writer),
            closed: self.closed.clone(),
            close_sent: Arc::clone(&self.close_sent),
        }
    }

    /// Closes the session. See [`SessionCloser::close`].
    pub async fn close(&self) {
        self.closer().close().await;
    }

    /// Shuts the write half without a close frame, for a connection the
    /// venue already closed or that failed.
    pub async fn release(&self) {
        self.closed.cancel();
        if self.close_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.writer.lock().await.close().await {
            debug!(error = %e, "Error shutting WebSocket write half");
        }
    }
}

/// Cloneable close handle for a [`Session`].
#[derive(Clone)]
pub struct SessionCloser {
    writer: Arc<Mutex<WsWriter>>,
    closed: CancellationToken,
    close_sent: Arc<AtomicBool>,
}

impl SessionCloser {
    /// Wakes any in-flight read with [`BookFeedError::SessionClosed`], then
    /// sends a normal-closure frame and shuts the write half.
    ///
    /// Idempotent. Failing to send the close frame is logged, not returned.
    pub async fn close(&self) {
        self.closed.cancel();
        if self.close_sent.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut writer = self.writer.lock().await;
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: String::new().into(),
        };
        if let Err(e) = writer.send(Message::Close(Some(frame))).await {
            warn!(error = %e, "Error sending close frame");
        }
        if let Err(e) = writer.close().await {
            debug!(error = %e, "Error shutting WebSocket write half");
        }
    }
}
