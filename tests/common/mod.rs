//! Shared test utilities: an in-process WebSocket venue that speaks just
//! enough of the Bitfinex V2 protocol to drive a connector.

#![allow(dead_code)]

use std::time::Duration;

use bitfinex_book::config::BitfinexConfig;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tungstenite::Message;

/// Channel id the mock venue assigns to the book subscription.
pub const CHAN_ID: u64 = 17470;

pub const SUBSCRIBED: &str = r#"{"event":"subscribed","channel":"book","chanId":17470,"symbol":"tBTCUSD","prec":"P0","freq":"F0","len":"100","pair":"BTCUSD"}"#;

pub const INFO: &str = r#"{"event":"info","version":2,"serverId":"b0d2b2ad","platform":{"status":1}}"#;

/// Marker pushed to [`MockVenue::received`] when the client sends a close frame.
pub const CLOSE_MARKER: &str = "<close>";

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// One scripted action, run after the client's subscribe request arrives.
pub enum Step {
    Send(String),
    /// Sends a normal close frame and ends the connection.
    Close,
    /// Drops the TCP connection without a close handshake.
    Drop,
}

pub fn send(text: impl Into<String>) -> Step {
    Step::Send(text.into())
}

/// `[CHAN_ID, payload]`
pub fn data(payload: &str) -> Step {
    Step::Send(format!("[{CHAN_ID},{payload}]"))
}

pub struct MockVenue {
    pub url: String,
    /// Text frames sent by the client, then [`CLOSE_MARKER`] on close.
    pub received: mpsc::UnboundedReceiver<String>,
    handle: JoinHandle<()>,
}

impl MockVenue {
    /// Accepts one connection and plays `script` once the client subscribes.
    pub async fn start(script: Vec<Step>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock venue");
        let url = format!("ws://{}", listener.local_addr().expect("no local addr"));
        let (tx, received) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws) = accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws.split();

            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let _ = tx.send(text.to_string());
                }
                _ => return,
            }
            let _ = write.send(Message::Text(INFO.into())).await;

            for step in script {
                match step {
                    Step::Send(text) => {
                        if write.send(Message::Text(text.into())).await.is_err() {
                            return;
                        }
                    }
                    Step::Close => {
                        let _ = write.send(Message::Close(None)).await;
                        return;
                    }
                    Step::Drop => return,
                }
            }

            while let Some(Ok(message)) = read.next().await {
                match message {
                    Message::Text(text) => {
                        let _ = tx.send(text.to_string());
                    }
                    Message::Close(_) => {
                        let _ = tx.send(CLOSE_MARKER.to_string());
                        break;
                    }
                    _ => {}
                }
            }
        });

        Self {
            url,
            received,
            handle,
        }
    }

    /// Next frame the client sent, or `None` after [`WAIT`].
    pub async fn next_received(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.received.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for MockVenue {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Default config pointed at a local venue.
pub fn config_for(url: &str) -> BitfinexConfig {
    let mut config = BitfinexConfig::for_symbol("BTCUSDT");
    config.websocket_url = url.to_string();
    config
}

/// Polls `condition` until it holds or [`WAIT`] elapses.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
