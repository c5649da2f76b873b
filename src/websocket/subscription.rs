//! Channel subscription operations.

use futures_util::SinkExt;
use tracing::{debug, info};
use tungstenite::Message;

use super::WsWriter;
use crate::Result;
use crate::models::SubscribeRequest;

/// Sends a book subscription request.
///
/// Does not wait for the `subscribed` acknowledgment; the channel id is
/// bound when that event arrives on the read path.
///
/// # Errors
///
/// Returns a [`BookFeedError`](crate::BookFeedError) if sending the subscription message fails.
pub async fn subscribe_book(write: &mut WsWriter, request: &SubscribeRequest) -> Result<()> {
    let json = serde_json::to_string(request)?;
    debug!("Sending book subscribe request: {}", json);
    write.send(Message::Text(json.into())).await?;
    info!(
        channel = %request.channel,
        symbol = %request.symbol,
        prec = %request.prec,
        freq = %request.freq,
        len = %request.len,
        "Book subscription sent"
    );

    Ok(())
}
