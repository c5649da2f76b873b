use bitfinex_book::config::fetch_config;
use bitfinex_book::{BitfinexConnector, BookFeedError, Exchange};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), BookFeedError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let app_config = fetch_config()?;
    let connector = BitfinexConnector::new(app_config.bitfinex)?;

    match connector.get_snapshot().await {
        Ok(snapshot) => info!(
            symbol = %snapshot.symbol,
            bids = snapshot.bids.len(),
            asks = snapshot.asks.len(),
            "REST snapshot"
        ),
        Err(e) => warn!(error = %e, "REST snapshot unavailable"),
    }

    let Some(mut updates) = connector.updates() else {
        return Ok(());
    };
    connector.connect().await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            update = updates.recv() => match update {
                Some(update) => {
                    let top = connector.top_of_book();
                    info!(
                        revision = update.final_update_id,
                        bids = update.bids.len(),
                        asks = update.asks.len(),
                        best_bid = ?top.best_bid,
                        best_ask = ?top.best_ask,
                        spread = ?top.spread,
                        "Book update"
                    );
                }
                None => {
                    warn!(state = %connector.state(), "Update stream ended");
                    break;
                }
            },
        }
    }

    connector.close().await?;
    let health = connector.health();
    info!(
        messages = health.message_count,
        errors = health.error_count,
        "Connector stopped"
    );
    Ok(())
}
