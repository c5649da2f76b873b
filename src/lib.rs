//! Bitfinex streaming order book connector.
//!
//! Maintains a live view of one Bitfinex trading pair's order book from
//! the public WebSocket V2 `book` channel and republishes it to a single
//! consumer as canonical [`DepthUpdate`](models::book::DepthUpdate)s. A
//! REST snapshot of the same book can be fetched out-of-band.

pub mod book;
pub mod config;
pub mod connector;
pub mod error;
pub mod exchange;
pub mod health;
pub mod models;
pub mod publisher;
pub mod rest;
pub mod symbol;
pub mod websocket;

pub use book::{BookState, TopOfBook};
pub use connector::{BitfinexConnector, ConnectorState};
pub use error::{BookFeedError, Result};
pub use exchange::{Exchange, ExchangeName};
pub use health::HealthStatus;
pub use models::book::{DepthUpdate, PriceLevel, Snapshot};
pub use symbol::to_wire_symbol;
