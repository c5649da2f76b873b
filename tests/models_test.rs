//! Wire model decoding against captured Bitfinex payloads.

use bitfinex_book::models::book::{DepthUpdate, PriceLevel};
use bitfinex_book::models::{EventMessage, SubscribeRequest};
use bitfinex_book::rest::convert_snapshot;
use bitfinex_book::websocket::{Classifier, ControlMessage, DataPayload, Inbound, decode};
use bitfinex_book::{BookState, ExchangeName};
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::{Value, json};

const SUBSCRIBED_JSON: &str = include_str!("fixtures/subscribed.json");
const BOOK_SNAPSHOT_JSON: &str = include_str!("fixtures/book_snapshot.json");
const BOOK_UPDATE_JSON: &str = include_str!("fixtures/book_update.json");
const HEARTBEAT_JSON: &str = include_str!("fixtures/heartbeat.json");
const ERROR_JSON: &str = include_str!("fixtures/error.json");
const INFO_MAINTENANCE_JSON: &str = include_str!("fixtures/info_maintenance.json");
const REST_BOOK_JSON: &str = include_str!("fixtures/rest_book.json");

fn bound_classifier() -> Classifier {
    let mut classifier = Classifier::new();
    classifier.classify(SUBSCRIBED_JSON);
    classifier
}

#[test]
fn test_subscribed_event_deserializes() {
    let event: EventMessage =
        serde_json::from_str(SUBSCRIBED_JSON).expect("Failed to deserialize subscribed event");
    assert_eq!(event.event, "subscribed");
    assert_eq!(event.chan_id, Some(224555));
    assert_eq!(event.symbol.as_deref(), Some("tETHUSD"));
    assert_eq!(event.pair.as_deref(), Some("ETHUSD"));
    assert_eq!(event.len.as_deref(), Some("25"));

    assert_eq!(bound_classifier().bound_channel(), Some(224555));
}

#[test]
fn test_book_snapshot_builds_book() {
    let mut classifier = bound_classifier();
    let Inbound::Data {
        chan_id,
        payload: DataPayload::Snapshot(records),
    } = classifier.classify(BOOK_SNAPSHOT_JSON)
    else {
        panic!("expected snapshot payload");
    };
    assert_eq!(chan_id, 224555);
    assert_eq!(records.len(), 5);

    let mut book = BookState::new();
    book.apply_snapshot(&records);
    assert_eq!(book.bid_count(), 3);
    assert_eq!(book.ask_count(), 2);
    assert_eq!(book.bid("3100.9"), Some("0.000125"));
    assert_eq!(book.ask("3101.7"), Some("0.3124"));

    let top = book.top_of_book();
    assert_eq!(top.best_bid, Some(dec!(3101.4)));
    assert_eq!(top.best_ask, Some(dec!(3101.6)));
    assert_eq!(top.spread, Some(dec!(0.2)));
    assert_eq!(top.mid_price, Some(dec!(3101.5)));
}

#[test]
fn test_book_update_removes_ask() {
    let mut classifier = bound_classifier();
    let Inbound::Data {
        payload: DataPayload::Snapshot(records),
        ..
    } = classifier.classify(BOOK_SNAPSHOT_JSON)
    else {
        panic!("expected snapshot payload");
    };
    let Inbound::Data {
        payload: DataPayload::Delta(delta),
        ..
    } = classifier.classify(BOOK_UPDATE_JSON)
    else {
        panic!("expected delta payload");
    };
    assert!(delta.is_removal());

    let mut book = BookState::new();
    book.apply_snapshot(&records);
    assert_eq!(book.apply_delta(&delta), 2);
    assert_eq!(book.ask("3101.6"), None);
    assert_eq!(book.top_of_book().best_ask, Some(dec!(3101.7)));
}

#[test]
fn test_heartbeat_is_data_without_mutation() {
    let mut classifier = bound_classifier();
    assert!(matches!(
        classifier.classify(HEARTBEAT_JSON),
        Inbound::Data {
            payload: DataPayload::Heartbeat,
            ..
        }
    ));
}

#[test]
fn test_error_event_decodes() {
    assert_eq!(
        decode(ERROR_JSON),
        Inbound::Control(ControlMessage::Error {
            code: Some(10301),
            msg: "subscribe: dup".to_string(),
        })
    );
}

#[test]
fn test_maintenance_info_decodes() {
    let Inbound::Control(ControlMessage::Info { code, msg, version }) = decode(INFO_MAINTENANCE_JSON)
    else {
        panic!("expected info event");
    };
    assert_eq!(code, Some(20060));
    assert!(msg.unwrap().starts_with("Entering in Maintenance mode"));
    assert_eq!(version, None);
}

#[test]
fn test_rest_book_converts() {
    let entries: Vec<Value> = serde_json::from_str(REST_BOOK_JSON).unwrap();
    let snapshot = convert_snapshot(ExchangeName::Bitfinex, "tETHUSD", &entries);
    assert_eq!(
        snapshot.bids,
        vec![PriceLevel::new("3101.4", "0.84"), PriceLevel::new("3101.2", "1.2")]
    );
    assert_eq!(
        snapshot.asks,
        vec![PriceLevel::new("3101.6", "2.5"), PriceLevel::new("3101.7", "0.3124")]
    );
    assert_eq!(snapshot.asks[1].quantity_decimal().unwrap(), dec!(0.3124));
}

#[test]
fn test_subscribe_request_serializes() {
    let request = SubscribeRequest::book("tETHUSD", "P1", "F1", "25");
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(
        value,
        json!({
            "event": "subscribe",
            "channel": "book",
            "symbol": "tETHUSD",
            "prec": "P1",
            "freq": "F1",
            "len": "25",
        })
    );
}

#[test]
fn test_depth_update_serializes() {
    let update = DepthUpdate {
        exchange: ExchangeName::Bitfinex,
        symbol: "tETHUSD".to_string(),
        event_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        first_update_id: 7,
        final_update_id: 7,
        prev_update_id: 6,
        bids: vec![PriceLevel::new("3101.4", "0.84")],
        asks: vec![],
    };
    let value = serde_json::to_value(&update).unwrap();
    assert_eq!(value["exchange"], "bitfinex");
    assert_eq!(value["prev_update_id"], 6);
    assert_eq!(value["event_time"], "2024-05-01T12:00:00Z");
    assert_eq!(value["bids"], json!([{"price": "3101.4", "quantity": "0.84"}]));
}
