//! Property tests for book state invariants.

use std::collections::HashMap;

use bitfinex_book::BookState;
use bitfinex_book::models::book::{BookRecord, canonical_decimal};
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;

/// Prices on a small grid so deltas collide with existing levels.
fn price() -> impl Strategy<Value = f64> {
    (1u32..40).prop_map(|ticks| 100.0 + f64::from(ticks) * 0.5)
}

fn amount() -> impl Strategy<Value = f64> {
    prop_oneof![(1i32..200), (-200i32..-1)].prop_map(|units| f64::from(units) * 0.125)
}

fn record() -> impl Strategy<Value = BookRecord> {
    (price(), 0u64..4, amount()).prop_map(|(price, count, amount)| {
        BookRecord::from_value(&json!([price, count, amount])).expect("generated record is valid")
    })
}

#[derive(Debug, Clone)]
enum Mutation {
    Snapshot(Vec<BookRecord>),
    Delta(BookRecord),
}

fn mutation() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        1 => prop::collection::vec(record(), 0..12).prop_map(Mutation::Snapshot),
        6 => record().prop_map(Mutation::Delta),
    ]
}

fn apply(book: &mut BookState, mutation: &Mutation) -> u64 {
    match mutation {
        Mutation::Snapshot(records) => book.apply_snapshot(records),
        Mutation::Delta(record) => book.apply_delta(record),
    }
}

proptest! {
    #[test]
    fn no_price_on_both_sides(mutations in prop::collection::vec(mutation(), 0..60)) {
        let mut book = BookState::new();
        for mutation in &mutations {
            apply(&mut book, mutation);
            let (bids, _) = book.export_levels();
            for level in bids {
                prop_assert!(book.ask(&level.price).is_none(), "{} on both sides", level.price);
            }
        }
    }

    #[test]
    fn stored_quantities_are_positive(mutations in prop::collection::vec(mutation(), 0..60)) {
        let mut book = BookState::new();
        for mutation in &mutations {
            apply(&mut book, mutation);
        }
        let (bids, asks) = book.export_levels();
        for level in bids.iter().chain(&asks) {
            let quantity: Decimal = level.quantity.parse().unwrap();
            prop_assert!(quantity > Decimal::ZERO);
        }
    }

    #[test]
    fn removal_clears_both_sides(
        mutations in prop::collection::vec(mutation(), 0..30),
        price in price(),
        amount in amount(),
    ) {
        let mut book = BookState::new();
        for mutation in &mutations {
            apply(&mut book, mutation);
        }
        let removal = BookRecord::from_value(&json!([price, 0, amount])).unwrap();
        book.apply_delta(&removal);

        let key = canonical_decimal(price);
        prop_assert!(book.bid(&key).is_none());
        prop_assert!(book.ask(&key).is_none());
    }

    #[test]
    fn revision_counts_mutations(mutations in prop::collection::vec(mutation(), 1..60)) {
        let mut book = BookState::new();
        for (i, mutation) in mutations.iter().enumerate() {
            let revision = apply(&mut book, mutation);
            prop_assert_eq!(revision, i as u64 + 1);
            prop_assert_eq!(book.revision(), revision);
        }
    }

    #[test]
    fn snapshot_replaces_prior_levels(
        before in prop::collection::vec(mutation(), 0..30),
        snapshot in prop::collection::vec(record(), 0..12),
    ) {
        let mut book = BookState::new();
        for mutation in &before {
            apply(&mut book, mutation);
        }
        book.apply_snapshot(&snapshot);

        // Later entries win, as in the book itself.
        let mut expected: HashMap<String, (bool, String)> = HashMap::new();
        for record in snapshot.iter().filter(|r| !r.is_removal()) {
            expected.insert(record.price_key(), (record.amount > 0.0, record.quantity()));
        }

        let (bids, asks) = book.export_levels();
        prop_assert_eq!(bids.len() + asks.len(), expected.len());
        for level in &bids {
            prop_assert_eq!(expected.get(&level.price), Some(&(true, level.quantity.clone())));
        }
        for level in &asks {
            prop_assert_eq!(expected.get(&level.price), Some(&(false, level.quantity.clone())));
        }
    }

    #[test]
    fn non_numeric_fields_are_rejected(text in "[a-zA-Z ]{0,12}", position in 0usize..3) {
        let mut fields = vec![json!(100.5), json!(1), json!(1.5)];
        fields[position] = json!(text);
        prop_assert!(BookRecord::from_value(&json!(fields)).is_err());
    }
}
