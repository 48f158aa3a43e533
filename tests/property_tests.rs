//! Property-based tests using proptest
//!
//! These tests check hash-array, codec and event-format invariants across
//! randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use lipc::core::codec::ValueCodec;
use lipc::protocol::event::{build_params, parse_format, EventArg};
use lipc::{HashArray, Value, ValueKind};
use proptest::prelude::*;

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Integer),
        ".{0,64}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..256).prop_map(Value::Blob),
    ]
}

/// Maps of distinct keys, as a hash-array would hold them
fn maps_strategy() -> impl Strategy<Value = Vec<Vec<(String, Value)>>> {
    prop::collection::vec(
        prop::collection::btree_map("[a-zA-Z_][a-zA-Z0-9_]{0,12}", value_strategy(), 0..12)
            .prop_map(|m| m.into_iter().collect::<Vec<_>>()),
        0..6,
    )
}

fn build(maps: &[Vec<(String, Value)>]) -> HashArray {
    let ha = HashArray::new();
    for (index, map) in maps.iter().enumerate() {
        assert_eq!(ha.add_hash().unwrap(), index);
        for (key, value) in map {
            ha.put(index, key, value.clone()).unwrap();
        }
    }
    ha
}

// Property: a restored array answers every query the way the original does
proptest! {
    #[test]
    fn prop_restore_preserves_queries(maps in maps_strategy()) {
        let ha = build(&maps);
        let restored = HashArray::from_bytes(&ha.to_bytes().unwrap()).unwrap();

        prop_assert_eq!(restored.identity().unwrap(), ha.identity().unwrap());
        prop_assert_eq!(restored.hash_count().unwrap(), maps.len());
        for (index, map) in maps.iter().enumerate() {
            prop_assert_eq!(restored.keys(index).unwrap(), ha.keys(index).unwrap());
            for (key, value) in map {
                prop_assert_eq!(
                    restored.check_key(index, key).unwrap(),
                    (value.kind(), value.size_of())
                );
                prop_assert_eq!(&restored.get(index, key).unwrap(), value);
            }
        }
    }
}

// Property: key enumeration is stable between the sizing and the fetching call
proptest! {
    #[test]
    fn prop_key_enumeration_stable(maps in maps_strategy()) {
        let ha = build(&maps);
        for (index, map) in maps.iter().enumerate() {
            let count = ha.key_count(index).unwrap();
            let keys = ha.keys(index).unwrap();
            prop_assert_eq!(count, map.len());
            prop_assert_eq!(keys.len(), count);
            let expected: Vec<&str> = map.iter().map(|(k, _)| k.as_str()).collect();
            prop_assert_eq!(keys.iter().map(String::as_str).collect::<Vec<_>>(), expected);
        }
    }
}

// Property: putting a key twice keeps a single entry holding the last value
proptest! {
    #[test]
    fn prop_put_last_write_wins(
        key in "[a-z]{1,8}",
        first in value_strategy(),
        second in value_strategy(),
    ) {
        let ha = HashArray::new();
        ha.add_hash().unwrap();
        ha.put(0, &key, first).unwrap();
        ha.put(0, &key, second.clone()).unwrap();

        prop_assert_eq!(ha.key_count(0).unwrap(), 1);
        prop_assert_eq!(ha.get(0, &key).unwrap(), second);
    }
}

// Property: restoring arbitrary bytes never panics
proptest! {
    #[test]
    fn prop_restore_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = HashArray::from_bytes(&data);
    }
}

// Property: value decoding of arbitrary bytes never panics for any kind
proptest! {
    #[test]
    fn prop_decode_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..128)) {
        for kind in [ValueKind::Integer, ValueKind::Text, ValueKind::Blob] {
            let _ = ValueCodec::decode(&data, kind);
        }
    }
}

// Property: encoded length always matches the encoder's output
proptest! {
    #[test]
    fn prop_encoded_len_exact(value in value_strategy()) {
        prop_assert_eq!(ValueCodec::encode(&value).len(), ValueCodec::encoded_len(&value));
    }
}

// Property: a format of %d/%s specifiers yields one kind per specifier
proptest! {
    #[test]
    fn prop_format_kinds(kinds in prop::collection::vec(prop::bool::ANY, 0..16)) {
        let format: String = kinds.iter().map(|&is_int| if is_int { "%d" } else { "%s" }).collect();
        let parsed = parse_format(&format).unwrap();

        prop_assert_eq!(parsed.len(), kinds.len());
        for (kind, is_int) in parsed.iter().zip(&kinds) {
            let expected = if *is_int { ValueKind::Integer } else { ValueKind::Text };
            prop_assert_eq!(*kind, expected);
        }
    }
}

// Property: matching arguments are carried into parameters in order
proptest! {
    #[test]
    fn prop_build_params_order(
        ints in prop::collection::vec(any::<i32>(), 0..8),
        text in "[a-z]{0,16}",
    ) {
        let mut format = String::new();
        let mut args = Vec::new();
        for n in &ints {
            format.push_str("%d%s");
            args.push(EventArg::Int(*n));
            args.push(EventArg::Str(&text));
        }

        let params = build_params(&format, &args).unwrap();
        prop_assert_eq!(params.len(), ints.len() * 2);
        for (pair, n) in params.chunks(2).zip(&ints) {
            prop_assert_eq!(&pair[0], &Value::Integer(*n));
            prop_assert_eq!(&pair[1], &Value::Text(text.clone()));
        }
    }
}
