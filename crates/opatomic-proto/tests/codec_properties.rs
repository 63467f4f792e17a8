//! Property-based tests for the SO codec.

use opatomic_proto::{Number, Value, decode_value, encode_value, so_len};
use proptest::prelude::*;

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        Just(Value::SortMax),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (any::<u64>(), any::<bool>(), -30i32..=30)
            .prop_map(|(mag, neg, exp)| Value::Num(Number::from_u64(mag, neg, exp))),
        any::<String>().prop_map(Value::from),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::from),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(Value::from)
    })
}

fn encoded(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_value(value, &mut out);
    out
}

proptest! {
    /// `load(store(v)) == v` for every value in the lattice, and `store`
    /// is deterministic.
    #[test]
    fn round_trip(value in value_strategy()) {
        let bytes = encoded(&value);
        let (back, used) = decode_value(&bytes)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(used, bytes.len());
        prop_assert_eq!(&back, &value);
        prop_assert_eq!(encoded(&back), bytes);
    }

    /// Summing `so_len` over the top-level values of a stream walks
    /// exactly to the end of the stream.
    #[test]
    fn so_len_locality(values in prop::collection::vec(value_strategy(), 1..5)) {
        let mut stream = Vec::new();
        let mut expected = Vec::new();
        for value in &values {
            encode_value(value, &mut stream);
            expected.push(stream.len());
        }

        let mut offsets = Vec::new();
        let mut pos = 0usize;
        while pos < stream.len() {
            pos += so_len(&stream[pos..]).map_err(|e| TestCaseError::fail(e.to_string()))?;
            offsets.push(pos);
        }
        prop_assert_eq!(offsets, expected);
    }

    /// Truncating an encoded value anywhere strictly inside it never
    /// yields a successful decode of the same byte count.
    #[test]
    fn truncation_is_detected(value in value_strategy()) {
        let bytes = encoded(&value);
        for cut in 0..bytes.len() {
            match decode_value(&bytes[..cut]) {
                Ok((_, used)) => prop_assert!(used <= cut),
                Err(_) => {},
            }
        }
    }
}
