//! Stringify -> command-parse round trip.
//!
//! Whatever the stringifier prints, the command parser must read back as
//! the same value when typed as an argument. Byte equality is too strict
//! for numbers (canonical text re-parses to an equivalent value with a
//! different exponent split), so comparison is numeric for `Num` and
//! structural everywhere else.

use opatomic_client::parse_user_command;
use opatomic_proto::{Number, Value, decode_value, encode_value, stringify};
use proptest::prelude::*;

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        Just(Value::SortMax),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (any::<u64>(), any::<bool>(), -20i32..=20)
            .prop_map(|(mag, neg, exp)| Value::Num(Number::from_u64(mag, neg, exp))),
        any::<String>().prop_map(Value::from),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop::collection::vec(inner, 0..5).prop_map(Value::from)
    })
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Num(x), Value::Num(y)) => match x.sub(y) {
            Ok(diff) => diff.is_zero(),
            // Subtracting equal infinities fails; fall back to structure.
            Err(_) => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| value_eq(x, y))
        },
        _ => a == b,
    }
}

proptest! {
    #[test]
    fn printed_values_parse_back(value in value_strategy()) {
        let mut encoded = Vec::new();
        encode_value(&value, &mut encoded);
        let printed = stringify(&encoded, None)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let line = format!("ECHO {printed}");
        let request = parse_user_command(&line)
            .map_err(|e| TestCaseError::fail(format!("{e}: {printed:?}")))?;

        // Request shape: [null, "ECHO", [value]].
        let (decoded, _) = decode_value(request.request_bytes())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let Value::Array(items) = decoded else {
            return Err(TestCaseError::fail("request is not an array"));
        };
        prop_assert_eq!(items.len(), 3);
        prop_assert_eq!(&items[0], &Value::Null);
        prop_assert_eq!(&items[1], &Value::from("ECHO"));
        let Value::Array(args) = &items[2] else {
            return Err(TestCaseError::fail("args slot is not an array"));
        };
        prop_assert_eq!(args.len(), 1);
        prop_assert!(
            value_eq(&args[0], &value),
            "parsed {:?} from {:?}, wanted {:?}",
            args[0],
            printed,
            value
        );
    }
}
