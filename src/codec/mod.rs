//! Type codec layer (spec §4.3): caller values ↔ engine-native values,
//! plus the per-connection prepared-statement cache.

mod decode;
mod encode;
mod statement_cache;
mod value;

pub use decode::{decode_legacy_list_text, decode_value};
pub use encode::{encode_param, encode_params};
pub use statement_cache::{StatementCache, DEFAULT_CAPACITY};
pub use value::{ParamFingerprint, StructFields, Value, ValueKind};

/// Property 5 (spec §8): `decode(encode(w)) == w` up to documented
/// normalization. Primitives/lists/arrays round-trip exactly and are
/// covered beside `encode`/`decode`; the rich composite and timestamp/JSON
/// cases (where normalization actually applies) are covered here, against
/// the public `encode_param`/`decode_value` pair rather than either
/// module's private internals.
#[cfg(test)]
mod roundtrip_tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn roundtrip(value: Value) -> Value {
        let mut disallowed_pg_json = false;
        let encoded = encode_param(&value, &mut disallowed_pg_json);
        decode_value(&encoded)
    }

    #[test]
    fn struct_roundtrips_exactly() {
        let value = Value::Struct(vec![
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Text("x".into())),
        ]);
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn map_roundtrips_exactly() {
        let mut map = BTreeMap::new();
        map.insert("k1".to_string(), Value::Int(1));
        map.insert("k2".to_string(), Value::Int(2));
        let value = Value::Map(map);
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn array_roundtrips_exactly() {
        let value = Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn timestamp_with_second_precision_roundtrips_exactly() {
        let value = Value::timestamp(1_700_000_000_000_000, false, Some(0));
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn timestamp_with_millisecond_precision_roundtrips_exactly() {
        let value = Value::timestamp(1_700_000_000_123_000, false, Some(3));
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn timestamp_with_nanosecond_precision_roundtrips_exactly() {
        let value = Value::timestamp(1_700_000_000_123_456, false, Some(9));
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn timestamp_with_tz_normalizes_to_with_tz_false() {
        let value = Value::timestamp(1_700_000_000_000_000, true, None);
        let expected = Value::timestamp(1_700_000_000_000_000, false, None);
        assert_eq!(roundtrip(value), expected);
    }

    #[test]
    fn timestamp_precision_six_normalizes_to_unspecified() {
        let value = Value::timestamp(1_700_000_000_000_000, false, Some(6));
        let expected = Value::timestamp(1_700_000_000_000_000, false, None);
        assert_eq!(roundtrip(value), expected);
    }

    #[test]
    fn json_normalizes_to_text_of_its_canonical_serialization() {
        let payload = json!({"a": 1, "b": [1, 2, 3]});
        let value = Value::Json(payload.clone());
        let expected = Value::Text(payload.to_string());
        assert_eq!(roundtrip(value), expected);
    }
}
