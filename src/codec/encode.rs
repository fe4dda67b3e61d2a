//! Caller value → engine-native value (spec §4.3).
//!
//! Disallowed PostgreSQL JSON/JSONB bindings are not rejected here
//! directly; spec §4.3 has the dialect-state "disallowed column detected"
//! flag set during type-preparation and checked only after the whole
//! parameter list has been built, so a batch with several bad bindings
//! gets one clean error rather than failing on the first.

use duckdb::types::{OrderedMap, TimeUnit, Value as EngineValue};

use super::value::{StructFields, Value};

/// Map a [`Value::Timestamp`]'s caller-declared `precision` to the engine's
/// `TimeUnit`, so the precision the caller asked for survives the trip
/// through `duckdb::types::Value::Timestamp` instead of being silently
/// forced to microseconds (spec §4.3's `Timestamp` row: "precision: opt").
/// `None` (unspecified) and `Some(6)` (explicitly microsecond, the engine's
/// native unit) both map to `Microsecond`; `decode_value` mirrors this by
/// reporting `precision: None` for a `Microsecond`-unit column.
fn precision_to_unit(precision: Option<u32>) -> TimeUnit {
    match precision {
        Some(0) => TimeUnit::Second,
        Some(p) if p <= 3 => TimeUnit::Millisecond,
        Some(p) if p <= 6 => TimeUnit::Microsecond,
        Some(_) => TimeUnit::Nanosecond,
        None => TimeUnit::Microsecond,
    }
}

/// Inverse of `decode::to_micros`: convert a microsecond value into the
/// raw integer `unit` expects.
fn micros_to_raw(micros: i64, unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Second => micros / 1_000_000,
        TimeUnit::Millisecond => micros / 1_000,
        TimeUnit::Microsecond => micros,
        TimeUnit::Nanosecond => micros * 1_000,
    }
}

/// Encode one caller value. Sets `disallowed_pg_json` if `value` is a
/// [`Value::PgJson`]/[`Value::PgJsonb`] binding; the caller still gets a
/// (unusable) engine value back so batch encoding can continue, but must
/// check the flag before issuing anything to the engine.
pub fn encode_param(value: &Value, disallowed_pg_json: &mut bool) -> EngineValue {
    if value.is_disallowed_pg_json() {
        *disallowed_pg_json = true;
    }
    encode_value(value)
}

/// Encode a full parameter list, returning the flag alongside the encoded
/// values so callers don't need a separate mutable accumulator.
pub fn encode_params(values: &[Value]) -> (Vec<EngineValue>, bool) {
    let mut disallowed = false;
    let encoded = values
        .iter()
        .map(|v| encode_param(v, &mut disallowed))
        .collect();
    (encoded, disallowed)
}

fn encode_value(value: &Value) -> EngineValue {
    match value {
        Value::Null => EngineValue::Null,
        Value::Boolean(b) => EngineValue::Boolean(*b),
        Value::Int(i) => EngineValue::BigInt(*i),
        Value::Float(f) => EngineValue::Double(*f),
        Value::Text(s) => EngineValue::Text(s.clone()),
        Value::Blob(b) => EngineValue::Blob(b.clone()),
        Value::List(items) => EngineValue::List(items.iter().map(encode_value).collect()),
        Value::Array { items, len } => {
            EngineValue::Array(items.iter().map(encode_value).collect(), *len as u32)
        }
        Value::Struct(fields) => EngineValue::Struct(encode_struct_fields(fields)),
        Value::Map(map) => EngineValue::Map(OrderedMap::from(
            map.iter()
                .map(|(k, v)| (EngineValue::Text(k.clone()), encode_value(v)))
                .collect::<Vec<_>>(),
        )),
        // `with_tz` has no surviving representation here: DuckDB stores
        // both TIMESTAMP and TIMESTAMPTZ parameter values as the same
        // epoch-offset integer, and the with/without-timezone distinction
        // lives in the column's logical type, not in the bound value
        // itself. `precision` does survive, via `TimeUnit` (see
        // `precision_to_unit`).
        Value::Timestamp { micros, precision, .. } => {
            let unit = precision_to_unit(*precision);
            EngineValue::Timestamp(unit, micros_to_raw(*micros, unit))
        }
        // Plain text binding; DuckDB's JSON functions cast VARCHAR on use.
        Value::Json(json) => EngineValue::Text(json.to_string()),
        // Never actually sent to the engine: prepare aborts first when
        // `disallowed_pg_json` is set. The value still has to be *some*
        // `EngineValue` to keep this function total.
        Value::PgJson(json) | Value::PgJsonb(json) => EngineValue::Text(json.to_string()),
    }
}

fn encode_struct_fields(fields: &StructFields) -> OrderedMap<String, EngineValue> {
    OrderedMap::from(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect::<Vec<_>>(),
    )
}
