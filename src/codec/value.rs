//! Caller-visible value wrapper (spec §3 "Value wrapper", §4.3).
//!
//! Each variant is self-describing: it carries whatever schema its engine
//! counterpart needs (element type, field names, precision) so the codec
//! never has to guess a value's intended DuckDB shape from a bare Rust
//! type (spec §9 "Dynamic value shapes at bind time").

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

/// A single struct field: name plus value (order-preserving, since struct
/// column order is significant to DuckDB).
pub type StructFields = Vec<(String, Value)>;

/// Caller-visible value, tagged per spec §4.3's table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),

    /// Variable-length list of a single element type.
    List(Vec<Value>),

    /// Fixed-length array; `len` must equal `items.len()` (enforced by
    /// [`Value::array`]).
    Array { items: Vec<Value>, len: usize },

    /// Named-field composite, field order preserved.
    Struct(StructFields),

    /// String-keyed mapping. Encoded as parallel key/value lists
    /// (spec §4.3: "list-of-keys + list-of-values composite").
    Map(BTreeMap<String, Value>),

    /// Date/time value with explicit timezone-awareness and optional
    /// sub-second precision (spec §4.3's timestamp row).
    ///
    /// Round-trip normalization (spec §8 property 5): `precision` is
    /// carried through the engine's `TimeUnit` (second/millisecond/
    /// nanosecond survive exactly; an explicit `Some(6)` normalizes to
    /// `None`, since microsecond is the engine's native, unmarked unit).
    /// `with_tz` does not survive at all — DuckDB binds TIMESTAMP and
    /// TIMESTAMPTZ parameters to the same underlying integer, so the
    /// distinction lives in the column's logical type, not the value;
    /// decoding always reports `with_tz: false`. See `codec::encode`/
    /// `codec::decode` for the exact mapping.
    Timestamp {
        /// Microseconds since the Unix epoch.
        micros: i64,
        with_tz: bool,
        precision: Option<u32>,
    },

    /// DuckDB-native JSON value — the *allowed* JSON path.
    ///
    /// Round-trip normalization (spec §8 property 5): `encode_value` binds
    /// this as a plain text parameter (DuckDB's JSON functions cast
    /// VARCHAR on use); the engine value that comes back therefore carries
    /// no surviving JSON tag, and `decode_value` normalizes it to
    /// `Value::Text` holding the same canonical JSON text. Recovering
    /// `Value::Json` specifically requires knowing the column was declared
    /// JSON, which is outside what a type-blind `decode_value` call sees.
    Json(JsonValue),

    /// A binding explicitly tagged as PostgreSQL `json`. Always rejected
    /// by [`crate::codec::encode`] (spec §4.3 "Disallowed inputs").
    PgJson(JsonValue),

    /// A binding explicitly tagged as PostgreSQL `jsonb`. Always rejected,
    /// same as [`Value::PgJson`].
    PgJsonb(JsonValue),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        let len = items.len();
        Value::Array { items, len }
    }

    pub fn timestamp(micros: i64, with_tz: bool, precision: Option<u32>) -> Self {
        Value::Timestamp { micros, with_tz, precision }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::Blob(_) => ValueKind::Blob,
            Value::List(_) => ValueKind::List,
            Value::Array { .. } => ValueKind::Array,
            Value::Struct(_) => ValueKind::Struct,
            Value::Map(_) => ValueKind::Map,
            Value::Timestamp { .. } => ValueKind::Timestamp,
            Value::Json(_) => ValueKind::Json,
            Value::PgJson(_) => ValueKind::PgJson,
            Value::PgJsonb(_) => ValueKind::PgJsonb,
        }
    }

    /// Whether this value is one of the disallowed PostgreSQL JSON
    /// bindings (spec §4.3 "Disallowed inputs").
    pub fn is_disallowed_pg_json(&self) -> bool {
        matches!(self, Value::PgJson(_) | Value::PgJsonb(_))
    }
}

/// The kind tag alone, used to build a [`ParamFingerprint`] without
/// cloning whole values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Int,
    Float,
    Text,
    Blob,
    List,
    Array,
    Struct,
    Map,
    Timestamp,
    Json,
    PgJson,
    PgJsonb,
}

/// Stable identifier for the shape of a bound parameter list (spec
/// GLOSSARY "Parameter fingerprint"), used as half the prepared-statement
/// cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamFingerprint(Vec<ValueKind>);

impl ParamFingerprint {
    pub fn of(values: &[Value]) -> Self {
        Self(values.iter().map(Value::kind).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_distinguishes_parameter_shapes() {
        let a = ParamFingerprint::of(&[Value::Int(1), Value::Text("x".into())]);
        let b = ParamFingerprint::of(&[Value::Int(1), Value::Int(2)]);
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_ignores_values_only_kinds() {
        let a = ParamFingerprint::of(&[Value::Int(1)]);
        let b = ParamFingerprint::of(&[Value::Int(999)]);
        assert_eq!(a, b);
    }

    #[test]
    fn pg_json_variants_are_flagged_disallowed() {
        assert!(Value::PgJson(JsonValue::Null).is_disallowed_pg_json());
        assert!(Value::PgJsonb(JsonValue::Null).is_disallowed_pg_json());
        assert!(!Value::Json(JsonValue::Null).is_disallowed_pg_json());
    }

    #[test]
    fn array_records_its_length() {
        let v = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(v, Value::Array { len: 2, .. }));
    }
}
