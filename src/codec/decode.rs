//! Engine-native value → caller-visible value (spec §4.3), plus the legacy
//! textual list decode path.

use duckdb::types::{TimeUnit, Value as EngineValue};

use super::value::Value;

/// Decode one engine-native column value.
pub fn decode_value(value: &EngineValue) -> Value {
    match value {
        EngineValue::Null => Value::Null,
        EngineValue::Boolean(b) => Value::Boolean(*b),
        EngineValue::TinyInt(i) => Value::Int(*i as i64),
        EngineValue::SmallInt(i) => Value::Int(*i as i64),
        EngineValue::Int(i) => Value::Int(*i as i64),
        EngineValue::BigInt(i) => Value::Int(*i),
        EngineValue::HugeInt(i) => Value::Int(*i as i64),
        EngineValue::UTinyInt(i) => Value::Int(*i as i64),
        EngineValue::USmallInt(i) => Value::Int(*i as i64),
        EngineValue::UInt(i) => Value::Int(*i as i64),
        EngineValue::UBigInt(i) => Value::Int(*i as i64),
        EngineValue::Float(f) => Value::Float(*f as f64),
        EngineValue::Double(f) => Value::Float(*f),
        EngineValue::Text(s) => Value::Text(s.clone()),
        EngineValue::Blob(b) => Value::Blob(b.clone()),
        // `with_tz` has no engine-level representation to recover (see
        // `encode::encode_value`'s `Value::Timestamp` arm); every decoded
        // timestamp reports `with_tz: false`. `precision` round-trips
        // through the column's `TimeUnit` where that unit is more specific
        // than microseconds; a `Microsecond`-unit column normalizes to
        // `None` (indistinguishable from "unspecified").
        EngineValue::Timestamp(unit, raw) => Value::Timestamp {
            micros: to_micros(*unit, *raw),
            with_tz: false,
            precision: match unit {
                TimeUnit::Second => Some(0),
                TimeUnit::Millisecond => Some(3),
                TimeUnit::Microsecond => None,
                TimeUnit::Nanosecond => Some(9),
            },
        },
        EngineValue::List(items) => Value::List(items.iter().map(decode_value).collect()),
        EngineValue::Array(items, len) => Value::Array {
            items: items.iter().map(decode_value).collect(),
            len: *len as usize,
        },
        EngineValue::Struct(fields) => {
            Value::Struct(fields.iter().map(|(k, v)| (k.clone(), decode_value(v))).collect())
        }
        EngineValue::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (display_key(k), decode_value(v)))
                .collect(),
        ),
        other => Value::Text(format!("{other:?}")),
    }
}

fn display_key(key: &EngineValue) -> String {
    match key {
        EngineValue::Text(s) => s.clone(),
        other => format!("{other:?}"),
    }
}

fn to_micros(unit: TimeUnit, raw: i64) -> i64 {
    match unit {
        TimeUnit::Second => raw * 1_000_000,
        TimeUnit::Millisecond => raw * 1_000,
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    }
}

/// Decode a legacy textual list representation (spec §4.3 "Array coercion
/// on decode"): either JSON-array syntax (`[1, 2, 3]`) or Postgres brace
/// syntax (`{1,2,3}`), with correct handling of nested braces. Returns
/// `None` on invalid text — the codec never fabricates a value.
pub fn decode_legacy_list_text(text: &str) -> Option<Vec<String>> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        serde_json::from_str::<Vec<serde_json::Value>>(trimmed)
            .ok()
            .map(|items| items.into_iter().map(json_scalar_to_text).collect())
    } else if trimmed.starts_with('{') && trimmed.ends_with('}') {
        split_brace_list(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

fn json_scalar_to_text(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Split a comma-separated brace-list body, respecting nested `{...}`
/// groups so `{1,{2,3},4}` splits into `["1", "{2,3}", "4"]`.
fn split_brace_list(body: &str) -> Option<Vec<String>> {
    if body.is_empty() {
        return Some(Vec::new());
    }

    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();

    for ch in body.chars() {
        match ch {
            '{' => {
                depth += 1;
                current.push(ch);
            }
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current).trim().to_string());
            }
            _ => current.push(ch),
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(current.trim().to_string());
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_json_array_syntax() {
        let items = decode_legacy_list_text("[1, 2, 3]").unwrap();
        assert_eq!(items, vec!["1", "2", "3"]);
    }

    #[test]
    fn decodes_brace_syntax() {
        let items = decode_legacy_list_text("{1,2,3}").unwrap();
        assert_eq!(items, vec!["1", "2", "3"]);
    }

    #[test]
    fn decodes_nested_brace_syntax() {
        let items = decode_legacy_list_text("{1,{2,3},4}").unwrap();
        assert_eq!(items, vec!["1", "{2,3}", "4"]);
    }

    #[test]
    fn invalid_text_yields_none() {
        assert!(decode_legacy_list_text("not a list").is_none());
        assert!(decode_legacy_list_text("{1,2").is_none());
        assert!(decode_legacy_list_text("1,2}").is_none());
    }

    #[test]
    fn empty_brace_list_is_empty_vec() {
        assert_eq!(decode_legacy_list_text("{}").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn decodes_primitive_engine_values() {
        assert_eq!(decode_value(&EngineValue::BigInt(42)), Value::Int(42));
        assert_eq!(
            decode_value(&EngineValue::Text("hi".into())),
            Value::Text("hi".into())
        );
        assert_eq!(decode_value(&EngineValue::Null), Value::Null);
    }
}
