//! JSON <-> Firestore REST value encoding

use serde_json::{json, Map, Value};

use super::{RemoteError, RemoteResult};

/// Encode a field map as a Firestore `fields` object.
pub fn encode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect(),
    )
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(number) => number.as_i64().map_or_else(
            || json!({ "doubleValue": number.as_f64().unwrap_or_default() }),
            |integer| json!({ "integerValue": integer.to_string() }),
        ),
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(items) => {
            if items.is_empty() {
                json!({ "arrayValue": {} })
            } else {
                let values: Vec<Value> = items.iter().map(encode_value).collect();
                json!({ "arrayValue": { "values": values } })
            }
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Decode a Firestore `fields` object; a missing object is an empty map.
pub fn decode_fields(fields: Option<&Value>) -> RemoteResult<Map<String, Value>> {
    let Some(fields) = fields else {
        return Ok(Map::new());
    };
    let object = fields
        .as_object()
        .ok_or_else(|| RemoteError::InvalidPayload("document fields must be an object".into()))?;

    object
        .iter()
        .map(|(key, value)| Ok((key.clone(), decode_value(value)?)))
        .collect()
}

pub fn decode_value(value: &Value) -> RemoteResult<Value> {
    let object = value
        .as_object()
        .ok_or_else(|| RemoteError::InvalidPayload(format!("expected typed value, got {value}")))?;
    let Some((kind, inner)) = object.iter().next() else {
        return Err(RemoteError::InvalidPayload("empty typed value".into()));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| invalid(kind, inner)),
        "integerValue" => decode_integer(inner).ok_or_else(|| invalid(kind, inner)),
        "doubleValue" => Ok(decode_double(inner)),
        "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" => inner
            .as_str()
            .map(|text| Value::String(text.to_string()))
            .ok_or_else(|| invalid(kind, inner)),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(values)) => values
                    .iter()
                    .map(decode_value)
                    .collect::<RemoteResult<Vec<_>>>()?,
                Some(other) => return Err(invalid(kind, other)),
                None => Vec::new(),
            };
            Ok(Value::Array(values))
        }
        "mapValue" => Ok(Value::Object(decode_fields(inner.get("fields"))?)),
        other => Err(RemoteError::InvalidPayload(format!(
            "unsupported value type '{other}'"
        ))),
    }
}

fn decode_integer(inner: &Value) -> Option<Value> {
    match inner {
        Value::String(text) => text.parse::<i64>().ok().map(Value::from),
        Value::Number(number) => number.as_i64().map(Value::from),
        _ => None,
    }
}

/// JSON has no NaN or infinities; those decode to null.
fn decode_double(inner: &Value) -> Value {
    match inner {
        Value::Number(number) => Value::Number(number.clone()),
        Value::String(text) => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number),
        _ => Value::Null,
    }
}

fn invalid(kind: &str, inner: &Value) -> RemoteError {
    RemoteError::InvalidPayload(format!("malformed {kind}: {inner}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encodes_nested_values() {
        let fields = json!({
            "name": "Cash",
            "balance": 12,
            "rate": 0.5,
            "active": true,
            "tags": ["a"],
            "meta": {"note": null}
        });
        let encoded = encode_fields(fields.as_object().unwrap());
        assert_eq!(
            encoded,
            json!({
                "name": {"stringValue": "Cash"},
                "balance": {"integerValue": "12"},
                "rate": {"doubleValue": 0.5},
                "active": {"booleanValue": true},
                "tags": {"arrayValue": {"values": [{"stringValue": "a"}]}},
                "meta": {"mapValue": {"fields": {"note": {"nullValue": null}}}}
            })
        );
    }

    #[test]
    fn decodes_server_values() {
        let fields = json!({
            "createdAt": {"integerValue": "1700000000000"},
            "date": {"timestampValue": "2024-01-02T00:00:00Z"},
            "empty": {"arrayValue": {}},
            "nested": {"mapValue": {}},
            "ratio": {"doubleValue": "NaN"}
        });
        let decoded = decode_fields(Some(&fields)).unwrap();
        assert_eq!(
            Value::Object(decoded),
            json!({
                "createdAt": 1_700_000_000_000_i64,
                "date": "2024-01-02T00:00:00Z",
                "empty": [],
                "nested": {},
                "ratio": null
            })
        );
    }

    #[test]
    fn decode_rejects_unknown_types() {
        let fields = json!({"x": {"mysteryValue": 1}});
        assert!(matches!(
            decode_fields(Some(&fields)),
            Err(RemoteError::InvalidPayload(_))
        ));
    }
}
