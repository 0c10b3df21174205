use apache_avro::types::Value;
use apache_avro::Schema;
use base64::Engine;
use courier_api::schema::{is_nullable, type_name};
use serde_json::Value as Json;

use crate::error::{DecodingError, EncodingError};

// ═══════════════════════════════════════════════════════════════
//  JSON → Avro conversion (strict)
// ═══════════════════════════════════════════════════════════════

/// Convert a JSON object into an Avro record value under `schema`.
///
/// Fields are emitted in schema order. A missing or null field is accepted
/// only when the schema allows null for it.
pub fn encode_record(value: &Json, schema: &Schema) -> Result<Value, EncodingError> {
    if !value.is_object() {
        return Err(EncodingError::NotAnObject);
    }
    json_to_avro("", value, schema)
}

fn json_to_avro(path: &str, val: &Json, schema: &Schema) -> Result<Value, EncodingError> {
    match (val, schema) {
        (Json::Null, Schema::Null) => Ok(Value::Null),
        (Json::Bool(b), Schema::Boolean) => Ok(Value::Boolean(*b)),
        (Json::Number(n), Schema::Int) => n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::Int)
            .ok_or_else(|| mismatch(path, schema, val)),
        (Json::Number(n), Schema::Long) => n
            .as_i64()
            .map(Value::Long)
            .ok_or_else(|| mismatch(path, schema, val)),
        (Json::Number(n), Schema::TimestampMillis) => n
            .as_i64()
            .map(Value::TimestampMillis)
            .ok_or_else(|| mismatch(path, schema, val)),
        (Json::Number(n), Schema::Float) => n
            .as_f64()
            .map(|f| Value::Float(f as f32))
            .ok_or_else(|| mismatch(path, schema, val)),
        (Json::Number(n), Schema::Double) => n
            .as_f64()
            .map(Value::Double)
            .ok_or_else(|| mismatch(path, schema, val)),
        (Json::String(s), Schema::String) => Ok(Value::String(s.clone())),
        (Json::String(s), Schema::Uuid) => uuid::Uuid::parse_str(s)
            .map(Value::Uuid)
            .map_err(|_| mismatch(path, schema, val)),
        (Json::String(s), Schema::Bytes) => base64::engine::general_purpose::STANDARD
            .decode(s)
            .map(Value::Bytes)
            .map_err(|_| mismatch(path, schema, val)),
        (Json::String(s), Schema::Enum(e)) => e
            .symbols
            .iter()
            .position(|sym| sym == s)
            .map(|idx| Value::Enum(idx as u32, s.clone()))
            .ok_or_else(|| mismatch(path, schema, val)),
        (Json::Array(items), Schema::Array(inner)) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(json_to_avro(&format!("{path}[{i}]"), item, &inner.items)?);
            }
            Ok(Value::Array(out))
        }
        (Json::Object(map), Schema::Record(record)) => {
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let field_path = if path.is_empty() {
                    field.name.clone()
                } else {
                    format!("{path}.{}", field.name)
                };
                let field_val = match map.get(&field.name) {
                    Some(v) if !v.is_null() => v,
                    _ if is_nullable(&field.schema) => &Json::Null,
                    _ => return Err(EncodingError::MissingField { field: field_path }),
                };
                fields.push((field.name.clone(), json_to_avro(&field_path, field_val, &field.schema)?));
            }
            Ok(Value::Record(fields))
        }
        (val, Schema::Union(union)) => {
            let variants = union.variants();
            if val.is_null() {
                return variants
                    .iter()
                    .position(|v| matches!(v, Schema::Null))
                    .map(|idx| Value::Union(idx as u32, Box::new(Value::Null)))
                    .ok_or_else(|| mismatch(path, schema, val));
            }
            for (idx, variant) in variants.iter().enumerate() {
                if matches!(variant, Schema::Null) {
                    continue;
                }
                if let Ok(v) = json_to_avro(path, val, variant) {
                    return Ok(Value::Union(idx as u32, Box::new(v)));
                }
            }
            Err(mismatch(path, schema, val))
        }
        _ if is_supported(schema) => Err(mismatch(path, schema, val)),
        _ => Err(EncodingError::Unsupported {
            field: path.to_string(),
            type_name: type_name(schema),
        }),
    }
}

/// Schemas the strict conversion has a JSON mapping for.
fn is_supported(schema: &Schema) -> bool {
    matches!(
        schema,
        Schema::Null
            | Schema::Boolean
            | Schema::Int
            | Schema::Long
            | Schema::TimestampMillis
            | Schema::Float
            | Schema::Double
            | Schema::String
            | Schema::Uuid
            | Schema::Bytes
            | Schema::Enum(_)
            | Schema::Array(_)
            | Schema::Record(_)
            | Schema::Union(_)
    )
}

fn mismatch(path: &str, schema: &Schema, val: &Json) -> EncodingError {
    EncodingError::TypeMismatch {
        field: path.to_string(),
        expected: type_name(schema),
        found: json_kind(val).to_string(),
    }
}

fn json_kind(val: &Json) -> &'static str {
    match val {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

// ═══════════════════════════════════════════════════════════════
//  Avro → JSON conversion
// ═══════════════════════════════════════════════════════════════

pub fn avro_to_json(value: &Value) -> Result<Json, DecodingError> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Int(i) => serde_json::json!(i),
        Value::Long(l) => serde_json::json!(l),
        Value::Float(f) => float(f64::from(*f))?,
        Value::Double(d) => float(*d)?,
        Value::Bytes(b) => Json::String(base64::engine::general_purpose::STANDARD.encode(b)),
        Value::String(s) | Value::Enum(_, s) => Json::String(s.clone()),
        Value::Uuid(u) => Json::String(u.to_string()),
        Value::TimestampMillis(t) => serde_json::json!(t),
        Value::Union(_, inner) => avro_to_json(inner)?,
        Value::Array(items) => Json::Array(
            items
                .iter()
                .map(avro_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Map(entries) => {
            let mut map = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(k.clone(), avro_to_json(v)?);
            }
            Json::Object(map)
        }
        Value::Record(fields) => {
            let mut map = serde_json::Map::with_capacity(fields.len());
            for (k, v) in fields {
                map.insert(k.clone(), avro_to_json(v)?);
            }
            Json::Object(map)
        }
        other => return Err(DecodingError::Unsupported(value_kind(other).to_string())),
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Date(_) => "date",
        Value::TimeMillis(_) => "time-millis",
        Value::TimeMicros(_) => "time-micros",
        Value::TimestampMicros(_) => "timestamp-micros",
        Value::LocalTimestampMillis(_) => "local-timestamp-millis",
        Value::LocalTimestampMicros(_) => "local-timestamp-micros",
        Value::Fixed(..) => "fixed",
        Value::Decimal(_) => "decimal",
        Value::Duration(_) => "duration",
        _ => "other",
    }
}

fn float(f: f64) -> Result<Json, DecodingError> {
    serde_json::Number::from_f64(f)
        .map(Json::Number)
        .ok_or_else(|| DecodingError::Shape(format!("non-finite float {f}")))
}
