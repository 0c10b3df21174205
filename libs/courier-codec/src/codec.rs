use std::sync::Arc;

use courier_api::{SchemaSource, WireRecord, WireSchema};
use serde_json::Value as Json;

use crate::compat::check_readable;
use crate::convert::{avro_to_json, encode_record};
use crate::error::{DecodingError, EncodingError};
use crate::wire;

/// Encoder/decoder between records and schema-tagged Avro payloads.
///
/// Cheap to clone; all clones share one schema source.
#[derive(Clone)]
pub struct AvroCodec {
    schemas: Arc<dyn SchemaSource>,
}

impl std::fmt::Debug for AvroCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvroCodec").finish_non_exhaustive()
    }
}

impl AvroCodec {
    pub fn new(schemas: Arc<dyn SchemaSource>) -> Self {
        Self { schemas }
    }

    pub fn schemas(&self) -> &Arc<dyn SchemaSource> {
        &self.schemas
    }

    /// Encode a typed record. The schema must describe `T`'s record name.
    pub fn encode<T: WireRecord>(
        &self,
        record: &T,
        schema: &WireSchema,
    ) -> Result<Vec<u8>, EncodingError> {
        if schema.record_name() != T::RECORD_NAME {
            return Err(EncodingError::WrongSchema {
                expected: T::RECORD_NAME.to_string(),
                found: schema.record_name().to_string(),
            });
        }
        let json = serde_json::to_value(record).map_err(|e| EncodingError::Serialize(e.to_string()))?;
        self.encode_value(&json, schema)
    }

    /// Encode a JSON object under `schema`, tagged with the schema id.
    pub fn encode_value(&self, value: &Json, schema: &WireSchema) -> Result<Vec<u8>, EncodingError> {
        let record = encode_record(value, schema.avro())?;
        let datum = apache_avro::to_avro_datum(schema.avro(), record)
            .map_err(|e| EncodingError::Avro(e.to_string()))?;

        let mut out = Vec::with_capacity(wire::HEADER_LEN + datum.len());
        wire::write_header(&mut out, schema.id());
        out.extend_from_slice(&datum);
        Ok(out)
    }

    /// Decode a payload into JSON using `schema` as the reader schema.
    ///
    /// The writer schema comes from the payload tag. Fields the writer did
    /// not have are filled from the reader's defaults.
    pub fn decode_value(&self, bytes: &[u8], schema: &WireSchema) -> Result<Json, DecodingError> {
        let (id, body) = wire::read_header(bytes)?;

        let resolved;
        let writer = if id == schema.id() {
            schema
        } else {
            resolved = self
                .schemas
                .resolve(id)
                .map_err(|_| DecodingError::UnknownSchema(id))?;
            &*resolved
        };

        if writer.record_name() != schema.record_name() {
            return Err(DecodingError::RecordMismatch {
                writer: writer.record_name().to_string(),
                reader: schema.record_name().to_string(),
            });
        }
        check_readable(writer.avro(), schema.avro())?;

        let mut reader = body;
        let value = apache_avro::from_avro_datum(writer.avro(), &mut reader, Some(schema.avro()))
            .map_err(|e| DecodingError::Malformed(e.to_string()))?;
        if !reader.is_empty() {
            return Err(DecodingError::TrailingBytes(reader.len()));
        }
        avro_to_json(&value)
    }

    /// Decode a payload into `T`. Fails if the writer record is not `T`.
    pub fn decode<T: WireRecord>(&self, bytes: &[u8], schema: &WireSchema) -> Result<T, DecodingError> {
        if schema.record_name() != T::RECORD_NAME {
            return Err(DecodingError::RecordMismatch {
                writer: schema.record_name().to_string(),
                reader: T::RECORD_NAME.to_string(),
            });
        }
        let json = self.decode_value(bytes, schema)?;
        serde_json::from_value(json).map_err(|e| DecodingError::Shape(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use courier_api::EventRecord;
    use serde_json::json;

    use super::*;
    use crate::SchemaRegistry;

    const V1: &str = include_str!("../../../schemas/user_event.v1.avsc");
    const V2: &str = include_str!("../../../schemas/user_event.v2.avsc");

    fn setup() -> (AvroCodec, Arc<WireSchema>, Arc<WireSchema>) {
        let registry = Arc::new(SchemaRegistry::new());
        let v1 = registry.register("user-events", V1).unwrap();
        let v2 = registry.register("user-events", V2).unwrap();
        (AvroCodec::new(registry), v1, v2)
    }

    #[test]
    fn test_round_trip() {
        let (codec, v1, _) = setup();
        let event = EventRecord::new("e1", "Ann", "ann@x.com", 1000);

        let bytes = codec.encode(&event, &v1).unwrap();
        assert_eq!(&bytes[..5], &[0x00, 0, 0, 0, v1.id() as u8]);

        let decoded: EventRecord = codec.decode(&bytes, &v1).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let (codec, v1, _) = setup();
        let event = EventRecord::new("e1", "Ann", "ann@x.com", 1000);
        assert_eq!(codec.encode(&event, &v1).unwrap(), codec.encode(&event, &v1).unwrap());
    }

    #[test]
    fn test_old_data_read_with_new_schema_gets_defaults() {
        let (codec, v1, v2) = setup();
        let event = EventRecord::new("e1", "Ann", "ann@x.com", 1000);
        let bytes = codec.encode(&event, &v1).unwrap();

        let value = codec.decode_value(&bytes, &v2).unwrap();
        assert_eq!(
            value,
            json!({ "id": "e1", "name": "Ann", "email": "ann@x.com", "timestamp": 1000, "source": null })
        );

        let decoded: EventRecord = codec.decode(&bytes, &v2).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_new_data_read_with_old_schema_skips_field() {
        let (codec, v1, v2) = setup();
        let value = json!({ "id": "e1", "name": "Ann", "email": "a@x", "timestamp": 5, "source": "web" });
        let bytes = codec.encode_value(&value, &v2).unwrap();

        let decoded: EventRecord = codec.decode(&bytes, &v1).unwrap();
        assert_eq!(decoded, EventRecord::new("e1", "Ann", "a@x", 5));
    }

    #[test]
    fn test_missing_email_fails_encoding() {
        let (codec, v1, _) = setup();
        let mut event = EventRecord::new("e1", "Ann", "ann@x.com", 1000);
        event.email = None;

        let err = codec.encode(&event, &v1).unwrap_err();
        assert_eq!(err, EncodingError::MissingField { field: "email".into() });
    }

    #[test]
    fn test_truncated_datum() {
        let (codec, v1, _) = setup();
        let bytes = codec.encode(&EventRecord::new("e1", "Ann", "ann@x.com", 1000), &v1).unwrap();

        let err = codec.decode::<EventRecord>(&bytes[..bytes.len() - 1], &v1).unwrap_err();
        assert!(matches!(err, DecodingError::Malformed(_)), "{err:?}");

        let err = codec.decode::<EventRecord>(&bytes[..3], &v1).unwrap_err();
        assert!(matches!(err, DecodingError::Truncated { .. }));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let (codec, v1, _) = setup();
        let mut bytes = codec.encode(&EventRecord::new("e1", "Ann", "ann@x.com", 1000), &v1).unwrap();
        bytes.extend_from_slice(&[1, 2]);

        let err = codec.decode::<EventRecord>(&bytes, &v1).unwrap_err();
        assert_eq!(err, DecodingError::TrailingBytes(2));
    }

    #[test]
    fn test_unknown_schema_tag() {
        let (codec, v1, _) = setup();
        let mut bytes = codec.encode(&EventRecord::new("e1", "Ann", "ann@x.com", 1000), &v1).unwrap();
        bytes[4] = 99;

        let err = codec.decode::<EventRecord>(&bytes, &v1).unwrap_err();
        assert_eq!(err, DecodingError::UnknownSchema(99));
    }

    #[test]
    fn test_foreign_record_rejected() {
        let registry = Arc::new(SchemaRegistry::new());
        let v1 = registry.register("user-events", V1).unwrap();
        let other = registry
            .register(
                "orders",
                r#"{"type":"record","name":"Order","fields":[{"name":"id","type":"string"}]}"#,
            )
            .unwrap();
        let codec = AvroCodec::new(registry);

        let bytes = codec.encode_value(&json!({ "id": "o1" }), &other).unwrap();
        let err = codec.decode::<EventRecord>(&bytes, &v1).unwrap_err();
        assert!(matches!(err, DecodingError::RecordMismatch { .. }));

        let err = codec.encode(&EventRecord::new("e1", "Ann", "a@x", 1), &other).unwrap_err();
        assert!(matches!(err, EncodingError::WrongSchema { .. }));
    }
}
