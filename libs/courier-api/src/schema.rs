use std::sync::Arc;

use apache_avro::Schema;
use serde::Serialize;

use crate::error::SchemaError;

/// Numeric id carried in every encoded payload's header.
pub type SchemaId = u32;

// ════════════════════════════════════════════════════════════════
//  FieldSpec
// ════════════════════════════════════════════════════════════════

/// One field of a wire schema: name, declared type, nullability, default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    /// Avro type name of the field (`"long"`, `"string"`, `"null|string"`).
    pub type_name: String,
    pub nullable: bool,
    /// Default applied by readers when the writer did not have the field.
    pub default: Option<serde_json::Value>,
}

// ════════════════════════════════════════════════════════════════
//  WireSchema
// ════════════════════════════════════════════════════════════════

/// An immutable, published version of a record schema.
///
/// Once a `WireSchema` is handed out by a schema source its id, version and
/// Avro definition never change; evolution publishes a new version.
#[derive(Debug, Clone)]
pub struct WireSchema {
    id: SchemaId,
    subject: String,
    version: u32,
    record_name: String,
    avro: Schema,
    fields: Vec<FieldSpec>,
}

impl WireSchema {
    /// Wrap a parsed Avro schema. Only record schemas are accepted.
    pub fn new(
        id: SchemaId,
        subject: impl Into<String>,
        version: u32,
        avro: Schema,
    ) -> Result<Self, SchemaError> {
        let subject = subject.into();
        let Schema::Record(record) = &avro else {
            return Err(SchemaError::NotARecord(subject));
        };

        let record_name = record.name.fullname(None);
        let fields = record
            .fields
            .iter()
            .map(|f| FieldSpec {
                name: f.name.clone(),
                type_name: type_name(&f.schema),
                nullable: is_nullable(&f.schema),
                default: f.default.clone(),
            })
            .collect();

        Ok(Self {
            id,
            subject,
            version,
            record_name,
            avro,
            fields,
        })
    }

    /// Parse an Avro schema definition (`.avsc` JSON) and wrap it.
    pub fn parse(
        id: SchemaId,
        subject: impl Into<String>,
        version: u32,
        definition: &str,
    ) -> Result<Self, SchemaError> {
        let subject = subject.into();
        let avro = Schema::parse_str(definition).map_err(|e| SchemaError::Invalid {
            subject: subject.clone(),
            reason: e.to_string(),
        })?;
        Self::new(id, subject, version, avro)
    }

    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Full name of the Avro record (`namespace.Name`).
    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    pub fn avro(&self) -> &Schema {
        &self.avro
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// ════════════════════════════════════════════════════════════════
//  SchemaSource
// ════════════════════════════════════════════════════════════════

/// Lookup of published schemas by id, shared by encode and decode paths.
///
/// May be backed by a local registry or a cache of a remote schema service;
/// the core treats it as a pure lookup.
pub trait SchemaSource: Send + Sync {
    fn resolve(&self, id: SchemaId) -> Result<Arc<WireSchema>, SchemaError>;
}

// ════════════════════════════════════════════════════════════════
//  Helpers
// ════════════════════════════════════════════════════════════════

/// True for `null` and for unions with a `null` branch.
pub fn is_nullable(schema: &Schema) -> bool {
    match schema {
        Schema::Null => true,
        Schema::Union(union) => union.variants().iter().any(|v| matches!(v, Schema::Null)),
        _ => false,
    }
}

/// Human-readable Avro type name, used in field specs and error messages.
pub fn type_name(schema: &Schema) -> String {
    match schema {
        Schema::Null => "null".into(),
        Schema::Boolean => "boolean".into(),
        Schema::Int => "int".into(),
        Schema::Long => "long".into(),
        Schema::Float => "float".into(),
        Schema::Double => "double".into(),
        Schema::Bytes => "bytes".into(),
        Schema::String => "string".into(),
        Schema::Uuid => "uuid".into(),
        Schema::Date => "date".into(),
        Schema::TimestampMillis => "timestamp-millis".into(),
        Schema::TimestampMicros => "timestamp-micros".into(),
        Schema::TimeMillis => "time-millis".into(),
        Schema::TimeMicros => "time-micros".into(),
        Schema::LocalTimestampMillis => "local-timestamp-millis".into(),
        Schema::LocalTimestampMicros => "local-timestamp-micros".into(),
        Schema::Decimal(_) => "decimal".into(),
        Schema::Duration => "duration".into(),
        Schema::Array(array) => format!("array<{}>", type_name(&array.items)),
        Schema::Map(map) => format!("map<{}>", type_name(&map.types)),
        Schema::Record(record) => record.name.fullname(None),
        Schema::Enum(e) => e.name.fullname(None),
        Schema::Fixed(f) => f.name.fullname(None),
        Schema::Union(union) => union
            .variants()
            .iter()
            .map(type_name)
            .collect::<Vec<_>>()
            .join("|"),
        _ => "other".into(),
    }
}
