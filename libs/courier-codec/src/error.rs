use courier_api::SchemaId;

use crate::compat::Incompatibility;

// ═══════════════════════════════════════════════════════════════
//  Encoding
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingError {
    #[error("required field '{field}' is missing")]
    MissingField { field: String },

    #[error("field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("record must serialize to a JSON object")]
    NotAnObject,

    #[error("serialize record: {0}")]
    Serialize(String),

    #[error("avro: {0}")]
    Avro(String),

    #[error("field '{field}': type '{type_name}' is not supported by the codec")]
    Unsupported { field: String, type_name: String },

    #[error("schema describes '{found}', record is '{expected}'")]
    WrongSchema { expected: String, found: String },
}

// ═══════════════════════════════════════════════════════════════
//  Decoding
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodingError {
    #[error("payload truncated: {len} bytes, need at least {needed}")]
    Truncated { len: usize, needed: usize },

    #[error("unknown magic byte 0x{0:02x}")]
    BadMagic(u8),

    #[error("writer schema {0} is unknown")]
    UnknownSchema(SchemaId),

    #[error("malformed avro datum: {0}")]
    Malformed(String),

    #[error("{0} trailing bytes after datum")]
    TrailingBytes(usize),

    #[error("writer record '{writer}' cannot be read as '{reader}'")]
    RecordMismatch { writer: String, reader: String },

    #[error(transparent)]
    Incompatible(#[from] Incompatibility),

    #[error("avro type '{0}' is not supported by the codec")]
    Unsupported(String),

    #[error("decoded value does not fit the record: {0}")]
    Shape(String),
}
