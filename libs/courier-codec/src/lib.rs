//! Schema-tagged Avro codec and local schema registry.
//!
//! Payload layout: `0x00` magic byte, 4-byte big-endian schema id, Avro
//! binary datum. Decoders recover the writer schema from the id and resolve
//! it against their own reader schema.

pub mod codec;
pub mod compat;
pub mod convert;
pub mod error;
pub mod registry;
pub mod wire;

pub use codec::AvroCodec;
pub use compat::{check_readable, Incompatibility};
pub use error::{DecodingError, EncodingError};
pub use registry::SchemaRegistry;
