use courier_api::SchemaId;

use crate::error::DecodingError;

/// First byte of every encoded payload.
pub const MAGIC: u8 = 0x00;

/// Magic byte plus 4-byte schema id.
pub const HEADER_LEN: usize = 5;

pub fn write_header(out: &mut Vec<u8>, id: SchemaId) {
    out.push(MAGIC);
    out.extend_from_slice(&id.to_be_bytes());
}

/// Split a payload into its schema id and Avro body.
pub fn read_header(bytes: &[u8]) -> Result<(SchemaId, &[u8]), DecodingError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodingError::Truncated {
            len: bytes.len(),
            needed: HEADER_LEN,
        });
    }
    if bytes[0] != MAGIC {
        return Err(DecodingError::BadMagic(bytes[0]));
    }
    let id = SchemaId::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    Ok((id, &bytes[HEADER_LEN..]))
}
