//! Shared types and seams of the courier event bus.
//!
//! Everything the codec, the log transport and the publish/consume engine
//! agree on lives here: the event record, delivery receipts, the wire schema
//! description and the two outbound traits (`LogTransport`, `SchemaSource`).

pub mod error;
pub mod receipt;
pub mod record;
pub mod schema;
pub mod transport;
pub mod util;

pub use error::{SchemaError, TransmissionError, TransportError};
pub use receipt::{DeliveryReceipt, Outcome};
pub use record::{EventRecord, WireRecord};
pub use schema::{FieldSpec, SchemaId, SchemaSource, WireSchema};
pub use transport::{Ack, Delivery, LogTransport, PartitionStream, RecordMeta};
pub use util::{hash_key, now_ms};
