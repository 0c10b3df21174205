use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A record type that travels over the wire under an Avro record schema.
///
/// The associated name replaces runtime type lookup: a decoder only
/// produces `Self` from payloads whose writer schema carries this full name.
pub trait WireRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Avro full name (`namespace.Name`) of the record schema.
    const RECORD_NAME: &'static str;

    /// Identifier of this record, also the default partition key.
    fn record_id(&self) -> &str;
}

/// Domain event exchanged end to end.
///
/// `name` and `email` are optional in memory so that an incomplete event is
/// representable; the codec rejects it when the schema requires the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Milliseconds since the Unix epoch, captured at creation.
    pub timestamp: i64,
}

impl EventRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            email: Some(email.into()),
            timestamp,
        }
    }
}

impl WireRecord for EventRecord {
    const RECORD_NAME: &'static str = "courier.events.UserEvent";

    fn record_id(&self) -> &str {
        &self.id
    }
}
