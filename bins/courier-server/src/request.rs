use courier_api::{now_ms, EventRecord};
use serde::Deserialize;

/// One publish request read from the input stream.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("Name is required")]
    NameRequired,

    #[error("Email is required")]
    EmailRequired,

    #[error("Email should be valid")]
    EmailInvalid,
}

impl PublishRequest {
    pub fn parse(line: &str) -> Result<Self, RequestError> {
        serde_json::from_str(line).map_err(|e| RequestError::Malformed(e.to_string()))
    }

    /// Validate and turn the request into a new event with a fresh id.
    pub fn into_event(self) -> Result<EventRecord, RequestError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(RequestError::NameRequired)?;
        let email = self
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or(RequestError::EmailRequired)?;
        if !is_email(&email) {
            return Err(RequestError::EmailInvalid);
        }

        Ok(EventRecord::new(
            uuid::Uuid::new_v4().to_string(),
            name,
            email,
            now_ms(),
        ))
    }
}

/// `local@domain`, both parts non-empty, no whitespace.
fn is_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
