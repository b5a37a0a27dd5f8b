use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Notification text for an unreachable host
pub const CONNECTION_FAILURE_MESSAGE: &str = "Unable to connect to host";

/// Notification text when a failure carries no message
pub const GENERIC_FAILURE_MESSAGE: &str = "Error";

/// Failure while listing models
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Unable to connect to host {host}")]
    Connection { host: String },

    #[error("{}", .message.as_deref().unwrap_or(GENERIC_FAILURE_MESSAGE))]
    Other { message: Option<String> },
}

impl DirectoryError {
    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        DirectoryError::Other {
            message: (!message.is_empty()).then_some(message),
        }
    }

    /// Text shown to the user for this failure
    pub fn user_message(&self) -> &str {
        match self {
            DirectoryError::Connection { .. } => CONNECTION_FAILURE_MESSAGE,
            DirectoryError::Other { message } => {
                message.as_deref().unwrap_or(GENERIC_FAILURE_MESSAGE)
            }
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, DirectoryError::Connection { .. })
    }
}

/// Response of `GET /api/tags`
#[derive(Debug, Clone, Deserialize)]
pub struct ModelTagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

/// A locally installed model
#[derive(Debug, Clone, Deserialize)]
pub struct ModelTag {
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    /// `None` when absent or not an RFC 3339 timestamp
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub details: Option<ModelDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub parameter_size: Option<String>,
    #[serde(default)]
    pub quantization_level: Option<String>,
}

// Servers speaking the Ollama API do not all format this field the same way
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc)))
}

/// Error body returned by Ollama on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let err = DirectoryError::Connection {
            host: "http://localhost:11434".to_string(),
        };
        assert_eq!(err.user_message(), "Unable to connect to host");
        assert!(err.is_connection());

        let err = DirectoryError::other("model store corrupt");
        assert_eq!(err.user_message(), "model store corrupt");
        assert_eq!(err.to_string(), "model store corrupt");

        let err = DirectoryError::other("");
        assert_eq!(err, DirectoryError::Other { message: None });
        assert_eq!(err.user_message(), "Error");
        assert_eq!(err.to_string(), "Error");
    }

    #[test]
    fn test_parse_tags_response() {
        let json = r#"{
            "models": [
                {
                    "name": "llama3:latest",
                    "model": "llama3:latest",
                    "modified_at": "2024-05-01T10:20:30.123456789Z",
                    "size": 4661224676,
                    "digest": "365c0bd3c000",
                    "details": {
                        "format": "gguf",
                        "family": "llama",
                        "parameter_size": "8.0B",
                        "quantization_level": "Q4_0"
                    }
                },
                { "name": "mistral" }
            ]
        }"#;

        let response: ModelTagsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.models.len(), 2);
        assert_eq!(response.models[0].name, "llama3:latest");
        assert_eq!(response.models[0].size, Some(4_661_224_676));
        let details = response.models[0].details.as_ref().unwrap();
        assert_eq!(details.family.as_deref(), Some("llama"));
        assert!(response.models[0].modified_at.is_some());
        assert!(response.models[1].details.is_none());
    }

    #[test]
    fn test_unparsable_timestamp_is_ignored() {
        let json = r#"{"models":[
            {"name":"llama3","modified_at":"2024-05-01 10:20:30"},
            {"name":"mistral","modified_at":1714558830},
            {"name":"phi3","modified_at":null}
        ]}"#;

        let response: ModelTagsResponse = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = response.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["llama3", "mistral", "phi3"]);
        assert!(response.models.iter().all(|m| m.modified_at.is_none()));
    }

    #[test]
    fn test_parse_empty_tags_response() {
        let response: ModelTagsResponse = serde_json::from_str("{}").unwrap();
        assert!(response.models.is_empty());
    }
}
