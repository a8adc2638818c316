//! Defines the WebSocket message protocol between the browser client and the API server.

use serde::{Deserialize, Serialize};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A text message from the user; triggers a generated reply and its speech.
    UserMessage { message: String },
    /// Forgets the conversation so far.
    ClearHistory,
    /// Replaces the system prompt and forgets the conversation so far.
    SetPersonality { personality: String },
}

const KNOWN_TYPES: &[&str] = &["user_message", "clear_history", "set_personality"];

/// An inbound frame that could not be turned into a [`ClientMessage`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),
    #[error("Message is missing a string `type` field")]
    MissingType,
    #[error("Unsupported message type: {0}")]
    UnsupportedType(String),
    #[error("Binary messages are not supported")]
    BinaryFrame,
}

impl ClientMessage {
    /// Parses a JSON text frame, telling unknown message types apart from
    /// known types with bad fields.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if !KNOWN_TYPES.contains(&kind) {
            return Err(ProtocolError::UnsupportedType(kind.to_string()));
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Generation has started for the latest user message.
    Processing { message: String },
    /// The generated reply text.
    AiResponse { text: String },
    /// Base64-encoded `audio/mpeg` speech for the latest reply.
    Audio { audio: String },
    /// A pipeline step failed; the inbound event is finished.
    Error { message: String },
    /// Acknowledges `clear_history`.
    HistoryCleared,
    /// Acknowledges `set_personality`.
    PersonalitySet { message: String },
}

impl ServerMessage {
    /// Whether the client may accept new input after this message.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerMessage::Audio { .. }
                | ServerMessage::Error { .. }
                | ServerMessage::HistoryCleared
                | ServerMessage::PersonalitySet { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_inbound_messages() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"user_message","message":"Hello"}"#).unwrap(),
            ClientMessage::UserMessage {
                message: "Hello".to_string()
            }
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"clear_history"}"#).unwrap(),
            ClientMessage::ClearHistory
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"set_personality","personality":"You are a pirate."}"#)
                .unwrap(),
            ClientMessage::SetPersonality {
                personality: "You are a pirate.".to_string()
            }
        );
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let msg = ClientMessage::parse(r#"{"type":"clear_history","force":true}"#).unwrap();
        assert_eq!(msg, ClientMessage::ClearHistory);
    }

    #[test]
    fn test_parse_rejects_bad_frames() {
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert_eq!(
            ClientMessage::parse(r#"{"message":"Hello"}"#),
            Err(ProtocolError::MissingType)
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"start_voice"}"#),
            Err(ProtocolError::UnsupportedType("start_voice".to_string()))
        );
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"user_message"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_server_message_wire_format() {
        let cases = vec![
            (
                ServerMessage::Processing {
                    message: "Thinking...".to_string(),
                },
                json!({"type": "processing", "message": "Thinking..."}),
            ),
            (
                ServerMessage::AiResponse {
                    text: "Hi there!".to_string(),
                },
                json!({"type": "ai_response", "text": "Hi there!"}),
            ),
            (
                ServerMessage::Audio {
                    audio: "SUQz".to_string(),
                },
                json!({"type": "audio", "audio": "SUQz"}),
            ),
            (
                ServerMessage::Error {
                    message: "boom".to_string(),
                },
                json!({"type": "error", "message": "boom"}),
            ),
            (ServerMessage::HistoryCleared, json!({"type": "history_cleared"})),
            (
                ServerMessage::PersonalitySet {
                    message: "Personality updated successfully".to_string(),
                },
                json!({"type": "personality_set", "message": "Personality updated successfully"}),
            ),
        ];

        for (msg, expected) in cases {
            assert_eq!(serde_json::to_value(&msg).unwrap(), expected);
        }
    }

    #[test]
    fn test_terminal_messages() {
        assert!(!ServerMessage::Processing {
            message: String::new()
        }
        .is_terminal());
        assert!(!ServerMessage::AiResponse {
            text: String::new()
        }
        .is_terminal());
        assert!(ServerMessage::HistoryCleared.is_terminal());
        assert!(ServerMessage::Error {
            message: String::new()
        }
        .is_terminal());
    }
}
