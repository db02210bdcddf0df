use serde_json::Value;

use crate::Role;

/// The body of an inbound agent message, decoded once at the boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    /// A plain text message.
    Text(String),
    /// A structured payload without a usable text field.
    Structured(Value),
}

impl MessageBody {
    /// Renders the body into the text form stored in the transcript.
    ///
    /// Text is kept verbatim, structured payloads are pretty-printed.
    pub fn render(&self) -> String {
        match self {
            MessageBody::Text(text) => text.clone(),
            MessageBody::Structured(value) => serde_json::to_string_pretty(value)
                .unwrap_or_else(|_| value.to_string()),
        }
    }

    /// Returns the text if this is a text body.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageBody::Text(text) => Some(text),
            MessageBody::Structured(_) => None,
        }
    }
}

impl From<Value> for MessageBody {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => MessageBody::Text(text),
            value @ (Value::Object(_) | Value::Array(_)) => {
                MessageBody::Structured(value)
            }
            primitive => MessageBody::Text(primitive.to_string()),
        }
    }
}

impl From<String> for MessageBody {
    #[inline]
    fn from(text: String) -> Self {
        MessageBody::Text(text)
    }
}

impl From<&str> for MessageBody {
    #[inline]
    fn from(text: &str) -> Self {
        MessageBody::Text(text.to_owned())
    }
}

/// An agent message after classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentMessage {
    /// Who the message is attributed to.
    pub role: Role,
    /// The decoded body.
    pub body: MessageBody,
}

const API_DEBUG_KEYS: [&str; 2] = ["apiResponse", "rawResponse"];

impl AgentMessage {
    /// Decodes a raw payload emitted by the voice link.
    ///
    /// A payload whose `source` is `"user"` is attributed to the user and
    /// everything else to the assistant. When `classify_api_debug` is set,
    /// non-user payloads carrying `apiResponse` or `rawResponse` are kept
    /// whole under [`Role::ApiDebug`].
    pub fn decode(payload: Value, classify_api_debug: bool) -> Self {
        let Value::Object(map) = payload else {
            return Self {
                role: Role::Assistant,
                body: payload.into(),
            };
        };

        let from_user = map.get("source").and_then(Value::as_str) == Some("user");
        if !from_user
            && classify_api_debug
            && API_DEBUG_KEYS.iter().any(|key| map.contains_key(*key))
        {
            return Self {
                role: Role::ApiDebug,
                body: MessageBody::Structured(Value::Object(map)),
            };
        }

        let role = if from_user { Role::User } else { Role::Assistant };
        let body = match map.get("message").and_then(Value::as_str) {
            Some(text) if !text.is_empty() => MessageBody::Text(text.to_owned()),
            _ => MessageBody::Structured(Value::Object(map)),
        };
        Self { role, body }
    }
}
