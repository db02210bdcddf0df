use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// The opaque identifier the backend assigns to a conversation during the
/// handshake.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Wraps a raw identifier.
    #[inline]
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    #[inline]
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConversationId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}
