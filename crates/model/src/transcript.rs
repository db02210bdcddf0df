use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Who produced a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// The human talking to the agent.
    User,
    /// The voice agent.
    Assistant,
    /// Raw backend payloads relayed by the agent, kept for debugging.
    ApiDebug,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
            Role::ApiDebug => f.write_str("api-debug"),
        }
    }
}

/// One line of the conversation transcript.
///
/// Entries are immutable once created; `sequence` is the position the
/// entry was appended at and is the only ordering guarantee.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// The author of the entry.
    pub role: Role,
    /// Plain text, or the pretty-printed form of a structured payload.
    pub content: String,
    /// Insertion position, starting from zero for every session.
    pub sequence: u64,
}
