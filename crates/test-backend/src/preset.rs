use serde::{Deserialize, Serialize};
use voyagr_model::{ConversationId, ErrorKind, TripSnapshot};

/// Serializable mirror of [`ErrorKind`] for scripted failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    ClientStatus,
    ServerStatus,
    Malformed,
    Other,
}

impl From<FailureKind> for ErrorKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Transport => ErrorKind::Transport,
            FailureKind::ClientStatus => ErrorKind::ClientStatus,
            FailureKind::ServerStatus => ErrorKind::ServerStatus,
            FailureKind::Malformed => ErrorKind::Malformed,
            FailureKind::Other => ErrorKind::Other,
        }
    }
}

/// How the backend answers one handshake.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PresetHandshake {
    Accept(ConversationId),
    Reject(FailureKind),
}

impl PresetHandshake {
    /// Accepts the handshake with the given conversation id.
    #[inline]
    pub fn accept<S: Into<String>>(id: S) -> Self {
        Self::Accept(ConversationId::new(id))
    }
}

/// How the backend answers one poll.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PresetPoll {
    Snapshot(TripSnapshot),
    Failure(FailureKind),
}

/// A scripted poll answer, optionally delayed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PollStep {
    pub preset: PresetPoll,
    /// Delay before the answer resolves, in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
}

/// How the backend answers transcript uploads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PresetUpload {
    #[default]
    Accept,
    Reject(FailureKind),
    /// Never resolves.
    Hang,
}
