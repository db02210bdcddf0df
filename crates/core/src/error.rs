use thiserror::Error;
use voyagr_model::{ConversationId, ErrorKind};

use crate::session::TransitionError;

/// A backend call failure with the concrete error type erased.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct BackendFailure {
    /// The failure class reported by the backend.
    pub kind: ErrorKind,
    /// Human readable description of the failure.
    pub message: String,
}

/// Everything the session core reports to its host.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The backend could not mint a conversation id. The session stays
    /// idle and the connect request is not retried.
    #[error("could not open a conversation: {0}")]
    HandshakeFailed(BackendFailure),
    /// The voice link reported an error or could not be opened.
    #[error("voice link error: {0}")]
    VoiceLink(String),
    /// A trip data poll failed; the previous selection is kept.
    #[error("poll for conversation {conversation_id} failed: {failure}")]
    PollFailed {
        /// The conversation the poll was issued for.
        conversation_id: ConversationId,
        /// Why the poll failed.
        failure: BackendFailure,
    },
    /// The final transcript could not be uploaded.
    #[error("transcript upload for conversation {conversation_id} failed: {reason}")]
    UploadFailed {
        /// The conversation whose transcript was being uploaded.
        conversation_id: ConversationId,
        /// Why the upload failed or was abandoned.
        reason: String,
    },
    /// The request is not valid in the current session state.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    /// The session has been shut down.
    #[error("the session has been shut down")]
    Closed,
}

impl SessionError {
    /// Returns whether the error should be shown to the user.
    ///
    /// Poll and upload failures only affect advisory trip data and are
    /// logged instead.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            SessionError::PollFailed { .. } | SessionError::UploadFailed { .. }
        )
    }
}

impl From<voyagr_actor::ActorDeadError> for SessionError {
    #[inline]
    fn from(_: voyagr_actor::ActorDeadError) -> Self {
        SessionError::Closed
    }
}
