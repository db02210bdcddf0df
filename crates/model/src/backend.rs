use crate::error::BackendError;
use crate::{ConversationId, TranscriptEntry, TripSnapshot};

/// A type that represents the remote backend owning conversation identity
/// and trip data.
///
/// Once created, a backend should behave like a stateless object. Every
/// method returns a future that is independent of `self`, so callers can
/// move it onto another task; timeouts are the implementation's concern.
pub trait Backend: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// Mints a new conversation identifier (the handshake).
    fn open_conversation(
        &self,
    ) -> impl Future<Output = Result<ConversationId, Self::Error>> + Send + 'static;

    /// Fetches the current trip snapshot for a conversation.
    fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<TripSnapshot, Self::Error>> + Send + 'static;

    /// Uploads the final transcript of a conversation.
    fn upload_transcript(
        &self,
        id: &ConversationId,
        transcript: &[TranscriptEntry],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;
}
