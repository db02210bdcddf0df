use std::fmt::{self, Display};

use async_trait::async_trait;
use serde_json::Value;

use crate::{ConversationId, VoiceLinkError};

/// Variables handed to the voice agent when a session opens.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionVars {
    /// The conversation the voice session belongs to.
    pub conversation_id: Option<ConversationId>,
}

impl SessionVars {
    /// Creates variables for the given conversation.
    #[inline]
    pub fn for_conversation(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id: Some(conversation_id),
        }
    }
}

/// Identifies one connection opened through a [`VoiceLink`].
///
/// Handles are minted by the link and are never reused, so closing a
/// connection that was superseded leaves the newer one untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkHandle(u64);

impl LinkHandle {
    /// Wraps a link-specific connection number.
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the connection number.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for LinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Receives the events a voice link emits, one method per event.
///
/// Implementations must return quickly; they are called from whatever
/// context the voice link runs its callbacks on.
pub trait VoiceEventHandler: Send + Sync {
    /// The voice link confirmed the connection.
    fn on_connect(&self);

    /// The voice link closed on its own, for example after a fatal error
    /// or when the remote agent hung up.
    fn on_disconnect(&self);

    /// The voice link reported an error. It does not imply a disconnect.
    fn on_error(&self, message: &str);

    /// The agent relayed a message. The payload is typically shaped like
    /// `{ "source": "user" | "ai", "message": "...", ... }`.
    fn on_message(&self, payload: Value);

    /// The assistant started speaking.
    fn on_speech_start(&self);

    /// The user started speaking.
    fn on_user_start_speaking(&self);

    /// The user stopped speaking.
    fn on_user_stop_speaking(&self);
}

/// The voice agent SDK as seen by the session core.
#[async_trait]
pub trait VoiceLink: Send + Sync + 'static {
    /// Opens a voice session with the given agent.
    ///
    /// Returning `Ok` means the link is being established; the connection
    /// is confirmed later through [`VoiceEventHandler::on_connect`]. The
    /// returned handle names this connection in [`VoiceLink::disconnect`].
    async fn connect(
        &self,
        agent_id: &str,
        vars: SessionVars,
        events: Box<dyn VoiceEventHandler>,
    ) -> Result<LinkHandle, VoiceLinkError>;

    /// Closes the given connection. Closing a connection that is already
    /// gone is a no-op.
    async fn disconnect(&self, handle: LinkHandle) -> Result<(), VoiceLinkError>;

    /// Sets the output volume, already clamped to `[0.0, 1.0]`.
    fn set_volume(&self, volume: f32);

    /// Vocalizes the given text.
    fn start_speaking(&self, text: &str);

    /// Stops any ongoing audio output.
    fn stop_speaking(&self);
}
