//! The session lifecycle state machine.
//!
//! ```text
//! idle -> connecting -> connected -> disconnecting -> idle
//! ```
//!
//! A connect request first reserves a handshake slot while the machine is
//! still idle. Only a successful handshake moves it to `connecting`.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use voyagr_model::ConversationId;

/// Lifecycle status of the voice session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session; the default state.
    #[default]
    Idle,
    /// The handshake succeeded and the voice link is being opened.
    Connecting,
    /// The voice link confirmed the connection.
    Connected,
    /// A disconnect was requested and is being finalized.
    Disconnecting,
}

impl SessionStatus {
    /// Maps the status to what presentation shows. `Disconnecting` is
    /// indistinguishable from `Idle`.
    #[inline]
    pub fn display(self) -> DisplayStatus {
        match self {
            SessionStatus::Idle | SessionStatus::Disconnecting => {
                DisplayStatus::Disconnected
            }
            SessionStatus::Connecting => DisplayStatus::Connecting,
            SessionStatus::Connected => DisplayStatus::Connected,
        }
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Disconnecting => "disconnecting",
        })
    }
}

/// The externally visible session status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    /// Idle or disconnecting.
    Disconnected,
    /// Waiting for the voice link.
    Connecting,
    /// Live conversation.
    Connected,
}

impl DisplayStatus {
    /// The status label shown next to the microphone control.
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            DisplayStatus::Disconnected => "Disconnected",
            DisplayStatus::Connecting => "Connecting...",
            DisplayStatus::Connected => "Connected",
        }
    }

    /// The speaking indicator label, only present while connected.
    #[inline]
    pub fn activity_label(self, is_speaking: bool) -> Option<&'static str> {
        match (self, is_speaking) {
            (DisplayStatus::Connected, true) => Some("Speaking"),
            (DisplayStatus::Connected, false) => Some("Listening"),
            _ => None,
        }
    }
}

/// Playback volume, always within `[0.0, 1.0]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Volume(f32);

impl Volume {
    /// Full volume.
    pub const MAX: Volume = Volume(1.0);
    /// Muted.
    pub const MIN: Volume = Volume(0.0);

    /// Clamps the value into range. NaN is treated as muted.
    #[inline]
    pub fn clamped(value: f32) -> Self {
        if value.is_nan() {
            Self::MIN
        } else {
            Volume(value.clamp(0.0, 1.0))
        }
    }

    /// Returns the raw level.
    #[inline]
    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Volume {
    #[inline]
    fn default() -> Self {
        Self::MAX
    }
}

/// A trigger that is not valid in the current state.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The trigger is not accepted from the current status.
    #[error("cannot {trigger} while the session is {status}")]
    NotAllowed {
        /// What was requested.
        trigger: &'static str,
        /// The status at the time of the request.
        status: SessionStatus,
    },
    /// A handshake is already in flight.
    #[error("a connect request is already in progress")]
    ConnectPending,
    /// The handshake result belongs to an attempt that was abandoned.
    #[error("connect attempt {0} is no longer current")]
    StaleAttempt(u64),
}

/// Proof that a connect request reserved the handshake slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectTicket(u64);

impl ConnectTicket {
    /// The attempt number, increasing across the machine's lifetime.
    #[inline]
    pub fn attempt(self) -> u64 {
        self.0
    }
}

/// The session lifecycle. Owned by the orchestrator, which is its only
/// writer.
#[derive(Clone, Debug, Default)]
pub struct SessionMachine {
    status: SessionStatus,
    is_speaking: bool,
    volume: Volume,
    conversation_id: Option<ConversationId>,
    pending_attempt: Option<u64>,
    attempts: u64,
}

impl SessionMachine {
    /// Reserves the handshake slot. Valid only while idle with no other
    /// handshake in flight.
    pub fn request_connect(&mut self) -> Result<ConnectTicket, TransitionError> {
        if self.status != SessionStatus::Idle {
            return Err(TransitionError::NotAllowed {
                trigger: "connect",
                status: self.status,
            });
        }
        if self.pending_attempt.is_some() {
            return Err(TransitionError::ConnectPending);
        }
        self.attempts += 1;
        self.pending_attempt = Some(self.attempts);
        Ok(ConnectTicket(self.attempts))
    }

    /// Records the conversation id minted by the handshake and moves to
    /// `connecting`.
    pub fn handshake_succeeded(
        &mut self,
        ticket: ConnectTicket,
        conversation_id: ConversationId,
    ) -> Result<(), TransitionError> {
        self.take_ticket(ticket)?;
        self.status = SessionStatus::Connecting;
        self.is_speaking = false;
        self.conversation_id = Some(conversation_id);
        Ok(())
    }

    /// Releases the handshake slot. The machine stays idle.
    pub fn handshake_failed(
        &mut self,
        ticket: ConnectTicket,
    ) -> Result<(), TransitionError> {
        self.take_ticket(ticket)
    }

    fn take_ticket(&mut self, ticket: ConnectTicket) -> Result<(), TransitionError> {
        if self.pending_attempt != Some(ticket.0) {
            return Err(TransitionError::StaleAttempt(ticket.0));
        }
        self.pending_attempt = None;
        Ok(())
    }

    /// The voice link confirmed the connection. Returns whether the status
    /// changed.
    pub fn link_connected(&mut self) -> bool {
        if self.status != SessionStatus::Connecting {
            return false;
        }
        self.status = SessionStatus::Connected;
        true
    }

    /// The voice link went away (or never came up) without a disconnect
    /// request. Returns the conversation that was active, if any.
    pub fn link_lost(&mut self) -> Option<ConversationId> {
        match self.status {
            SessionStatus::Connecting | SessionStatus::Connected => {
                self.status = SessionStatus::Idle;
                self.is_speaking = false;
                self.conversation_id.take()
            }
            SessionStatus::Idle | SessionStatus::Disconnecting => None,
        }
    }

    /// Moves to `disconnecting` and hands back the conversation to
    /// finalize.
    pub fn request_disconnect(
        &mut self,
    ) -> Result<Option<ConversationId>, TransitionError> {
        match self.status {
            SessionStatus::Connecting | SessionStatus::Connected => {
                self.status = SessionStatus::Disconnecting;
                self.is_speaking = false;
                Ok(self.conversation_id.take())
            }
            status => Err(TransitionError::NotAllowed {
                trigger: "disconnect",
                status,
            }),
        }
    }

    /// Completes a disconnect. Returns whether the status changed.
    pub fn finish_disconnect(&mut self) -> bool {
        if self.status != SessionStatus::Disconnecting {
            return false;
        }
        self.status = SessionStatus::Idle;
        true
    }

    /// Marks the assistant as speaking. A no-op unless connected.
    #[inline]
    pub fn speech_started(&mut self) -> bool {
        self.set_speaking(true)
    }

    /// Marks the assistant as silent. A no-op unless connected.
    #[inline]
    pub fn speech_stopped(&mut self) -> bool {
        self.set_speaking(false)
    }

    fn set_speaking(&mut self, speaking: bool) -> bool {
        if self.status != SessionStatus::Connected || self.is_speaking == speaking {
            return false;
        }
        self.is_speaking = speaking;
        true
    }

    /// Stores the clamped volume and returns it.
    #[inline]
    pub fn set_volume(&mut self, value: f32) -> Volume {
        self.volume = Volume::clamped(value);
        self.volume
    }

    /// The current lifecycle status.
    #[inline]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Whether the assistant is speaking. Always `false` unless connected.
    #[inline]
    pub fn is_speaking(&self) -> bool {
        self.status == SessionStatus::Connected && self.is_speaking
    }

    /// The retained volume.
    #[inline]
    pub fn volume(&self) -> Volume {
        self.volume
    }

    /// The active conversation, if any.
    #[inline]
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    /// Whether a handshake is in flight.
    #[inline]
    pub fn is_handshaking(&self) -> bool {
        self.pending_attempt.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(id: &str) -> SessionMachine {
        let mut machine = SessionMachine::default();
        let ticket = machine.request_connect().unwrap();
        machine.handshake_succeeded(ticket, id.into()).unwrap();
        assert!(machine.link_connected());
        machine
    }

    #[test]
    fn test_connect_lifecycle() {
        let mut machine = SessionMachine::default();
        assert_eq!(machine.status(), SessionStatus::Idle);
        assert_eq!(machine.conversation_id(), None);

        let ticket = machine.request_connect().unwrap();
        // Still idle until the handshake resolves.
        assert_eq!(machine.status(), SessionStatus::Idle);
        assert_eq!(
            machine.request_connect(),
            Err(TransitionError::ConnectPending)
        );

        machine.handshake_succeeded(ticket, "abc".into()).unwrap();
        assert_eq!(machine.status(), SessionStatus::Connecting);
        assert_eq!(machine.conversation_id().map(|id| id.as_str()), Some("abc"));

        assert!(machine.link_connected());
        assert!(!machine.link_connected());
        assert_eq!(machine.status(), SessionStatus::Connected);
    }

    #[test]
    fn test_failed_handshake_stays_idle() {
        let mut machine = SessionMachine::default();
        let ticket = machine.request_connect().unwrap();
        machine.handshake_failed(ticket).unwrap();
        assert_eq!(machine.status(), SessionStatus::Idle);
        assert!(!machine.is_handshaking());

        // A late success for the abandoned attempt is rejected.
        assert_eq!(
            machine.handshake_succeeded(ticket, "late".into()),
            Err(TransitionError::StaleAttempt(ticket.attempt()))
        );
        assert_eq!(machine.status(), SessionStatus::Idle);
        assert!(machine.request_connect().is_ok());
    }

    #[test]
    fn test_disconnect() {
        let mut machine = connected("abc");
        assert!(machine.speech_started());

        let id = machine.request_disconnect().unwrap();
        assert_eq!(id.as_ref().map(|id| id.as_str()), Some("abc"));
        assert_eq!(machine.status(), SessionStatus::Disconnecting);
        assert_eq!(machine.status().display(), DisplayStatus::Disconnected);
        assert!(!machine.is_speaking());
        assert_eq!(machine.conversation_id(), None);

        assert!(matches!(
            machine.request_disconnect(),
            Err(TransitionError::NotAllowed { trigger: "disconnect", .. })
        ));
        assert!(machine.finish_disconnect());
        assert_eq!(machine.status(), SessionStatus::Idle);
        assert!(!machine.finish_disconnect());
    }

    #[test]
    fn test_disconnect_from_idle_is_rejected() {
        let mut machine = SessionMachine::default();
        assert_eq!(
            machine.request_disconnect(),
            Err(TransitionError::NotAllowed {
                trigger: "disconnect",
                status: SessionStatus::Idle,
            })
        );
    }

    #[test]
    fn test_speaking_only_while_connected() {
        let mut machine = SessionMachine::default();
        assert!(!machine.speech_started());
        assert!(!machine.is_speaking());

        let mut machine = connected("abc");
        assert!(machine.speech_started());
        assert!(!machine.speech_started());
        assert!(machine.is_speaking());
        assert!(machine.speech_stopped());
        assert!(!machine.is_speaking());

        machine.speech_started();
        assert_eq!(machine.link_lost().map(|id| id.to_string()), Some("abc".into()));
        assert!(!machine.is_speaking());
        assert!(!machine.speech_started());
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut machine = SessionMachine::default();
        assert_eq!(machine.volume(), Volume::MAX);
        assert_eq!(machine.set_volume(1.7).get(), 1.0);
        assert_eq!(machine.set_volume(-0.3).get(), 0.0);
        assert_eq!(machine.set_volume(0.25).get(), 0.25);
        assert_eq!(machine.set_volume(f32::NAN), Volume::MIN);

        // Volume survives session boundaries.
        machine.set_volume(0.4);
        let ticket = machine.request_connect().unwrap();
        machine.handshake_succeeded(ticket, "abc".into()).unwrap();
        machine.link_lost();
        assert_eq!(machine.volume().get(), 0.4);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(SessionStatus::Idle.display().label(), "Disconnected");
        assert_eq!(SessionStatus::Connecting.display().label(), "Connecting...");
        assert_eq!(SessionStatus::Connected.display().label(), "Connected");
        assert_eq!(
            DisplayStatus::Connected.activity_label(true),
            Some("Speaking")
        );
        assert_eq!(
            DisplayStatus::Connected.activity_label(false),
            Some("Listening")
        );
        assert_eq!(DisplayStatus::Disconnected.activity_label(true), None);
    }
}
