use serde_json::Value;
use voyagr_actor::WeakActor;
use voyagr_model::VoiceEventHandler;

use super::SessionState;
use super::state::{LinkEvent, VoiceEvent};

/// Forwards voice link callbacks into the orchestrator's mailbox, tagged
/// with the epoch of the link they were registered for.
pub(crate) struct EventRelay {
    epoch: u64,
    actor: WeakActor<SessionState>,
}

impl EventRelay {
    #[inline]
    pub fn new(epoch: u64, actor: WeakActor<SessionState>) -> Self {
        Self { epoch, actor }
    }

    fn relay(&self, event: LinkEvent) {
        let msg = VoiceEvent {
            epoch: self.epoch,
            event,
        };
        if self.actor.send(msg).is_err() {
            trace!("session is gone, dropping voice event");
        }
    }
}

impl VoiceEventHandler for EventRelay {
    fn on_connect(&self) {
        self.relay(LinkEvent::Connected);
    }

    fn on_disconnect(&self) {
        self.relay(LinkEvent::Disconnected);
    }

    fn on_error(&self, message: &str) {
        self.relay(LinkEvent::Error(message.to_owned()));
    }

    fn on_message(&self, payload: Value) {
        self.relay(LinkEvent::Message(payload));
    }

    fn on_speech_start(&self) {
        self.relay(LinkEvent::SpeechStart);
    }

    fn on_user_start_speaking(&self) {
        self.relay(LinkEvent::UserStartSpeaking);
    }

    fn on_user_stop_speaking(&self) {
        self.relay(LinkEvent::UserStopSpeaking);
    }
}
