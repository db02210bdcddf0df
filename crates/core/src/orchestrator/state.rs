use std::sync::Arc;

use serde_json::Value;
use tokio::time::timeout;
use voyagr_actor::{Actor, Message, Reply};
use voyagr_model::{
    AgentMessage, ConversationId, LinkHandle, Role, SessionVars, TripSnapshot,
    VoiceLinkError,
};

use super::SessionState;
use super::relay::EventRelay;
use crate::error::{BackendFailure, SessionError};
use crate::poller::Poller;
use crate::reconciler::{PollOutcome, PollTag};
use crate::session::{ConnectTicket, SessionStatus, TransitionError};
use crate::view::ViewModel;

type Handle = Actor<SessionState>;

impl SessionState {
    /// Pushes a fresh view-model to subscribers if anything changed.
    pub(super) fn publish(&self) {
        let transcript = self.transcript.snapshot();
        let selection = self.reconciler.selection();
        self.view_tx.send_if_modified(|view| {
            let mut modified = false;
            if !Arc::ptr_eq(&view.transcript, &transcript) {
                view.transcript = transcript;
                modified = true;
            }
            modified |= replace(&mut view.status, self.machine.status());
            modified |= replace(&mut view.is_speaking, self.machine.is_speaking());
            modified |= replace(&mut view.volume, self.machine.volume());
            if view.conversation_id.as_ref() != self.machine.conversation_id() {
                view.conversation_id = self.machine.conversation_id().cloned();
                modified = true;
            }
            if view.selection != *selection {
                view.selection = selection.clone();
                modified = true;
            }
            modified
        });
    }

    fn report(&self, err: &SessionError) {
        if err.is_user_visible() {
            error!("{err}");
        } else {
            warn!("{err}");
        }
        if let Some(on_error) = &self.on_error {
            on_error(err);
        }
    }

    #[inline]
    fn link_is_open(&self) -> bool {
        matches!(
            self.machine.status(),
            SessionStatus::Connecting | SessionStatus::Connected
        )
    }

    fn start_polling(&mut self, conversation_id: ConversationId, handle: &Handle) {
        let tag = self.reconciler.activate(conversation_id);
        let actor = handle.downgrade();
        self.poller = Some(Poller::spawn(
            self.client.clone(),
            tag,
            self.config.poll_interval,
            move |tag, result| actor.send(PollFinished { tag, result }).is_ok(),
        ));
    }

    fn stop_polling(&mut self) {
        self.poller = None;
        if let Some(tag) = self.reconciler.deactivate() {
            debug!("stopped tracking trip data of {tag}");
        }
    }

    /// Tears down everything bound to the conversation and uploads its
    /// transcript in the background.
    fn finalize(&mut self, conversation_id: Option<ConversationId>, handle: &Handle) {
        // Events from the link being closed must not reach the next one.
        self.link_epoch += 1;
        self.stop_polling();

        let Some(conversation_id) = conversation_id else {
            return;
        };
        let transcript = self.transcript.snapshot();
        let client = self.client.clone();
        let limit = self.config.upload_timeout;
        let actor = handle.downgrade();
        tokio::spawn(async move {
            let upload =
                client.upload_transcript_with_retry(&conversation_id, &transcript, limit);
            let reason = match timeout(limit, upload).await {
                Ok(Ok(())) => {
                    debug!(
                        "uploaded {} transcript entries for {conversation_id}",
                        transcript.len()
                    );
                    return;
                }
                Ok(Err(failure)) => failure.to_string(),
                Err(_) => format!("no response within {limit:?}"),
            };
            let err = SessionError::UploadFailed {
                conversation_id,
                reason,
            };
            if let Err(send_err) = actor.send(UploadFailed(err.clone())) {
                warn!("{err} ({send_err})");
            }
        });
    }

    fn on_agent_message(&mut self, payload: Value) {
        if !self.link_is_open() {
            debug!("dropping agent message while {}", self.machine.status());
            return;
        }
        let AgentMessage { role, body } =
            AgentMessage::decode(payload, self.config.classify_api_debug);
        if role == Role::Assistant && self.machine.status() == SessionStatus::Connected {
            if let Some(text) = body.as_text() {
                self.link.start_speaking(text);
            }
        }
        let entry = self.transcript.append(role, body);
        trace!("appended {} entry #{}", entry.role, entry.sequence);
    }
}

#[inline]
fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[derive(Debug)]
pub struct Connect(pub Reply<Result<ConversationId, SessionError>>);

impl Message<SessionState> for Connect {
    fn handle(self, state: &mut SessionState, handle: &Handle) {
        let ticket = match state.machine.request_connect() {
            Ok(ticket) => ticket,
            Err(err) => {
                self.0.send(Err(err.into()));
                return;
            }
        };
        debug!("connect attempt {}", ticket.attempt());

        // A new connect request starts from a clean slate.
        state.transcript.reset();
        state.stop_polling();
        state.publish();

        let handshake = state.client.open_conversation();
        let handle = handle.clone();
        let reply = self.0;
        tokio::spawn(async move {
            let result = handshake.await;
            handle
                .send(HandshakeFinished {
                    ticket,
                    result,
                    reply,
                })
                .ok();
        });
    }
}

#[derive(Debug)]
struct HandshakeFinished {
    ticket: ConnectTicket,
    result: Result<ConversationId, BackendFailure>,
    reply: Reply<Result<ConversationId, SessionError>>,
}

impl Message<SessionState> for HandshakeFinished {
    fn handle(self, state: &mut SessionState, handle: &Handle) {
        let Self {
            ticket,
            result,
            reply,
        } = self;
        let conversation_id = match result {
            Ok(conversation_id) => conversation_id,
            Err(failure) => {
                state.machine.handshake_failed(ticket).ok();
                let err = SessionError::HandshakeFailed(failure);
                state.report(&err);
                state.publish();
                reply.send(Err(err));
                return;
            }
        };
        if let Err(err) = state
            .machine
            .handshake_succeeded(ticket, conversation_id.clone())
        {
            reply.send(Err(err.into()));
            return;
        }
        info!("opened conversation {conversation_id}");

        state.start_polling(conversation_id.clone(), handle);
        state.link_epoch += 1;
        let epoch = state.link_epoch;
        state.publish();

        let relay = EventRelay::new(epoch, handle.downgrade());
        let link = Arc::clone(&state.link);
        let agent_id = state.config.agent_id.clone();
        let vars = SessionVars::for_conversation(conversation_id.clone());
        let handle = handle.clone();
        tokio::spawn(async move {
            let result = link.connect(&agent_id, vars, Box::new(relay)).await;
            handle
                .send(LinkOpened {
                    ticket,
                    epoch,
                    conversation_id,
                    result,
                    reply,
                })
                .ok();
        });
    }
}

#[derive(Debug)]
struct LinkOpened {
    ticket: ConnectTicket,
    epoch: u64,
    conversation_id: ConversationId,
    result: Result<LinkHandle, VoiceLinkError>,
    reply: Reply<Result<ConversationId, SessionError>>,
}

impl Message<SessionState> for LinkOpened {
    fn handle(self, state: &mut SessionState, _handle: &Handle) {
        if self.epoch != state.link_epoch {
            // The session ended while the link was opening. Only the
            // connection opened for it is closed; a newer one may be live.
            if let Ok(connection) = self.result {
                debug!("closing abandoned {connection}");
                let link = Arc::clone(&state.link);
                tokio::spawn(async move {
                    link.disconnect(connection).await.ok();
                });
            }
            let err = TransitionError::StaleAttempt(self.ticket.attempt());
            self.reply.send(Err(err.into()));
            return;
        }

        match self.result {
            Ok(connection) => {
                trace!("voice link opened {connection}");
                state.connection = Some(connection);
                state.link.set_volume(state.machine.volume().get());
                self.reply.send(Ok(self.conversation_id));
            }
            Err(link_err) => {
                state.machine.link_lost();
                state.link_epoch += 1;
                state.stop_polling();
                let err = SessionError::VoiceLink(link_err.message().to_owned());
                state.report(&err);
                state.publish();
                self.reply.send(Err(err));
            }
        }
    }
}

#[derive(Debug)]
pub struct Disconnect(pub Reply<Result<(), SessionError>>);

impl Message<SessionState> for Disconnect {
    fn handle(self, state: &mut SessionState, handle: &Handle) {
        let conversation_id = match state.machine.request_disconnect() {
            Ok(conversation_id) => conversation_id,
            Err(err) => {
                self.0.send(Err(err.into()));
                return;
            }
        };
        info!("disconnecting");
        state.finalize(conversation_id, handle);
        state.publish();

        let Some(connection) = state.connection.take() else {
            // The link has not opened yet; it is closed once it does.
            state.machine.finish_disconnect();
            state.publish();
            self.0.send(Ok(()));
            return;
        };
        let link = Arc::clone(&state.link);
        let limit = state.config.upload_timeout;
        let handle = handle.clone();
        let reply = self.0;
        tokio::spawn(async move {
            let result = match timeout(limit, link.disconnect(connection)).await {
                Ok(result) => result.map_err(|err| err.message().to_owned()),
                Err(_) => Err(format!("voice link did not close within {limit:?}")),
            };
            handle.send(LinkClosed { result, reply }).ok();
        });
    }
}

#[derive(Debug)]
struct LinkClosed {
    result: Result<(), String>,
    reply: Reply<Result<(), SessionError>>,
}

impl Message<SessionState> for LinkClosed {
    fn handle(self, state: &mut SessionState, _handle: &Handle) {
        if let Err(message) = self.result {
            state.report(&SessionError::VoiceLink(message));
        }
        state.machine.finish_disconnect();
        state.publish();
        self.reply.send(Ok(()));
    }
}

#[derive(Debug)]
pub struct SetVolume(pub f32);

impl Message<SessionState> for SetVolume {
    fn handle(self, state: &mut SessionState, _handle: &Handle) {
        let volume = state.machine.set_volume(self.0);
        if state.link_is_open() {
            state.link.set_volume(volume.get());
        }
        state.publish();
    }
}

#[derive(Debug)]
struct PollFinished {
    tag: PollTag,
    result: Result<TripSnapshot, BackendFailure>,
}

impl Message<SessionState> for PollFinished {
    fn handle(self, state: &mut SessionState, _handle: &Handle) {
        let failure = self.result.as_ref().err().cloned();
        match state.reconciler.apply(&self.tag, self.result) {
            PollOutcome::Applied => {
                trace!("applied trip snapshot for {}", self.tag);
                state.publish();
            }
            PollOutcome::Failed => {
                if let Some(failure) = failure {
                    state.report(&SessionError::PollFailed {
                        conversation_id: self.tag.conversation_id().clone(),
                        failure,
                    });
                }
            }
            PollOutcome::Stale => {
                debug!("discarding stale poll for {}", self.tag);
            }
        }
    }
}

#[derive(Debug)]
struct UploadFailed(SessionError);

impl Message<SessionState> for UploadFailed {
    #[inline]
    fn handle(self, state: &mut SessionState, _handle: &Handle) {
        state.report(&self.0);
    }
}

#[derive(Debug)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    Error(String),
    Message(Value),
    SpeechStart,
    UserStartSpeaking,
    UserStopSpeaking,
}

#[derive(Debug)]
pub struct VoiceEvent {
    pub epoch: u64,
    pub event: LinkEvent,
}

impl Message<SessionState> for VoiceEvent {
    fn handle(self, state: &mut SessionState, handle: &Handle) {
        if self.epoch != state.link_epoch {
            debug!(
                "ignoring {:?} from link epoch {} (current {})",
                self.event, self.epoch, state.link_epoch
            );
            return;
        }

        match self.event {
            LinkEvent::Connected => {
                if state.machine.link_connected() {
                    info!("voice link connected");
                    state.transcript.reset();
                }
            }
            LinkEvent::Disconnected => {
                if let Ok(conversation_id) = state.machine.request_disconnect() {
                    info!("voice link closed by the remote side");
                    state.connection = None;
                    state.finalize(conversation_id, handle);
                    state.machine.finish_disconnect();
                }
            }
            LinkEvent::Error(message) => {
                state.report(&SessionError::VoiceLink(message));
            }
            LinkEvent::Message(payload) => state.on_agent_message(payload),
            LinkEvent::SpeechStart => {
                state.machine.speech_started();
            }
            LinkEvent::UserStartSpeaking => {
                if state.machine.is_speaking() {
                    debug!("barge-in, stopping assistant output");
                    state.link.stop_speaking();
                    state.machine.speech_stopped();
                }
            }
            LinkEvent::UserStopSpeaking => {
                trace!("user stopped speaking");
            }
        }
        state.publish();
    }
}
