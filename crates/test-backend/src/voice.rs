use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use voyagr_model::{
    ConversationId, LinkHandle, SessionVars, VoiceEventHandler, VoiceLink,
    VoiceLinkError,
};

/// A command the session core issued to the voice link.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkCommand {
    Connect {
        agent_id: String,
        conversation_id: Option<ConversationId>,
    },
    Disconnect(LinkHandle),
    SetVolume(f32),
    StartSpeaking(String),
    StopSpeaking,
}

#[derive(Default)]
struct LinkState {
    connections: BTreeMap<LinkHandle, Arc<dyn VoiceEventHandler>>,
    issued: u64,
    held: Option<oneshot::Receiver<()>>,
    commands: Vec<LinkCommand>,
    connect_error: Option<String>,
    auto_connect: bool,
}

/// A voice link double that records every command and lets the test emit
/// events on behalf of the voice agent.
///
/// Every `connect` call gets the next handle, starting at 1. Events are
/// delivered to the newest open connection; emitting while none is open is
/// a no-op.
#[derive(Clone, Default)]
pub struct ScriptedVoiceLink {
    state: Arc<Mutex<LinkState>>,
}

impl ScriptedVoiceLink {
    /// Creates a link that confirms every connection right away.
    pub fn auto_connecting() -> Self {
        let link = Self::default();
        link.lock().auto_connect = true;
        link
    }

    /// Makes subsequent `connect` calls fail with the given message.
    pub fn fail_connect_with<S: Into<String>>(&self, message: S) {
        self.lock().connect_error = Some(message.into());
    }

    /// Holds the next `connect` call until the returned sender fires or is
    /// dropped. Its handle is issued right away.
    pub fn hold_next_connect(&self) -> oneshot::Sender<()> {
        let (release_tx, release_rx) = oneshot::channel();
        self.lock().held = Some(release_rx);
        release_tx
    }

    /// Returns every command received so far.
    pub fn commands(&self) -> Vec<LinkCommand> {
        self.lock().commands.clone()
    }

    /// Returns the last volume set on the link.
    pub fn last_volume(&self) -> Option<f32> {
        self.lock().commands.iter().rev().find_map(|cmd| match cmd {
            LinkCommand::SetVolume(volume) => Some(*volume),
            _ => None,
        })
    }

    /// Returns everything the link was asked to vocalize.
    pub fn spoken(&self) -> Vec<String> {
        self.lock()
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                LinkCommand::StartSpeaking(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns whether any connection is open.
    pub fn is_attached(&self) -> bool {
        !self.lock().connections.is_empty()
    }

    /// Returns the open connections, oldest first.
    pub fn open_connections(&self) -> Vec<LinkHandle> {
        self.lock().connections.keys().copied().collect()
    }

    pub fn emit_connect(&self) {
        self.emit(|h| h.on_connect());
    }

    pub fn emit_disconnect(&self) {
        self.emit(|h| h.on_disconnect());
    }

    pub fn emit_error(&self, message: &str) {
        self.emit(|h| h.on_error(message));
    }

    pub fn emit_message(&self, payload: Value) {
        self.emit(move |h| h.on_message(payload));
    }

    pub fn emit_speech_start(&self) {
        self.emit(|h| h.on_speech_start());
    }

    pub fn emit_user_start_speaking(&self) {
        self.emit(|h| h.on_user_start_speaking());
    }

    pub fn emit_user_stop_speaking(&self) {
        self.emit(|h| h.on_user_stop_speaking());
    }

    fn emit(&self, f: impl FnOnce(&dyn VoiceEventHandler)) {
        // Release the lock before calling out, handlers may call back.
        let handler = self
            .lock()
            .connections
            .last_key_value()
            .map(|(_, handler)| Arc::clone(handler));
        if let Some(handler) = handler {
            f(handler.as_ref());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl VoiceLink for ScriptedVoiceLink {
    async fn connect(
        &self,
        agent_id: &str,
        vars: SessionVars,
        events: Box<dyn VoiceEventHandler>,
    ) -> Result<LinkHandle, VoiceLinkError> {
        let (handle, held) = {
            let mut state = self.lock();
            state.commands.push(LinkCommand::Connect {
                agent_id: agent_id.to_owned(),
                conversation_id: vars.conversation_id,
            });
            if let Some(message) = state.connect_error.clone() {
                return Err(VoiceLinkError::new(message));
            }
            state.issued += 1;
            (LinkHandle::new(state.issued), state.held.take())
        };
        if let Some(release_rx) = held {
            release_rx.await.ok();
        }

        let handler: Arc<dyn VoiceEventHandler> = Arc::from(events);
        let auto_connect = {
            let mut state = self.lock();
            state.connections.insert(handle, Arc::clone(&handler));
            state.auto_connect
        };
        if auto_connect {
            handler.on_connect();
        }
        Ok(handle)
    }

    async fn disconnect(&self, handle: LinkHandle) -> Result<(), VoiceLinkError> {
        let mut state = self.lock();
        state.commands.push(LinkCommand::Disconnect(handle));
        state.connections.remove(&handle);
        Ok(())
    }

    fn set_volume(&self, volume: f32) {
        self.lock().commands.push(LinkCommand::SetVolume(volume));
    }

    fn start_speaking(&self, text: &str) {
        self.lock()
            .commands
            .push(LinkCommand::StartSpeaking(text.to_owned()));
    }

    fn stop_speaking(&self) {
        self.lock().commands.push(LinkCommand::StopSpeaking);
    }
}
