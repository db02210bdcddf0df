//! A voice link that runs in the terminal.
//!
//! Lines typed by the user stand in for recognized speech, and whatever the
//! session asks the link to say is forwarded to the host as
//! [`LinkOutput`]. Lines holding a JSON object are relayed verbatim as
//! agent message payloads, which makes it possible to play the assistant's
//! part by hand.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use voyagr_model::{
    LinkHandle, SessionVars, VoiceEventHandler, VoiceLink, VoiceLinkError,
};

/// Something the link was asked to play.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkOutput {
    /// Text to vocalize.
    Speak(String),
    /// Ongoing output was interrupted.
    Silence,
    /// The output volume changed.
    Volume(f32),
}

struct Inner {
    handler: Option<(LinkHandle, Arc<dyn VoiceEventHandler>)>,
    issued: u64,
    agent_id: Option<String>,
    output_tx: mpsc::UnboundedSender<LinkOutput>,
}

/// The terminal voice link. Cloning it yields another handle to the same
/// link.
#[derive(Clone)]
pub struct ConsoleVoiceLink {
    inner: Arc<Mutex<Inner>>,
}

impl ConsoleVoiceLink {
    /// Creates a link and the receiver of everything it plays.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LinkOutput>) {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let link = Self {
            inner: Arc::new(Mutex::new(Inner {
                handler: None,
                issued: 0,
                agent_id: None,
                output_tx,
            })),
        };
        (link, output_rx)
    }

    /// Feeds one line of input. Returns `false` if no session is attached.
    pub fn feed_line(&self, line: &str) -> bool {
        let Some(handler) = self.handler() else {
            return false;
        };
        let line = line.trim();
        match parse_payload(line) {
            Some(payload) => handler.on_message(payload),
            None => {
                handler.on_user_start_speaking();
                handler.on_message(json!({ "source": "user", "message": line }));
                handler.on_user_stop_speaking();
            }
        }
        true
    }

    /// Simulates the remote agent ending the call.
    pub fn hang_up(&self) -> bool {
        let handler = self.lock().handler.take();
        match handler {
            Some((_, handler)) => {
                handler.on_disconnect();
                true
            }
            None => false,
        }
    }

    /// Returns the agent the link is connected to.
    pub fn agent_id(&self) -> Option<String> {
        self.lock().agent_id.clone()
    }

    fn handler(&self) -> Option<Arc<dyn VoiceEventHandler>> {
        let inner = self.lock();
        inner.handler.as_ref().map(|(_, handler)| Arc::clone(handler))
    }

    fn emit(&self, output: LinkOutput) {
        self.lock().output_tx.send(output).ok();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_payload(line: &str) -> Option<Value> {
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str::<Value>(line)
        .ok()
        .filter(Value::is_object)
}

#[async_trait]
impl VoiceLink for ConsoleVoiceLink {
    async fn connect(
        &self,
        agent_id: &str,
        vars: SessionVars,
        events: Box<dyn VoiceEventHandler>,
    ) -> Result<LinkHandle, VoiceLinkError> {
        if vars.conversation_id.is_none() {
            return Err(VoiceLinkError::new("missing conversation id"));
        }
        let handler: Arc<dyn VoiceEventHandler> = Arc::from(events);
        let handle = {
            let mut inner = self.lock();
            inner.issued += 1;
            let handle = LinkHandle::new(inner.issued);
            inner.handler = Some((handle, Arc::clone(&handler)));
            inner.agent_id = Some(agent_id.to_owned());
            handle
        };
        debug!("console {handle} attached to agent {agent_id}");
        // Nothing to dial, the terminal is always there.
        handler.on_connect();
        Ok(handle)
    }

    async fn disconnect(&self, handle: LinkHandle) -> Result<(), VoiceLinkError> {
        let mut inner = self.lock();
        if inner.handler.as_ref().is_some_and(|(open, _)| *open == handle) {
            inner.handler = None;
            inner.agent_id = None;
        }
        Ok(())
    }

    fn set_volume(&self, volume: f32) {
        self.emit(LinkOutput::Volume(volume));
    }

    fn start_speaking(&self, text: &str) {
        self.emit(LinkOutput::Speak(text.to_owned()));
        if let Some(handler) = self.handler() {
            handler.on_speech_start();
        }
    }

    fn stop_speaking(&self) {
        self.emit(LinkOutput::Silence);
    }
}
