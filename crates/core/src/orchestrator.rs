mod builder;
mod relay;
mod state;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::watch;
use voyagr_actor::Actor;
use voyagr_model::{ConversationId, LinkHandle, VoiceLink};

pub use builder::OrchestratorBuilder;
use state::{Connect, Disconnect, SetVolume};

use crate::backend_client::BackendClient;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::poller::Poller;
use crate::reconciler::TripReconciler;
use crate::session::SessionMachine;
use crate::transcript::TranscriptLog;
use crate::view::{SessionView, ViewModel};

type ErrorCallback = Box<dyn Fn(&SessionError) + Send + Sync>;

/// State owned by the orchestrator actor. Every mutation of the session
/// happens while handling one of its messages.
pub(crate) struct SessionState {
    config: SessionConfig,
    client: BackendClient,
    link: Arc<dyn VoiceLink>,
    /// The connection opened for the current session, once `connect`
    /// returned it.
    connection: Option<LinkHandle>,
    machine: SessionMachine,
    transcript: TranscriptLog,
    reconciler: TripReconciler,
    poller: Option<Poller>,
    /// Bumped whenever a voice link is opened or abandoned; events carry
    /// the epoch of the link that emitted them.
    link_epoch: u64,
    view_tx: watch::Sender<ViewModel>,
    on_error: Option<ErrorCallback>,
}

/// The session orchestrator.
///
/// It wires voice link events into the transcript and the state machine,
/// binds trip data polling to the conversation's lifetime, and publishes a
/// read-only [`ViewModel`]. All state lives on a single actor task; this
/// handle only sends messages to it, so it can be cloned freely.
///
/// The actor stops once every handle has been dropped.
#[derive(Clone)]
pub struct Orchestrator {
    actor: Actor<SessionState>,
    view_rx: watch::Receiver<ViewModel>,
}

impl Orchestrator {
    /// Starts a new session: performs the handshake, then opens the voice
    /// link with the minted conversation id.
    ///
    /// Resolves once the voice link accepted the connect request; the
    /// status becomes connected when the link confirms it.
    pub async fn connect(&self) -> Result<ConversationId, SessionError> {
        self.actor.ask(Connect).await?
    }

    /// Ends the session. Always reaches idle; the final transcript upload
    /// continues in the background and its failure is only reported.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.actor.ask(Disconnect).await?
    }

    /// Sets the playback volume, clamped to `[0.0, 1.0]`.
    pub fn set_volume(&self, value: f32) -> Result<(), SessionError> {
        self.actor.send(SetVolume(value))?;
        Ok(())
    }

    /// Subscribes to the view-model.
    #[inline]
    pub fn view(&self) -> SessionView {
        SessionView::new(self.view_rx.clone())
    }

    /// Stops the orchestrator without finalizing the session.
    #[inline]
    pub fn shutdown(&self) {
        self.actor.try_kill();
    }

    /// Returns whether the orchestrator has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.actor.is_dead()
    }
}

impl Orchestrator {
    fn spawn_from_builder(builder: OrchestratorBuilder) -> Self {
        let OrchestratorBuilder {
            config,
            client,
            link,
            on_error,
        } = builder;

        let (view_tx, view_rx) = watch::channel(ViewModel::default());
        let state = SessionState {
            config,
            client,
            link,
            connection: None,
            machine: Default::default(),
            transcript: Default::default(),
            reconciler: Default::default(),
            poller: None,
            link_epoch: 0,
            view_tx,
            on_error,
        };
        state.publish();
        let actor = Actor::spawn(state, Some("session"));
        Self { actor, view_rx }
    }
}
