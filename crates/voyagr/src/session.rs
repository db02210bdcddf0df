use tokio::sync::mpsc;
use voyagr_core::{
    Orchestrator, OrchestratorBuilder, SessionConfig, SessionError, SessionView,
};
use voyagr_http_backend::{HttpBackend, HttpBackendConfig};
use voyagr_model::{Backend, ConversationId, VoiceLink};

use crate::env::{self, EnvError};

type ErrorCallback = Box<dyn Fn(&SessionError) + Send + Sync>;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    session_config: SessionConfig,
    backend_config: HttpBackendConfig,
    on_error: Option<ErrorCallback>,
}

impl SessionBuilder {
    /// Creates a session builder talking to the HTTP backend described by
    /// `backend_config`.
    #[inline]
    pub fn new(
        session_config: SessionConfig,
        backend_config: HttpBackendConfig,
    ) -> Self {
        Self {
            session_config,
            backend_config,
            on_error: None,
        }
    }

    /// Creates a session builder from the `VOYAGR_*` environment variables.
    pub fn from_env() -> Result<Self, EnvError> {
        let (session_config, backend_config) =
            env::load(|name| std::env::var(name).ok())?;
        Ok(Self::new(session_config, backend_config))
    }

    /// Attaches a callback to be invoked when the session reports an error.
    #[inline]
    pub fn on_error(
        mut self,
        on_error: impl Fn(&SessionError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Builds a new session speaking through `link`. Must be called within
    /// a tokio runtime.
    pub fn build<L: VoiceLink>(
        self,
        link: L,
    ) -> Result<Session, voyagr_http_backend::Error> {
        let backend = HttpBackend::new(self.backend_config)?;
        Ok(Self::assemble(self.session_config, backend, link, self.on_error))
    }

    /// Builds a new session against a custom backend.
    pub fn build_with_backend<B, L>(self, backend: B, link: L) -> Session
    where
        B: Backend + 'static,
        L: VoiceLink,
    {
        Self::assemble(self.session_config, backend, link, self.on_error)
    }

    fn assemble<B, L>(
        config: SessionConfig,
        backend: B,
        link: L,
        on_error: Option<ErrorCallback>,
    ) -> Session
    where
        B: Backend + 'static,
        L: VoiceLink,
    {
        let mut builder = OrchestratorBuilder::new(config, backend, link);
        if let Some(on_error) = on_error {
            builder = builder.on_error(on_error);
        }
        Session {
            orchestrator: builder.build(),
        }
    }
}

/// A voice travel planning session, like the window that shows the
/// conversation next to the trip options.
///
/// It is basically a wrapper around [`Orchestrator`].
#[derive(Clone)]
pub struct Session {
    orchestrator: Orchestrator,
}

impl Session {
    /// Starts a conversation.
    #[inline]
    pub async fn connect(&self) -> Result<ConversationId, SessionError> {
        self.orchestrator.connect().await
    }

    /// Starts a conversation on a background task and returns right away,
    /// so the caller can keep handling input meanwhile. The outcome is sent
    /// to `results`.
    pub fn connect_in_background(
        &self,
        results: mpsc::UnboundedSender<Result<ConversationId, SessionError>>,
    ) {
        let session = self.clone();
        tokio::spawn(async move {
            results.send(session.connect().await).ok();
        });
    }

    /// Ends the conversation.
    #[inline]
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.orchestrator.disconnect().await
    }

    /// Sets the playback volume, clamped to `[0.0, 1.0]`.
    #[inline]
    pub fn set_volume(&self, value: f32) -> Result<(), SessionError> {
        self.orchestrator.set_volume(value)
    }

    /// Subscribes to the view-model.
    #[inline]
    pub fn view(&self) -> SessionView {
        self.orchestrator.view()
    }
}
