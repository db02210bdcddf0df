use std::sync::Arc;

use voyagr_model::{Backend, VoiceLink};

use super::{ErrorCallback, Orchestrator};
use crate::backend_client::BackendClient;
use crate::config::SessionConfig;
use crate::error::SessionError;

/// [`Orchestrator`] builder.
pub struct OrchestratorBuilder {
    pub(crate) config: SessionConfig,
    pub(crate) client: BackendClient,
    pub(crate) link: Arc<dyn VoiceLink>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the collaborators the session talks to.
    #[inline]
    pub fn new<B, L>(config: SessionConfig, backend: B, link: L) -> Self
    where
        B: Backend + 'static,
        L: VoiceLink,
    {
        Self {
            config,
            client: BackendClient::new(backend),
            link: Arc::new(link),
            on_error: None,
        }
    }

    /// Attaches a callback invoked for every error the session reports.
    ///
    /// Use [`SessionError::is_user_visible`] to decide which ones to show.
    #[inline]
    pub fn on_error(
        mut self,
        on_error: impl Fn(&SessionError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Builds the orchestrator. Must be called within a tokio runtime.
    #[inline]
    pub fn build(self) -> Orchestrator {
        Orchestrator::spawn_from_builder(self)
    }
}
