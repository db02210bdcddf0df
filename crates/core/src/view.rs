//! The read-only view-model handed to presentation.

use std::sync::Arc;

use tokio::sync::watch;
use voyagr_model::{ConversationId, TranscriptEntry};

use crate::reconciler::DisplaySelection;
use crate::session::{DisplayStatus, SessionStatus, Volume};

/// Placeholder shown while the transcript is empty.
pub const EMPTY_TRANSCRIPT_PLACEHOLDER: &str =
    "Your conversation will appear here";

/// A consistent snapshot of everything presentation needs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewModel {
    pub(crate) transcript: Arc<[TranscriptEntry]>,
    pub(crate) status: SessionStatus,
    pub(crate) is_speaking: bool,
    pub(crate) volume: Volume,
    pub(crate) conversation_id: Option<ConversationId>,
    pub(crate) selection: DisplaySelection,
}

impl ViewModel {
    /// The transcript in insertion order.
    #[inline]
    pub fn transcript_snapshot(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// The status as presentation shows it.
    #[inline]
    pub fn session_status(&self) -> DisplayStatus {
        self.status.display()
    }

    /// The internal lifecycle status, for diagnostics.
    #[inline]
    pub fn lifecycle_status(&self) -> SessionStatus {
        self.status
    }

    /// Whether the assistant is speaking.
    #[inline]
    pub fn is_speaking(&self) -> bool {
        self.is_speaking
    }

    /// The retained playback volume.
    #[inline]
    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    /// The active conversation, if any.
    #[inline]
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    /// The trip entities to display.
    #[inline]
    pub fn display_selection(&self) -> &DisplaySelection {
        &self.selection
    }
}

/// A subscription to the orchestrator's view-model.
#[derive(Clone, Debug)]
pub struct SessionView {
    rx: watch::Receiver<ViewModel>,
}

impl SessionView {
    #[inline]
    pub(crate) fn new(rx: watch::Receiver<ViewModel>) -> Self {
        Self { rx }
    }

    /// Returns the latest view-model.
    #[inline]
    pub fn current(&self) -> ViewModel {
        self.rx.borrow().clone()
    }

    /// Waits until the view-model changes and returns it. Returns `None`
    /// once the orchestrator has shut down.
    pub async fn changed(&mut self) -> Option<ViewModel> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Waits until the view-model satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&ViewModel) -> bool,
    ) -> Option<ViewModel> {
        self.rx
            .wait_for(|view| predicate(view))
            .await
            .ok()
            .map(|view| view.clone())
    }
}
