//! Scripted doubles of the backend and the voice link for testing purpose.

mod preset;
mod voice;

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::pending;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::sleep;
use voyagr_model::{
    Backend, BackendError, ConversationId, ErrorKind, TranscriptEntry,
    TripSnapshot,
};

pub use preset::*;
pub use voice::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: impl Into<ErrorKind>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A transcript upload the backend received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRecord {
    pub conversation_id: ConversationId,
    pub transcript: Vec<TranscriptEntry>,
}

#[derive(Default)]
struct PollQueue {
    steps: VecDeque<PollStep>,
    last: Option<PresetPoll>,
    served: usize,
}

#[derive(Default)]
struct Script {
    handshakes: VecDeque<PresetHandshake>,
    handshakes_served: usize,
    polls: HashMap<ConversationId, PollQueue>,
    upload: PresetUpload,
    uploads: Vec<UploadRecord>,
}

/// A local fake backend for testing purpose.
///
/// Handshakes are answered in the order they were pushed. Polls are
/// scripted per conversation; once a conversation's script runs out, its
/// last answer is repeated without delay, and a conversation without any
/// script fails every poll.
///
/// # Note
///
/// This type is not optimized for production use, every call takes a lock
/// and clones the scripted data. You should only use it for testing.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    #[inline]
    pub fn push_handshake(&self, preset: PresetHandshake) {
        self.lock().handshakes.push_back(preset);
    }

    #[inline]
    pub fn push_poll(&self, id: impl Into<ConversationId>, preset: PresetPoll) {
        self.push_poll_step(id, PollStep { preset, delay_ms: 0 });
    }

    #[inline]
    pub fn push_delayed_poll(
        &self,
        id: impl Into<ConversationId>,
        preset: PresetPoll,
        delay: Duration,
    ) {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.push_poll_step(id, PollStep { preset, delay_ms });
    }

    pub fn push_poll_step(&self, id: impl Into<ConversationId>, step: PollStep) {
        self.lock()
            .polls
            .entry(id.into())
            .or_default()
            .steps
            .push_back(step);
    }

    #[inline]
    pub fn set_upload(&self, preset: PresetUpload) {
        self.lock().upload = preset;
    }

    /// Returns how many handshakes have been answered.
    pub fn handshakes_served(&self) -> usize {
        self.lock().handshakes_served
    }

    /// Returns how many polls have been issued for a conversation.
    pub fn polls_served(&self, id: &ConversationId) -> usize {
        self.lock().polls.get(id).map_or(0, |queue| queue.served)
    }

    /// Returns the uploads received so far, including rejected ones.
    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.lock().uploads.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Backend for ScriptedBackend {
    type Error = crate::Error;

    fn open_conversation(
        &self,
    ) -> impl Future<Output = Result<ConversationId, Self::Error>> + Send + 'static
    {
        let result = {
            let mut script = self.lock();
            script.handshakes_served += 1;
            match script.handshakes.pop_front() {
                Some(PresetHandshake::Accept(id)) => Ok(id),
                Some(PresetHandshake::Reject(kind)) => {
                    Err(Error::new("handshake rejected", kind))
                }
                None => Err(Error::new("no handshake preset", ErrorKind::Other)),
            }
        };
        async move { result }
    }

    fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<TripSnapshot, Self::Error>> + Send + 'static
    {
        let (preset, delay) = {
            let mut script = self.lock();
            let queue = script.polls.entry(id.clone()).or_default();
            queue.served += 1;
            match queue.steps.pop_front() {
                Some(step) => {
                    queue.last = Some(step.preset.clone());
                    (Some(step.preset), Duration::from_millis(step.delay_ms))
                }
                None => (queue.last.clone(), Duration::ZERO),
            }
        };
        async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            match preset {
                Some(PresetPoll::Snapshot(snapshot)) => Ok(snapshot),
                Some(PresetPoll::Failure(kind)) => {
                    Err(Error::new("poll failed", kind))
                }
                None => Err(Error::new("no poll preset", ErrorKind::ClientStatus)),
            }
        }
    }

    fn upload_transcript(
        &self,
        id: &ConversationId,
        transcript: &[TranscriptEntry],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let preset = {
            let mut script = self.lock();
            script.uploads.push(UploadRecord {
                conversation_id: id.clone(),
                transcript: transcript.to_vec(),
            });
            script.upload
        };
        async move {
            match preset {
                PresetUpload::Accept => Ok(()),
                PresetUpload::Reject(kind) => {
                    Err(Error::new("upload rejected", kind))
                }
                PresetUpload::Hang => pending().await,
            }
        }
    }
}

impl Debug for ScriptedBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let script = self.lock();
        f.debug_struct("ScriptedBackend")
            .field("pending_handshakes", &script.handshakes.len())
            .field("conversations", &script.polls.len())
            .field("upload", &script.upload)
            .finish_non_exhaustive()
    }
}
