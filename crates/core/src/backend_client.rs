use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tracing::Instrument;
use voyagr_model::{
    Backend, BackendError, ConversationId, TranscriptEntry, TripSnapshot,
};

use crate::error::BackendFailure;

type BackendFuture<T> =
    Pin<Box<dyn Future<Output = Result<T, BackendFailure>> + Send>>;

/// Object-safe mirror of [`Backend`].
trait ErasedBackend: Send + Sync {
    fn open_conversation(&self) -> BackendFuture<ConversationId>;

    fn get_conversation(&self, id: &ConversationId) -> BackendFuture<TripSnapshot>;

    fn upload_transcript(
        &self,
        id: &ConversationId,
        transcript: &[TranscriptEntry],
    ) -> BackendFuture<()>;
}

impl<B: Backend + 'static> ErasedBackend for B {
    fn open_conversation(&self) -> BackendFuture<ConversationId> {
        let fut = Backend::open_conversation(self);
        Box::pin(
            async move { fut.await.map_err(into_failure) }
                .instrument(trace_span!("backend req", op = "open_conversation")),
        )
    }

    fn get_conversation(&self, id: &ConversationId) -> BackendFuture<TripSnapshot> {
        let fut = Backend::get_conversation(self, id);
        Box::pin(
            async move { fut.await.map_err(into_failure) }
                .instrument(trace_span!("backend req", op = "get_conversation", %id)),
        )
    }

    fn upload_transcript(
        &self,
        id: &ConversationId,
        transcript: &[TranscriptEntry],
    ) -> BackendFuture<()> {
        let fut = Backend::upload_transcript(self, id, transcript);
        Box::pin(
            async move { fut.await.map_err(into_failure) }
                .instrument(trace_span!("backend req", op = "upload_transcript", %id)),
        )
    }
}

fn into_failure<E: BackendError>(err: E) -> BackendFailure {
    trace!("backend call failed: {err:?}");
    BackendFailure {
        kind: err.kind(),
        message: err.to_string(),
    }
}

/// A wrapper around a backend that provides a type-erased interface for
/// the other modules.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<dyn ErasedBackend>,
}

impl BackendClient {
    #[inline]
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self {
            inner: Arc::new(backend),
        }
    }

    #[inline]
    pub fn open_conversation(&self) -> BackendFuture<ConversationId> {
        self.inner.open_conversation()
    }

    #[inline]
    pub fn get_conversation(&self, id: &ConversationId) -> BackendFuture<TripSnapshot> {
        self.inner.get_conversation(id)
    }

    #[inline]
    pub fn upload_transcript(
        &self,
        id: &ConversationId,
        transcript: &[TranscriptEntry],
    ) -> BackendFuture<()> {
        self.inner.upload_transcript(id, transcript)
    }

    /// Uploads the transcript, retrying transient failures with
    /// exponential backoff until `max_elapsed` has passed.
    ///
    /// The elapsed time is measured with the system clock, so callers
    /// should still bound the returned future with a timeout.
    pub async fn upload_transcript_with_retry(
        &self,
        id: &ConversationId,
        transcript: &[TranscriptEntry],
        max_elapsed: Duration,
    ) -> Result<(), BackendFailure> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(Some(max_elapsed))
            .build();
        backoff::future::retry(policy, || {
            let fut = self.upload_transcript(id, transcript);
            async move {
                fut.await.map_err(|failure| {
                    if failure.kind.is_transient() {
                        debug!("retrying transcript upload: {failure}");
                        backoff::Error::transient(failure)
                    } else {
                        backoff::Error::permanent(failure)
                    }
                })
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use voyagr_model::{ErrorKind, Role};
    use voyagr_test_backend::{FailureKind, PresetHandshake, PresetUpload, ScriptedBackend};

    use super::*;

    #[tokio::test]
    async fn test_errors_are_erased() {
        let backend = ScriptedBackend::default();
        backend.push_handshake(PresetHandshake::accept("abc"));
        backend.push_handshake(PresetHandshake::Reject(FailureKind::ServerStatus));
        let client = BackendClient::new(backend);

        let id = client.open_conversation().await.unwrap();
        assert_eq!(id.as_str(), "abc");

        let failure = client.open_conversation().await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::ServerStatus);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_upload_failure_is_not_retried() {
        let backend = ScriptedBackend::default();
        backend.set_upload(PresetUpload::Reject(FailureKind::ClientStatus));
        let client = BackendClient::new(backend.clone());

        let id = ConversationId::new("abc");
        let transcript = [TranscriptEntry {
            role: Role::User,
            content: "hi".to_owned(),
            sequence: 0,
        }];
        let failure = client
            .upload_transcript_with_retry(&id, &transcript, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::ClientStatus);
        assert_eq!(backend.uploads().len(), 1);
    }
}
