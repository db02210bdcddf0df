//! A [`Backend`] talking to the Voyagr HTTP API.
//!
//! Endpoints:
//!
//! - `POST /open-conversation` → `{ "conversation_id": "..." }`
//! - `GET /get-conversation?conversation_id=ID` → trip snapshot
//! - `POST /transcript` with `{ "conversation_id", "transcript" }`

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::Instrument;
use voyagr_model::{
    Backend, BackendError, ConversationId, ErrorKind, TranscriptEntry,
    TripSnapshot,
};

pub use config::{HttpBackendConfig, HttpBackendConfigBuilder};
use proto::{OpenConversationResponse, TranscriptUpload};

/// Error type for [`HttpBackend`].
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if let Some(status) = err.status() {
            status_kind(status)
        } else if err.is_decode() {
            ErrorKind::Malformed
        } else if err.is_connect() || err.is_timeout() || err.is_request() {
            ErrorKind::Transport
        } else {
            ErrorKind::Other
        };
        Self::new(format!("{err}"), kind)
    }
}

#[inline]
fn status_kind(status: StatusCode) -> ErrorKind {
    if status.is_server_error() {
        ErrorKind::ServerStatus
    } else if status.is_client_error() {
        ErrorKind::ClientStatus
    } else {
        ErrorKind::Other
    }
}

/// Backend client for the Voyagr HTTP API.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    config: Arc<HttpBackendConfig>,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` with the given configuration.
    pub fn new(config: HttpBackendConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(api_key) => {
                req.header(header::AUTHORIZATION, format!("Bearer {api_key}"))
            }
            None => req,
        }
    }
}

impl Backend for HttpBackend {
    type Error = Error;

    fn open_conversation(
        &self,
    ) -> impl Future<Output = Result<ConversationId, Self::Error>> + Send + 'static
    {
        let resp_fut = self
            .authorize(
                self.client
                    .post(self.config.endpoint("/open-conversation")),
            )
            .header(header::ACCEPT, "application/json")
            .send();

        async move {
            let resp = resp_fut.await?.error_for_status()?;
            let body: OpenConversationResponse = read_json(resp).await?;
            debug!("opened conversation {}", body.conversation_id);
            Ok(body.conversation_id)
        }
        .instrument(debug_span!("backend", op = "open_conversation"))
    }

    fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<TripSnapshot, Self::Error>> + Send + 'static
    {
        let span = debug_span!("backend", op = "get_conversation", conversation_id = %id);
        let url = Url::parse(&self.config.endpoint("/get-conversation")).map(
            |mut url| {
                url.query_pairs_mut()
                    .append_pair("conversation_id", id.as_str());
                url
            },
        );
        let resp_fut = url.map(|url| {
            self.authorize(self.client.get(url))
                .header(header::ACCEPT, "application/json")
                .send()
        });

        async move {
            let resp_fut = resp_fut
                .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
            let resp = resp_fut.await?.error_for_status()?;
            let snapshot: TripSnapshot = read_json(resp).await?;
            trace!(
                flights = snapshot.candidate_flights.len(),
                selected_flights = snapshot.confirmed_flights.len(),
                hotels = snapshot.candidate_hotels.len(),
                selected_hotels = snapshot.confirmed_hotels.len(),
                "got a snapshot"
            );
            Ok(snapshot)
        }
        .instrument(span)
    }

    fn upload_transcript(
        &self,
        id: &ConversationId,
        transcript: &[TranscriptEntry],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let span = debug_span!(
            "backend",
            op = "upload_transcript",
            conversation_id = %id,
            entries = transcript.len()
        );
        let body = TranscriptUpload {
            conversation_id: id,
            transcript,
        };
        let resp_fut = self
            .authorize(self.client.post(self.config.endpoint("/transcript")))
            .json(&body)
            .send();

        async move {
            resp_fut.await?.error_for_status()?;
            Ok(())
        }
        .instrument(span)
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    let is_json = content_type
        .as_deref()
        .and_then(|v| v.parse().ok())
        .map(|m: Mime| {
            m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
        })
        .unwrap_or(true);
    if !is_json {
        return Err(Error::new(
            format!("unexpected content type: {content_type:?}"),
            ErrorKind::Malformed,
        ));
    }

    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Malformed))
}
