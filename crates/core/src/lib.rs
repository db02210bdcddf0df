//! The session core of the voice travel assistant: transcript log,
//! session state machine, trip data reconciler and the orchestrator that
//! ties them to the voice link and the backend.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod backend_client;
mod config;
mod error;
mod orchestrator;
mod poller;
pub mod reconciler;
pub mod session;
pub mod transcript;
pub mod view;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use error::{BackendFailure, SessionError};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use reconciler::{
    DisplaySelection, PollOutcome, PollTag, Selection, SelectionSource,
    TripCard, TripReconciler,
};
pub use session::{
    DisplayStatus, SessionMachine, SessionStatus, TransitionError, Volume,
};
pub use transcript::TranscriptLog;
pub use view::{EMPTY_TRANSCRIPT_PLACEHOLDER, SessionView, ViewModel};
