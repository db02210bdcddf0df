use thiserror::Error;

/// A type of error which can be returned whenever messages are sent to
/// an actor that has terminated, or when an actor terminates before it
/// replies to a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
#[error("the actor is no longer running")]
pub struct ActorDeadError;
