//! A lightweight actor runtime.
//!
//! Each actor owns its state exclusively and handles messages one at a
//! time on a single task, so state never needs locking. Background work
//! reports back by sending messages, usually through a [`WeakActor`] so it
//! cannot keep a finished actor alive.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod handle;
mod mailbox;
mod scheduler;

pub use error::ActorDeadError;
pub use handle::{Actor, WeakActor};
pub use mailbox::{Message, Reply};
