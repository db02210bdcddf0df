//! An out-of-the-box voice travel assistant session that wires the session
//! core to the HTTP trip backend.
//!
//! The crate includes a CLI tool for trying it in the terminal. And you can
//! also use it as a library to bring the session into your own host apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod console;
mod env;
pub mod render;
mod session;

pub use env::{
    AGENT_ID_VAR, API_KEY_VAR, BACKEND_URL_VAR, EnvError, POLL_INTERVAL_VAR,
};
pub use session::{Session, SessionBuilder};

/// Re-exports of [`voyagr_core`] crate.
pub mod core {
    pub use voyagr_core::*;
}
