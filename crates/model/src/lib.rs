//! Domain types and collaborator contracts for the Voyagr session core.
//!
//! This crate establishes the protocol between the session core and the
//! things it talks to: the remote backend that owns conversations and trip
//! data, and the voice agent SDK that carries speech. It also defines the
//! trip entities and transcript entries that flow between them.
//!
//! Types in this crate don't define any session behavior; they are the
//! constraints implementors should adhere to.

#![deny(missing_docs)]

mod backend;
mod conversation;
mod error;
mod message;
mod transcript;
pub mod trip;
mod voice;

pub use backend::*;
pub use conversation::*;
pub use error::*;
pub use message::*;
pub use transcript::*;
pub use trip::{
    AirportStop, FlightItinerary, FlightLeg, HotelOffer, NearbyPlace, Rate,
    Transportation, TripSnapshot, format_duration,
};
pub use voice::*;
