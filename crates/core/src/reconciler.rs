//! Trip data reconciliation.
//!
//! The reconciler holds the latest snapshot polled for the active
//! conversation and derives what should be displayed from it. Every poll
//! carries a [`PollTag`]; results whose tag is no longer current are
//! dropped, so a poll issued for an earlier session can never write into a
//! later one.

use std::fmt::{self, Display};

use voyagr_model::{ConversationId, FlightItinerary, HotelOffer, TripSnapshot};

use crate::error::BackendFailure;

/// Identifies the conversation and activation a poll was issued for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PollTag {
    conversation_id: ConversationId,
    generation: u64,
}

impl PollTag {
    /// The conversation the poll targets.
    #[inline]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }
}

impl Display for PollTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.conversation_id, self.generation)
    }
}

/// Which list a [`Selection`] was taken from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SelectionSource {
    /// General search results.
    #[default]
    Candidate,
    /// Entities the agent locked in for the user.
    Confirmed,
}

/// The entities of one kind that should be displayed.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection<T> {
    /// Where the items came from.
    pub source: SelectionSource,
    /// The items, in snapshot order.
    pub items: Vec<T>,
}

impl<T> Default for Selection<T> {
    #[inline]
    fn default() -> Self {
        Self {
            source: SelectionSource::Candidate,
            items: Vec::new(),
        }
    }
}

impl<T> Selection<T> {
    /// Returns whether nothing is selected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Picks the confirmed list once it is strictly longer than the candidate
/// list, and the candidate list otherwise.
pub fn select<T: Clone>(candidate: &[T], confirmed: &[T]) -> Selection<T> {
    if confirmed.len() > candidate.len() {
        Selection {
            source: SelectionSource::Confirmed,
            items: confirmed.to_vec(),
        }
    } else {
        Selection {
            source: SelectionSource::Candidate,
            items: candidate.to_vec(),
        }
    }
}

/// A renderable trip entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TripCard<'a> {
    /// A flight itinerary card.
    Flight(&'a FlightItinerary),
    /// A hotel card.
    Hotel(&'a HotelOffer),
}

/// What the trip panel shows, derived from a single snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplaySelection {
    /// Flights to show.
    pub flights: Selection<FlightItinerary>,
    /// Hotels to show.
    pub hotels: Selection<HotelOffer>,
}

impl DisplaySelection {
    /// Derives the selection for each entity kind independently.
    pub fn from_snapshot(snapshot: &TripSnapshot) -> Self {
        Self {
            flights: select(&snapshot.candidate_flights, &snapshot.confirmed_flights),
            hotels: select(&snapshot.candidate_hotels, &snapshot.confirmed_hotels),
        }
    }

    /// Iterates the cards in display order: flights first, then hotels.
    pub fn cards(&self) -> impl Iterator<Item = TripCard<'_>> {
        self.flights
            .items
            .iter()
            .map(TripCard::Flight)
            .chain(self.hotels.items.iter().map(TripCard::Hotel))
    }

    /// Returns whether there is nothing to show.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty() && self.hotels.is_empty()
    }
}

/// The result of feeding a poll into the reconciler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The snapshot replaced the previous one.
    Applied,
    /// The poll failed; previous data was kept.
    Failed,
    /// The poll belongs to an inactive conversation and was dropped.
    Stale,
}

/// Tracks the trip data of the active conversation.
#[derive(Debug, Default)]
pub struct TripReconciler {
    active: Option<PollTag>,
    generations: u64,
    snapshot: Option<TripSnapshot>,
    selection: DisplaySelection,
}

impl TripReconciler {
    /// Starts tracking a conversation, dropping anything held before.
    pub fn activate(&mut self, conversation_id: ConversationId) -> PollTag {
        self.clear();
        self.generations += 1;
        let tag = PollTag {
            conversation_id,
            generation: self.generations,
        };
        self.active = Some(tag.clone());
        tag
    }

    /// Stops tracking and clears all held data. Returns the tag that was
    /// active, if any.
    pub fn deactivate(&mut self) -> Option<PollTag> {
        self.clear();
        self.active.take()
    }

    fn clear(&mut self) {
        self.snapshot = None;
        self.selection = DisplaySelection::default();
    }

    /// Returns whether polls with this tag are still wanted.
    #[inline]
    pub fn is_current(&self, tag: &PollTag) -> bool {
        self.active.as_ref() == Some(tag)
    }

    /// Feeds a poll result. Successful polls replace the whole snapshot;
    /// failures and stale results leave everything untouched.
    pub fn apply(
        &mut self,
        tag: &PollTag,
        result: Result<TripSnapshot, BackendFailure>,
    ) -> PollOutcome {
        if !self.is_current(tag) {
            return PollOutcome::Stale;
        }
        match result {
            Ok(snapshot) => {
                self.selection = DisplaySelection::from_snapshot(&snapshot);
                self.snapshot = Some(snapshot);
                PollOutcome::Applied
            }
            Err(_) => PollOutcome::Failed,
        }
    }

    /// The tag of the active conversation.
    #[inline]
    pub fn active(&self) -> Option<&PollTag> {
        self.active.as_ref()
    }

    /// The latest successfully polled snapshot.
    #[inline]
    pub fn snapshot(&self) -> Option<&TripSnapshot> {
        self.snapshot.as_ref()
    }

    /// What should currently be displayed.
    #[inline]
    pub fn selection(&self) -> &DisplaySelection {
        &self.selection
    }
}
