//! Plain text rendering of the view-model for terminals.

use std::fmt::Write as _;

use voyagr_core::{
    DisplaySelection, EMPTY_TRANSCRIPT_PLACEHOLDER, SelectionSource, TripCard,
    ViewModel,
};
use voyagr_model::{
    AirportStop, FlightItinerary, HotelOffer, Role, TranscriptEntry,
    format_duration,
};

/// Renders the status badges, e.g. `Connected · Listening · volume 80%`.
pub fn status_line(view: &ViewModel) -> String {
    let status = view.session_status();
    let mut line = status.label().to_owned();
    if let Some(activity) = status.activity_label(view.is_speaking()) {
        line.push_str(" · ");
        line.push_str(activity);
    }
    let _ = write!(line, " · volume {:.0}%", view.volume() * 100.0);
    line
}

/// A short tag naming who produced a transcript entry.
pub fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "agent",
        Role::ApiDebug => "api",
    }
}

/// Renders one transcript entry.
pub fn transcript_line(entry: &TranscriptEntry) -> String {
    format!("{}: {}", speaker(entry.role), entry.content)
}

/// Renders the whole transcript, or the placeholder when it is empty.
pub fn transcript(entries: &[TranscriptEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_TRANSCRIPT_PLACEHOLDER.to_owned();
    }
    entries
        .iter()
        .map(transcript_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Formats a price the way the backend's numbers read, without a
/// fractional part when there is none.
pub fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("${price:.0}")
    } else {
        format!("${price:.2}")
    }
}

fn stop(stop: &AirportStop) -> String {
    match stop.clock_time() {
        Some(time) => format!("{} {time}", stop.id),
        None => format!("{} {}", stop.id, stop.time),
    }
}

/// Renders a flight itinerary card.
pub fn flight_card(itinerary: &FlightItinerary) -> String {
    let mut card = String::new();
    let title = if itinerary.kind.is_empty() {
        "Flight"
    } else {
        itinerary.kind.as_str()
    };
    let _ = writeln!(card, "{title}  {}", format_price(itinerary.price));
    for leg in &itinerary.legs {
        let airline = if leg.airline.is_empty() {
            itinerary.airline().unwrap_or_default()
        } else {
            leg.airline.as_str()
        };
        let _ = writeln!(card, "  {airline} • {}", leg.flight_number);
        let _ = writeln!(
            card,
            "  {} ──{}──▶ {}",
            stop(&leg.departure_airport),
            format_duration(leg.duration),
            stop(&leg.arrival_airport),
        );
    }
    let _ = write!(
        card,
        "Total: {} · {}",
        format_duration(itinerary.total_duration),
        itinerary.leg_count_label()
    );
    card
}

/// Renders a hotel card.
pub fn hotel_card(hotel: &HotelOffer) -> String {
    let mut card = String::new();
    let _ = write!(card, "{}", hotel.name);
    if let Some(rate) = &hotel.rate_per_night {
        let _ = write!(card, "  {}", rate.lowest);
    }
    card.push('\n');

    let stars = "★".repeat(usize::from(hotel.stars().unwrap_or(0)));
    let _ = writeln!(card, "  {stars} ({}/5)", hotel.overall_rating);
    let _ = writeln!(
        card,
        "  Check-in: {} · Check-out: {}",
        hotel.check_in_time.as_deref().unwrap_or("n/a"),
        hotel.check_out_time.as_deref().unwrap_or("n/a"),
    );
    if let Some(total) = &hotel.total_rate {
        let _ = writeln!(card, "  Total: {}", total.lowest);
    }
    let _ = write!(card, "  {} amenities", hotel.amenities.len());
    for place in &hotel.nearby_places {
        let ways = place
            .transportations
            .iter()
            .map(|way| format!("{}: {}", way.mode, way.duration))
            .collect::<Vec<_>>()
            .join(", ");
        if ways.is_empty() {
            let _ = write!(card, "\n  Nearby: {}", place.name);
        } else {
            let _ = write!(card, "\n  Nearby: {} ({ways})", place.name);
        }
    }
    card
}

fn source_label(source: SelectionSource) -> &'static str {
    match source {
        SelectionSource::Candidate => "options",
        SelectionSource::Confirmed => "selected",
    }
}

/// Renders every trip card, flights first. Returns `None` when there is
/// nothing to show.
pub fn trip_panel(selection: &DisplaySelection) -> Option<String> {
    if selection.is_empty() {
        return None;
    }
    let mut panel = String::new();
    let mut last_kind = None;
    for card in selection.cards() {
        let (kind, body) = match card {
            TripCard::Flight(flight) => (
                format!("Flights ({})", source_label(selection.flights.source)),
                flight_card(flight),
            ),
            TripCard::Hotel(hotel) => (
                format!("Hotels ({})", source_label(selection.hotels.source)),
                hotel_card(hotel),
            ),
        };
        if last_kind.as_ref() != Some(&kind) {
            if !panel.is_empty() {
                panel.push('\n');
            }
            let _ = writeln!(panel, "== {kind} ==");
            last_kind = Some(kind);
        }
        let _ = writeln!(panel, "{body}");
    }
    Some(panel.trim_end().to_owned())
}
