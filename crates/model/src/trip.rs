//! Trip entities returned by the backend.
//!
//! Field names follow the backend's wire format, which in turn mirrors the
//! flight and hotel search results the agent's tools produce.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// One end of a flight leg.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AirportStop {
    /// IATA code, e.g. `JFK`.
    pub id: String,
    /// Human readable airport name.
    #[serde(default)]
    pub name: String,
    /// Local time as sent by the backend, e.g. `2025-03-01 08:30`.
    pub time: String,
}

impl AirportStop {
    /// Returns the local wall clock time as `HH:MM`, if `time` parses.
    pub fn clock_time(&self) -> Option<String> {
        const FORMATS: [&str; 3] =
            ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
        let time = self.time.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(time) {
            return Some(parsed.format("%H:%M").to_string());
        }
        FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(time, fmt).ok())
            .map(|parsed| parsed.format("%H:%M").to_string())
    }
}

/// A single flight within an itinerary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlightLeg {
    /// Operating airline.
    #[serde(default)]
    pub airline: String,
    /// Where the leg departs from.
    pub departure_airport: AirportStop,
    /// Where the leg lands.
    pub arrival_airport: AirportStop,
    /// Flight time in minutes.
    pub duration: u32,
    /// Marketing flight number, e.g. `DL 123`.
    #[serde(default)]
    pub flight_number: String,
}

/// A bookable itinerary made of one or more legs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlightItinerary {
    /// Itinerary level airline, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airline: Option<String>,
    /// Legs in travel order.
    #[serde(rename = "flights")]
    pub legs: Vec<FlightLeg>,
    /// Total price.
    pub price: f64,
    /// Total travel time in minutes, layovers included.
    pub total_duration: u32,
    /// Itinerary type label, e.g. `Round trip`.
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl FlightItinerary {
    /// Returns the itinerary airline, falling back to the first leg's.
    pub fn airline(&self) -> Option<&str> {
        self.airline
            .as_deref()
            .or_else(|| self.legs.first().map(|leg| leg.airline.as_str()))
            .filter(|airline| !airline.is_empty())
    }

    /// Returns `"1 flight"` or `"N flights"`.
    pub fn leg_count_label(&self) -> String {
        match self.legs.len() {
            1 => "1 flight".to_owned(),
            n => format!("{n} flights"),
        }
    }
}

/// Formats a duration given in minutes as `"{hours}h {minutes}m"`.
pub fn format_duration(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// A way to reach a nearby place from the hotel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transportation {
    /// Mode of transport, e.g. `Walking`.
    #[serde(rename = "type")]
    pub mode: String,
    /// Travel time as a display string, e.g. `5 min`.
    pub duration: String,
}

/// A point of interest near a hotel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NearbyPlace {
    /// Place name.
    pub name: String,
    /// Ways to get there.
    #[serde(default, deserialize_with = "null_as_default")]
    pub transportations: Vec<Transportation>,
}

/// A price as both a display string and a number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    /// Display form, e.g. `$120`.
    pub lowest: String,
    /// Numeric form, e.g. `120`.
    pub extracted_lowest: f64,
}

/// A hotel offer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotelOffer {
    /// Hotel name.
    pub name: String,
    /// Star class label, e.g. `4-star hotel`.
    #[serde(default)]
    pub hotel_class: String,
    /// Average guest rating out of 5.
    #[serde(default)]
    pub overall_rating: f64,
    /// Check-in time, e.g. `3:00 PM`.
    #[serde(default)]
    pub check_in_time: Option<String>,
    /// Check-out time, e.g. `11:00 AM`.
    #[serde(default)]
    pub check_out_time: Option<String>,
    /// Amenity names.
    #[serde(default, deserialize_with = "null_as_default")]
    pub amenities: Vec<String>,
    /// Points of interest around the hotel.
    #[serde(default, deserialize_with = "null_as_default")]
    pub nearby_places: Vec<NearbyPlace>,
    /// Price per night. Older backends send it as `price`.
    #[serde(default, alias = "price")]
    pub rate_per_night: Option<Rate>,
    /// Price for the whole stay.
    #[serde(default)]
    pub total_rate: Option<Rate>,
}

impl HotelOffer {
    /// Parses the star count out of `hotel_class` (`"4-star hotel"` → 4).
    pub fn stars(&self) -> Option<u8> {
        let digits: String = self
            .hotel_class
            .trim_start()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    }
}

/// The trip entities the backend holds for one conversation, as returned by
/// a single poll.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripSnapshot {
    /// Flights found by the agent's searches.
    #[serde(rename = "flights", default, deserialize_with = "null_as_default")]
    pub candidate_flights: Vec<FlightItinerary>,
    /// Flights the agent has marked as chosen.
    #[serde(
        rename = "selected_flights",
        default,
        deserialize_with = "null_as_default"
    )]
    pub confirmed_flights: Vec<FlightItinerary>,
    /// Hotels found by the agent's searches.
    #[serde(rename = "hotels", default, deserialize_with = "null_as_default")]
    pub candidate_hotels: Vec<HotelOffer>,
    /// Hotels the agent has marked as chosen.
    #[serde(
        rename = "selected_hotel",
        default,
        deserialize_with = "null_as_default"
    )]
    pub confirmed_hotels: Vec<HotelOffer>,
}

impl TripSnapshot {
    /// Returns whether the snapshot holds no entities at all.
    pub fn is_empty(&self) -> bool {
        self.candidate_flights.is_empty()
            && self.confirmed_flights.is_empty()
            && self.candidate_hotels.is_empty()
            && self.confirmed_hotels.is_empty()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn leg_json(from: &str, to: &str) -> serde_json::Value {
        json!({
            "airline": "TAP Air Portugal",
            "departure_airport": { "id": from, "name": "Departure", "time": "2025-03-01 08:30" },
            "arrival_airport": { "id": to, "name": "Arrival", "time": "2025-03-01 20:05" },
            "duration": 455,
            "flight_number": "TP 210"
        })
    }

    #[test]
    fn test_decode_snapshot() {
        let snapshot: TripSnapshot = serde_json::from_value(json!({
            "flights": [{
                "flights": [leg_json("EWR", "LIS")],
                "price": 612,
                "total_duration": 455,
                "type": "Round trip"
            }],
            "selected_flights": null,
            "hotels": [{
                "name": "Memmo Alfama",
                "hotel_class": "4-star hotel",
                "overall_rating": 4.6,
                "check_in_time": "3:00 PM",
                "check_out_time": "12:00 PM",
                "amenities": ["Free Wi-Fi", "Pool"],
                "nearby_places": [{
                    "name": "Lisbon Cathedral",
                    "transportations": [{ "type": "Walking", "duration": "4 min" }]
                }],
                "price": { "lowest": "$210", "extracted_lowest": 210 }
            }]
        }))
        .unwrap();

        assert_eq!(snapshot.candidate_flights.len(), 1);
        assert!(snapshot.confirmed_flights.is_empty());
        assert!(snapshot.confirmed_hotels.is_empty());

        let flight = &snapshot.candidate_flights[0];
        assert_eq!(flight.kind, "Round trip");
        assert_eq!(flight.airline(), Some("TAP Air Portugal"));
        assert_eq!(flight.leg_count_label(), "1 flight");
        assert_eq!(flight.legs[0].departure_airport.clock_time().as_deref(), Some("08:30"));

        let hotel = &snapshot.candidate_hotels[0];
        assert_eq!(hotel.stars(), Some(4));
        assert_eq!(hotel.rate_per_night.as_ref().unwrap().lowest, "$210");
        assert_eq!(hotel.nearby_places[0].transportations[0].mode, "Walking");
    }

    #[test]
    fn test_missing_lists_are_empty() {
        let snapshot: TripSnapshot = serde_json::from_value(json!({})).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_malformed_entity_is_rejected() {
        let result = serde_json::from_value::<TripSnapshot>(json!({
            "flights": [{ "price": "cheap" }]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0h 0m");
        assert_eq!(format_duration(59), "0h 59m");
        assert_eq!(format_duration(455), "7h 35m");
    }

    #[test]
    fn test_clock_time_formats() {
        let stop = |time: &str| AirportStop {
            id: "LIS".to_owned(),
            name: String::new(),
            time: time.to_owned(),
        };
        assert_eq!(stop("2025-03-01T06:05:00").clock_time().as_deref(), Some("06:05"));
        assert_eq!(
            stop("2025-03-01T06:05:00+01:00").clock_time().as_deref(),
            Some("06:05")
        );
        assert_eq!(stop("soon").clock_time(), None);
    }

    #[test]
    fn test_stars_without_class() {
        let hotel: HotelOffer =
            serde_json::from_value(json!({ "name": "Hostel" })).unwrap();
        assert_eq!(hotel.stars(), None);
        assert!(hotel.rate_per_night.is_none());
    }
}
