//! JSON wire format for location reports and world-state broadcasts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ProtocolError;
use crate::ws::LocationRelay;

/// A reported position. No bounds validation, no timestamp.
///
/// A coordinate missing from an inbound report reads as `0.0`; unknown fields
/// are ignored. Capitalized and upper-case keys are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, alias = "Lat", alias = "LAT")]
    pub lat: f64,
    #[serde(default, alias = "Lng", alias = "LNG")]
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Last known location of every reporting client, keyed by client identity.
/// Ordered so every broadcast serializes keys identically.
pub type WorldState = BTreeMap<String, Location>;

/// Decode one inbound text or binary frame as a location report.
pub fn parse_location(payload: &[u8]) -> Result<Location, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Serialize the full world state as the JSON object sent to every client.
pub fn encode_world_state(world: &WorldState) -> Result<String, serde_json::Error> {
    serde_json::to_string(world)
}

/// Handle an inbound frame from `user_id`.
/// A valid report updates the relay and broadcasts; anything else is logged and dropped.
pub fn handle_location_message(relay: &LocationRelay, user_id: &str, payload: &[u8]) {
    let location = match parse_location(payload) {
        Ok(location) => location,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                error = %e,
                "Dropping invalid location payload"
            );
            return;
        }
    };

    let outcome = relay.update_location(user_id, location);
    tracing::debug!(
        user_id = %user_id,
        lat = location.lat,
        lng = location.lng,
        delivered = outcome.delivered,
        skipped = outcome.skipped,
        pruned = outcome.pruned,
        "Location updated"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_floats() {
        let loc = parse_location(br#"{"lat":1.0,"lng":2.0}"#).unwrap();
        assert_eq!(loc, Location::new(1.0, 2.0));
    }

    #[test]
    fn test_parse_location_integers() {
        let loc = parse_location(br#"{"lat":9,"lng":-9}"#).unwrap();
        assert_eq!(loc, Location::new(9.0, -9.0));
    }

    #[test]
    fn test_parse_location_missing_field_defaults_to_zero() {
        let loc = parse_location(br#"{"lat":45.5}"#).unwrap();
        assert_eq!(loc, Location::new(45.5, 0.0));
    }

    #[test]
    fn test_parse_location_ignores_unknown_fields() {
        let loc = parse_location(br#"{"lat":1,"lng":2,"level":7}"#).unwrap();
        assert_eq!(loc, Location::new(1.0, 2.0));
    }

    #[test]
    fn test_parse_location_accepts_capitalized_keys() {
        let loc = parse_location(br#"{"Lat":1,"Lng":2}"#).unwrap();
        assert_eq!(loc, Location::new(1.0, 2.0));
        let loc = parse_location(br#"{"LAT":-3.5,"LNG":4.25}"#).unwrap();
        assert_eq!(loc, Location::new(-3.5, 4.25));
    }

    #[test]
    fn test_parse_location_rejects_non_object() {
        assert!(parse_location(b"not json").is_err());
        assert!(parse_location(br#""not json""#).is_err());
        assert!(parse_location(b"[1.0, 2.0]").is_err());
    }

    #[test]
    fn test_parse_location_rejects_string_coordinates() {
        assert!(parse_location(br#"{"lat":"1.0","lng":2.0}"#).is_err());
    }

    #[test]
    fn test_encode_world_state_sorted_keys() {
        let mut world = WorldState::new();
        world.insert("bob".to_string(), Location::new(9.0, 9.0));
        world.insert("alice".to_string(), Location::new(1.0, 2.0));

        let json = encode_world_state(&world).unwrap();
        assert_eq!(
            json,
            r#"{"alice":{"lat":1.0,"lng":2.0},"bob":{"lat":9.0,"lng":9.0}}"#
        );
    }

    #[test]
    fn test_encode_empty_world_state() {
        assert_eq!(encode_world_state(&WorldState::new()).unwrap(), "{}");
    }
}
