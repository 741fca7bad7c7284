//! Driver location rows and change events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::position::Position;
use crate::types::{TripId, UserId};

use super::StoreError;

/// The current location row of a trip's driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverLocationRecord {
    /// Trip the row belongs to (the upsert key).
    pub trip_id: TripId,
    /// Internal id of the driver who wrote it.
    pub driver_id: UserId,
    /// Latitude in degrees.
    #[serde(deserialize_with = "coordinate")]
    pub latitude: f64,
    /// Longitude in degrees.
    #[serde(deserialize_with = "coordinate")]
    pub longitude: f64,
    /// Assigned by the store on every write.
    pub updated_at: DateTime<Utc>,
}

impl DriverLocationRecord {
    /// The row as a position fix, timed by its last update.
    pub fn position(&self) -> Position {
        Position::at(self.latitude, self.longitude, self.updated_at)
    }
}

/// A driver position write, before the store stamps it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub trip_id: TripId,
    pub driver_id: UserId,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationUpdate {
    /// Build an update from a captured position.
    pub fn from_position(trip_id: TripId, driver_id: UserId, position: &Position) -> Self {
        Self {
            trip_id,
            driver_id,
            latitude: position.latitude,
            longitude: position.longitude,
        }
    }
}

/// Kind of row change carried by a feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One change-feed notification for a trip's location row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// What happened to the row.
    pub kind: ChangeKind,
    /// The row after the change; `None` for deletes.
    pub record: Option<DriverLocationRecord>,
    /// Store-assigned delivery order.
    pub sequence: u64,
}

/// Wire shape of a database change notification.
#[derive(Debug, Deserialize)]
struct ChangePayload {
    #[serde(rename = "eventType")]
    event_type: ChangeKind,
    #[serde(default)]
    new: Option<serde_json::Value>,
}

impl ChangeEvent {
    /// Decode a change notification as pushed by the realtime backend.
    ///
    /// The payload carries the row image under `new`; deletes carry an empty
    /// object. Coordinates may arrive as numbers or numeric strings.
    pub fn from_json(payload: &str, sequence: u64) -> Result<Self, StoreError> {
        let raw: ChangePayload = serde_json::from_str(payload)?;
        let record = match raw.new {
            Some(serde_json::Value::Object(row)) if !row.is_empty() => {
                Some(serde_json::from_value(serde_json::Value::Object(row))?)
            }
            _ => None,
        };
        Ok(Self {
            kind: raw.event_type,
            record,
            sequence,
        })
    }

    /// The new position carried by this event, if any.
    pub fn position(&self) -> Option<Position> {
        self.record.as_ref().map(DriverLocationRecord::position)
    }
}

/// Accept a coordinate as a JSON number or a numeric string.
fn coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_update_with_string_coordinates() {
        let payload = r#"{
            "eventType": "UPDATE",
            "schema": "public",
            "table": "driver_locations",
            "commit_timestamp": "2024-05-01T10:00:01Z",
            "new": {
                "trip_id": "trip-1",
                "driver_id": "user-9",
                "latitude": "33.9716",
                "longitude": -6.8498,
                "updated_at": "2024-05-01T10:00:00.123456+00:00"
            },
            "old": {}
        }"#;

        let event = ChangeEvent::from_json(payload, 4).unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.sequence, 4);
        let record = event.record.unwrap();
        assert_eq!(record.trip_id, TripId::new("trip-1"));
        assert_eq!(record.latitude, 33.9716);
        assert_eq!(record.longitude, -6.8498);
    }

    #[test]
    fn test_decode_delete_has_no_record() {
        let payload = r#"{"eventType":"DELETE","new":{},"old":{"trip_id":"trip-1"}}"#;
        let event = ChangeEvent::from_json(payload, 1).unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert!(event.record.is_none());
        assert!(event.position().is_none());
    }

    #[test]
    fn test_decode_rejects_bad_coordinate() {
        let payload = r#"{"eventType":"INSERT","new":{
            "trip_id":"t","driver_id":"d","latitude":"north","longitude":1.0,
            "updated_at":"2024-05-01T10:00:00Z"}}"#;
        let result = ChangeEvent::from_json(payload, 1);
        assert!(matches!(result, Err(StoreError::InvalidPayload(_))));
    }

    #[test]
    fn test_record_position_uses_updated_at() {
        let updated_at = Utc::now();
        let record = DriverLocationRecord {
            trip_id: TripId::new("t"),
            driver_id: UserId::new("d"),
            latitude: 33.97,
            longitude: -6.85,
            updated_at,
        };
        let position = record.position();
        assert_eq!(position.captured_at, updated_at);
        assert_eq!(position.latitude, 33.97);
    }
}
