//! Water heater view of the decoded status, shaped for home automation
//! water heater entities.

use serde::Serialize;
use systa_protocol::index::names;
use systa_protocol::{labels, MessageType, StatusSnapshot};

/// Operation names offered to home automation
pub const WATER_HEATER_OPERATIONS: [&str; 4] = labels::HOT_WATER_OPERATION_MODES;

const MIN_TEMP: f64 = 40.0;
const MAX_TEMP: f64 = 65.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterHeaterStatus {
    pub min_temp: f64,
    pub max_temp: f64,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub target_temperature_high: Option<f64>,
    pub target_temperature_low: Option<f64>,
    pub temperature_unit: &'static str,
    pub current_operation: Option<&'static str>,
    pub operation_list: Vec<&'static str>,
    pub supported_features: Vec<&'static str>,
    pub is_away_mode_on: bool,
    pub timestamp: i64,
    pub timestamp_string: String,
}

impl WaterHeaterStatus {
    /// Project a snapshot, `None` until a primary block has been decoded
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Option<Self> {
        let at = snapshot.message_time(MessageType::Primary)?;

        let target = snapshot.number(names::HOT_WATER_TEMP_SET);
        let hysteresis = snapshot.number(names::HOT_WATER_HYSTERESIS);
        let target_low = match (target, hysteresis) {
            (Some(target), Some(hysteresis)) => Some((target - hysteresis).max(0.0)),
            _ => None,
        };

        Some(Self {
            min_temp: MIN_TEMP,
            max_temp: MAX_TEMP,
            current_temperature: snapshot.number(names::HOT_WATER_TEMP),
            target_temperature: target,
            target_temperature_high: snapshot.number(names::HOT_WATER_TEMP_MAX),
            target_temperature_low: target_low,
            temperature_unit: "TEMP_CELSIUS",
            current_operation: snapshot
                .integer(names::HOT_WATER_OPERATION_MODE)
                .and_then(labels::hot_water_operation_mode),
            operation_list: WATER_HEATER_OPERATIONS.to_vec(),
            supported_features: Vec::new(),
            is_away_mode_on: false,
            timestamp: at.timestamp(),
            timestamp_string: at.to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use systa_protocol::{DeviceHeader, FieldIndexTable, RawRecord, StatusDecoder};

    fn snapshot(entries: &[(usize, i32)], message: MessageType) -> StatusSnapshot {
        let decoder = StatusDecoder::new(Arc::new(FieldIndexTable::systa_comfort()));
        let mut values = vec![0; 250];
        for (offset, value) in entries {
            values[*offset] = *value;
        }
        let header = DeviceHeader {
            mac: [0; 6],
            counter: 0,
        };
        decoder.decode(
            &decoder.empty_snapshot(),
            &RawRecord::new(message, header, Utc::now(), values),
        )
    }

    #[test]
    fn test_projection() {
        // hot water 48.2, set 50.0, hysteresis 5.0, max 60.0, mode comfort
        let snapshot = snapshot(
            &[(3, 482), (22, 500), (155, 50), (156, 600), (151, 2)],
            MessageType::Primary,
        );
        let heater = WaterHeaterStatus::from_snapshot(&snapshot).unwrap();

        assert_eq!(heater.min_temp, 40.0);
        assert_eq!(heater.max_temp, 65.0);
        assert_eq!(heater.current_temperature, Some(48.2));
        assert_eq!(heater.target_temperature, Some(50.0));
        assert_eq!(heater.target_temperature_high, Some(60.0));
        assert_eq!(heater.target_temperature_low, Some(45.0));
        assert_eq!(heater.current_operation, Some("comfort"));
        assert_eq!(heater.operation_list, vec!["off", "normal", "comfort", "locked"]);
        assert!(heater.supported_features.is_empty());
        assert!(!heater.is_away_mode_on);
    }

    #[test]
    fn test_target_low_never_negative() {
        let snapshot = snapshot(&[(22, 30), (155, 100)], MessageType::Primary);
        let heater = WaterHeaterStatus::from_snapshot(&snapshot).unwrap();
        assert_eq!(heater.target_temperature_low, Some(0.0));
    }

    #[test]
    fn test_no_projection_without_primary_block() {
        let table = Arc::new(FieldIndexTable::systa_comfort());
        assert!(WaterHeaterStatus::from_snapshot(&StatusSnapshot::empty(table)).is_none());

        let snapshot = snapshot(&[], MessageType::Extended2);
        assert!(WaterHeaterStatus::from_snapshot(&snapshot).is_none());
    }

    #[test]
    fn test_json_shape() {
        let snapshot = snapshot(&[(3, 482)], MessageType::Primary);
        let json = serde_json::to_value(WaterHeaterStatus::from_snapshot(&snapshot)).unwrap();

        assert_eq!(json["currentTemperature"], 48.2);
        assert_eq!(json["temperatureUnit"], "TEMP_CELSIUS");
        assert_eq!(json["isAwayModeOn"], false);
    }
}
