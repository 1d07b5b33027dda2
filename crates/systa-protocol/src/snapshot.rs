//! Status Snapshot
//!
//! Immutable, accumulated view of every decoded field. A new snapshot is
//! produced for each record, the previous one is never modified.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::index::names;
use crate::{labels, DeviceHeader, FieldIndexTable, MessageType};

/// Decoded value of one field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Integer(i64),
    Number(f64),
}

impl FieldValue {
    /// Numeric view, flags read as 0 or 1
    pub fn as_f64(&self) -> f64 {
        match self {
            FieldValue::Flag(b) => f64::from(u8::from(*b)),
            FieldValue::Integer(i) => *i as f64,
            FieldValue::Number(n) => *n,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

/// Boiler operation modes in which the boiler counts as running
const BOILER_ACTIVE_MODES: [i64; 7] = [1, 2, 3, 8, 9, 11, 12];

/// Minimum boiler flow/return spread that indicates a burning flame
const BURNER_SPREAD_K: f64 = 0.2;

/// State computed from several decoded fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedState {
    pub boiler_is_on: Option<bool>,
    pub burner_is_on: Option<bool>,
    /// 0 off, 1 warm, 2 cool, 3 undefined
    pub mixer1_state: Option<u8>,
}

impl DerivedState {
    pub(crate) fn compute(table: &FieldIndexTable, values: &[Option<FieldValue>]) -> Self {
        let get = |name: &str| table.position(name).and_then(|i| values[i]);
        let flag = |name: &str| get(name).and_then(|v| v.as_bool());

        let boiler_relay = flag(names::BOILER_RELAY_IS_ON);
        let boiler_mode = get(names::BOILER_OPERATION_MODE)
            .and_then(|v| v.as_i64())
            .map(|mode| BOILER_ACTIVE_MODES.contains(&mode));
        let boiler_is_on = match (boiler_relay, boiler_mode) {
            (None, None) => None,
            (relay, mode) => Some(relay.unwrap_or(false) || mode.unwrap_or(false)),
        };

        let spread = match (get(names::BOILER_FLOW_TEMP), get(names::BOILER_RETURN_TEMP)) {
            (Some(flow), Some(ret)) => Some(flow.as_f64() - ret.as_f64()),
            _ => None,
        };
        let burner_relay = flag(names::BURNER_RELAY_IS_ON);
        let heating = match (boiler_is_on, spread) {
            (Some(on), Some(spread)) => Some(on && spread > BURNER_SPREAD_K),
            _ => None,
        };
        let burner_is_on = match (heating, burner_relay) {
            (None, None) => None,
            (heating, relay) => Some(heating.unwrap_or(false) || relay.unwrap_or(false)),
        };

        let mixer1_state = match (
            flag(names::MIXER_1_IS_ON_WARM),
            flag(names::MIXER_1_IS_ON_COOL),
        ) {
            (Some(false), Some(false)) => Some(0),
            (Some(true), Some(false)) => Some(1),
            (Some(false), Some(true)) => Some(2),
            (Some(true), Some(true)) => Some(3),
            _ => None,
        };

        Self {
            boiler_is_on,
            burner_is_on,
            mixer1_state,
        }
    }
}

/// Accumulated decoded state of the heating system
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub(crate) table: Arc<FieldIndexTable>,
    pub(crate) values: Vec<Option<FieldValue>>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
    pub(crate) message_times: [Option<DateTime<Utc>>; 3],
    pub(crate) sequence: u64,
    pub(crate) device: Option<DeviceHeader>,
    pub(crate) derived: DerivedState,
}

impl StatusSnapshot {
    /// Snapshot with no decoded fields
    pub fn empty(table: Arc<FieldIndexTable>) -> Self {
        let values = vec![None; table.len()];
        Self {
            table,
            values,
            updated_at: None,
            message_times: [None; 3],
            sequence: 0,
            device: None,
            derived: DerivedState::default(),
        }
    }

    /// True until the first record has been decoded
    pub fn is_empty(&self) -> bool {
        self.updated_at.is_none()
    }

    pub fn table(&self) -> &Arc<FieldIndexTable> {
        &self.table
    }

    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.table.position(name).and_then(|i| self.values[i])
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).map(|v| v.as_f64())
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_i64())
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| v.as_bool())
    }

    /// Decoded fields in table order
    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldValue)> + '_ {
        self.table
            .fields()
            .iter()
            .zip(self.values.iter())
            .filter_map(|(field, value)| value.map(|v| (field.name.as_str(), v)))
    }

    /// Number of records folded into this snapshot
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Arrival time of the last record of the given type
    pub fn message_time(&self, message: MessageType) -> Option<DateTime<Utc>> {
        self.message_times[message.index()]
    }

    pub fn has_message(&self, message: MessageType) -> bool {
        self.message_time(message).is_some()
    }

    pub fn device(&self) -> Option<&DeviceHeader> {
        self.device.as_ref()
    }

    pub fn derived(&self) -> &DerivedState {
        &self.derived
    }

    fn label(&self, name: &str, lookup: fn(i64) -> Option<&'static str>) -> Option<&'static str> {
        self.integer(name).and_then(lookup)
    }
}

impl Serialize for StatusSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_empty() {
            return serializer.serialize_map(Some(0))?.end();
        }

        let mut map = serializer.serialize_map(None)?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }

        if let Some(on) = self.derived.boiler_is_on {
            map.serialize_entry("boilerIsOn", &on)?;
        }
        if let Some(on) = self.derived.burner_is_on {
            map.serialize_entry("burnerIsOn", &on)?;
        }
        if let Some(state) = self.derived.mixer1_state {
            map.serialize_entry("mixer1State", &state)?;
            map.serialize_entry("mixer1StateName", &labels::mixer_state(state))?;
        }

        let named: [(&str, &str, fn(i64) -> Option<&'static str>); 5] = [
            ("operationModeName", names::OPERATION_MODE, labels::operation_mode),
            (
                "heatingOperationModeName",
                names::HEATING_OPERATION_MODE,
                labels::heating_operation_mode,
            ),
            (
                "hotWaterOperationModeName",
                names::HOT_WATER_OPERATION_MODE,
                labels::hot_water_operation_mode,
            ),
            (
                "boilerOperationModeName",
                names::BOILER_OPERATION_MODE,
                labels::boiler_operation_mode,
            ),
            ("controlledByName", names::CONTROLLED_BY, labels::control_method),
        ];
        for (key, field, lookup) in named {
            if let Some(label) = self.label(field, lookup) {
                map.serialize_entry(key, label)?;
            }
        }

        if let Some(device) = &self.device {
            map.serialize_entry("deviceMac", &device.mac_string())?;
        }
        if let Some(at) = self.updated_at {
            map.serialize_entry("timestamp", &at.timestamp())?;
            map.serialize_entry("timestampString", &at.to_rfc3339())?;
        }
        map.serialize_entry("sequence", &self.sequence)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_serializes_to_empty_object() {
        let snapshot = StatusSnapshot::empty(Arc::new(FieldIndexTable::systa_comfort()));
        assert!(snapshot.is_empty());
        assert_eq!(serde_json::to_string(&snapshot).unwrap(), "{}");
    }

    #[test]
    fn test_field_value_json_shape() {
        assert_eq!(serde_json::to_string(&FieldValue::Number(23.5)).unwrap(), "23.5");
        assert_eq!(serde_json::to_string(&FieldValue::Integer(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&FieldValue::Flag(true)).unwrap(), "true");
    }

    #[test]
    fn test_derived_needs_inputs() {
        let table = FieldIndexTable::systa_comfort();
        let values = vec![None; table.len()];
        assert_eq!(DerivedState::compute(&table, &values), DerivedState::default());
    }
}
