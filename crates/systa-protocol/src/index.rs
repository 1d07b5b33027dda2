//! Field Index Table
//!
//! Maps each named status field to its position inside a raw record and the
//! rule that turns the raw integer into a value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{MessageType, ProtocolError};

/// How a raw integer becomes a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// Used verbatim (counters, enums)
    Raw,
    /// Divided into a float, `Divide(10)` for tenths
    Divide(u16),
    /// Multiplied as an integer, pump speeds are sent in steps of 5 %
    Multiply(u16),
}

/// One entry of the field index table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default = "default_message")]
    pub message: MessageType,
    pub offset: usize,
    #[serde(default = "default_scale")]
    pub scale: Scale,
    #[serde(default = "default_signed")]
    pub signed: bool,
    /// Masked fields decode to `(raw & mask) != 0`
    #[serde(default)]
    pub mask: Option<u32>,
}

fn default_message() -> MessageType {
    MessageType::Primary
}

fn default_scale() -> Scale {
    Scale::Raw
}

fn default_signed() -> bool {
    true
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, offset: usize, scale: Scale) -> Self {
        Self {
            name: name.into(),
            message: MessageType::Primary,
            offset,
            scale,
            signed: true,
            mask: None,
        }
    }

    /// Tenths of a unit
    pub fn tenths(name: impl Into<String>, offset: usize) -> Self {
        Self::new(name, offset, Scale::Divide(10))
    }

    pub fn raw(name: impl Into<String>, offset: usize) -> Self {
        Self::new(name, offset, Scale::Raw)
    }

    /// Boolean flag taken from a packed bit field
    pub fn flag(name: impl Into<String>, offset: usize, mask: u32) -> Self {
        Self {
            signed: false,
            mask: Some(mask),
            ..Self::raw(name, offset)
        }
    }

    pub fn unsigned(mut self) -> Self {
        self.signed = false;
        self
    }

    pub fn on(mut self, message: MessageType) -> Self {
        self.message = message;
        self
    }
}

/// Keys the serialized snapshot writes next to the field values
pub const RESERVED_KEYS: [&str; 7] = [
    "boilerIsOn",
    "burnerIsOn",
    "mixer1State",
    "deviceMac",
    "timestamp",
    "timestampString",
    "sequence",
];

/// Label keys end in this suffix
const LABEL_SUFFIX: &str = "Name";

fn is_reserved(name: &str) -> bool {
    RESERVED_KEYS.contains(&name) || name.ends_with(LABEL_SUFFIX)
}

/// Immutable registry of field specs, looked up by position or name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldSpec>", into = "Vec<FieldSpec>")]
pub struct FieldIndexTable {
    fields: Vec<FieldSpec>,
    by_name: HashMap<String, usize>,
}

impl FieldIndexTable {
    /// Build a table, rejecting duplicate or reserved names, zero masks
    /// and zero divisors
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, ProtocolError> {
        let mut by_name = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if is_reserved(&field.name) {
                return Err(ProtocolError::ReservedField(field.name.clone()));
            }
            if field.mask == Some(0) {
                return Err(ProtocolError::ZeroMask(field.name.clone()));
            }
            if field.scale == Scale::Divide(0) {
                return Err(ProtocolError::ZeroDivisor(field.name.clone()));
            }
            if by_name.insert(field.name.clone(), i).is_some() {
                return Err(ProtocolError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields, by_name })
    }

    /// SystaComfort II layout, every known field on the primary block
    pub fn systa_comfort() -> Self {
        let fields = systa_comfort_fields();
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Self { fields, by_name }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field by name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.position(name).map(|i| &self.fields[i])
    }
}

impl Default for FieldIndexTable {
    fn default() -> Self {
        Self::systa_comfort()
    }
}

impl TryFrom<Vec<FieldSpec>> for FieldIndexTable {
    type Error = ProtocolError;

    fn try_from(fields: Vec<FieldSpec>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<FieldIndexTable> for Vec<FieldSpec> {
    fn from(table: FieldIndexTable) -> Self {
        table.fields
    }
}

/// Names of the fields of the default table
pub mod names {
    pub const OUTSIDE_TEMP: &str = "outsideTemp";
    pub const CIRCUIT_1_FLOW_TEMP: &str = "circuit1FlowTemp";
    pub const CIRCUIT_1_RETURN_TEMP: &str = "circuit1ReturnTemp";
    pub const HOT_WATER_TEMP: &str = "hotWaterTemp";
    pub const BUFFER_TEMP_TOP: &str = "bufferTempTop";
    pub const BUFFER_TEMP_BOTTOM: &str = "bufferTempBottom";
    pub const CIRCULATION_TEMP: &str = "circulationTemp";
    pub const CIRCUIT_2_FLOW_TEMP: &str = "circuit2FlowTemp";
    pub const CIRCUIT_2_RETURN_TEMP: &str = "circuit2ReturnTemp";
    pub const ROOM_TEMP_ACTUAL_1: &str = "roomTempActual1";
    pub const ROOM_TEMP_ACTUAL_2: &str = "roomTempActual2";
    pub const COLLECTOR_TEMP_ACTUAL: &str = "collectorTempActual";
    pub const BOILER_FLOW_TEMP: &str = "boilerFlowTemp";
    pub const BOILER_RETURN_TEMP: &str = "boilerReturnTemp";
    pub const LOG_BOILER_FLOW_TEMP: &str = "logBoilerFlowTemp";
    pub const LOG_BOILER_RETURN_TEMP: &str = "logBoilerReturnTemp";
    pub const LOG_BOILER_BUFFER_TEMP_TOP: &str = "logBoilerBufferTempTop";
    pub const SWIMMINGPOOL_TEMP: &str = "swimmingpoolTemp";
    pub const SWIMMINGPOOL_FLOW_TEMP: &str = "swimmingpoolFlowTemp";
    pub const SWIMMINGPOOL_RETURN_TEMP: &str = "swimmingpoolReturnTemp";
    pub const HOT_WATER_TEMP_SET: &str = "hotWaterTempSet";
    pub const ROOM_TEMP_SET_1: &str = "roomTempSet1";
    pub const CIRCUIT_1_FLOW_TEMP_SET: &str = "circuit1FlowTempSet";
    pub const CIRCUIT_2_FLOW_TEMP_SET: &str = "circuit2FlowTempSet";
    pub const ROOM_TEMP_SET_2: &str = "roomTempSet2";
    pub const BUFFER_TEMP_SET: &str = "bufferTempSet";
    pub const BOILER_TEMP_SET: &str = "boilerTempSet";
    pub const OPERATION_MODE: &str = "operationMode";
    pub const ROOM_TEMP_SET_NORMAL: &str = "roomTempSetNormal";
    pub const ROOM_TEMP_SET_COMFORT: &str = "roomTempSetComfort";
    pub const ROOM_TEMP_SET_LOWERING: &str = "roomTempSetLowering";
    pub const HEATING_OPERATION_MODE: &str = "heatingOperationMode";
    pub const CONTROLLED_BY: &str = "controlledBy";
    pub const HEATING_CURVE_BASE_POINT: &str = "heatingCurveBasePoint";
    pub const HEATING_CURVE_GRADIENT: &str = "heatingCurveGradient";
    pub const MAX_FLOW_TEMP: &str = "maxFlowTemp";
    pub const HEATING_LIMIT_TEMP: &str = "heatingLimitTemp";
    pub const HEATING_LIMIT_TEMP_LOWERING: &str = "heatingLimitTempLowering";
    pub const ANTI_FREEZE_OUTSIDE_TEMP: &str = "antiFreezeOutsideTemp";
    pub const HEAT_UP_TIME: &str = "heatUpTime";
    pub const ROOM_IMPACT: &str = "roomImpact";
    pub const BOILER_SUPERELEVATION: &str = "boilerSuperelevation";
    pub const HEATING_CIRCUIT_SPREADING: &str = "heatingCircuitSpreading";
    pub const HEATING_PUMP_SPEED_MIN: &str = "heatingPumpSpeedMin";
    pub const MIXER_RUNTIME: &str = "mixerRuntime";
    pub const ROOM_TEMP_CORRECTION: &str = "roomTempCorrection";
    pub const UNDERFLOOR_HEATING_BASE_POINT: &str = "underfloorHeatingBasePoint";
    pub const UNDERFLOOR_HEATING_GRADIENT: &str = "underfloorHeatingGradient";
    pub const HOT_WATER_TEMP_NORMAL: &str = "hotWaterTempNormal";
    pub const HOT_WATER_TEMP_COMFORT: &str = "hotWaterTempComfort";
    pub const HOT_WATER_OPERATION_MODE: &str = "hotWaterOperationMode";
    pub const HOT_WATER_HYSTERESIS: &str = "hotWaterHysteresis";
    pub const HOT_WATER_TEMP_MAX: &str = "hotWaterTempMax";
    pub const BUFFER_TYPE: &str = "bufferType";
    pub const HEATING_PUMP_OVERRUN: &str = "heatingPumpOverrun";
    pub const BUFFER_TEMP_MAX: &str = "bufferTempMax";
    pub const BUFFER_TEMP_MIN: &str = "bufferTempMin";
    pub const BOILER_HYSTERESIS: &str = "boilerHysteresis";
    pub const BOILER_OPERATION_TIME: &str = "boilerOperationTime";
    pub const BOILER_SHUTDOWN_TEMP: &str = "boilerShutdownTemp";
    pub const BOILER_PUMP_SPEED_MIN: &str = "boilerPumpSpeedMin";
    pub const CIRCULATION_PUMP_OVERRUN: &str = "circulationPumpOverrun";
    pub const CIRCULATION_LOCKOUT_TIME_PUSH_BUTTON: &str = "circulationLockoutTimePushButton";
    pub const CIRCULATION_HYSTERESIS: &str = "circulationHysteresis";
    pub const LOG_BOILER_SETTINGS: &str = "logBoilerSettings";
    pub const LOG_BOILER_PARALLEL_OPERATION: &str = "logBoilerParallelOperation";
    pub const BOILER_HEATS_BUFFER: &str = "boilerHeatsBuffer";
    pub const ADJUST_ROOM_TEMP_BY: &str = "adjustRoomTempBy";
    pub const BOILER_OPERATION_TIME_HOURS: &str = "boilerOperationTimeHours";
    pub const BOILER_OPERATION_TIME_MINUTES: &str = "boilerOperationTimeMinutes";
    pub const BURNER_NUMBER_OF_STARTS: &str = "burnerNumberOfStarts";
    pub const SOLAR_POWER_ACTUAL: &str = "solarPowerActual";
    pub const SOLAR_GAIN_DAY: &str = "solarGainDay";
    pub const SOLAR_GAIN_TOTAL: &str = "solarGainTotal";
    pub const SYSTEM_NUMBER_OF_STARTS: &str = "systemNumberOfStarts";
    pub const CIRCUIT_1_LEAD_TIME: &str = "circuit1LeadTime";
    pub const CIRCUIT_2_LEAD_TIME: &str = "circuit2LeadTime";
    pub const CIRCUIT_3_LEAD_TIME: &str = "circuit3LeadTime";
    pub const LOG_BOILER_BUFFER_TEMP_MIN: &str = "logBoilerBufferTempMin";
    pub const LOG_BOILER_TEMP_MIN: &str = "logBoilerTempMin";
    pub const LOG_BOILER_SPREADING_MIN: &str = "logBoilerSpreadingMin";
    pub const LOG_BOILER_PUMP_SPEED_MIN: &str = "logBoilerPumpSpeedMin";
    pub const RELAY: &str = "relay";
    pub const HEATING_PUMP_IS_ON: &str = "heatingPumpIsOn";
    pub const UNKNOWN_RELAY_STATE_1_IS_ON: &str = "unknownRelayState1IsOn";
    pub const UNKNOWN_RELAY_STATE_2_IS_ON: &str = "unknownRelayState2IsOn";
    pub const BURNER_RELAY_IS_ON: &str = "burnerRelayIsOn";
    pub const MIXER_1_IS_ON_WARM: &str = "mixer1IsOnWarm";
    pub const MIXER_1_IS_ON_COOL: &str = "mixer1IsOnCool";
    pub const CHARGE_PUMP_IS_ON: &str = "chargePumpIsOn";
    pub const CIRCULATION_PUMP_IS_ON: &str = "circulationPumpIsOn";
    pub const BOILER_RELAY_IS_ON: &str = "boilerRelayIsOn";
    pub const UNKNOWN_RELAY_STATE_5_IS_ON: &str = "unknownRelayState5IsOn";
    pub const LOG_BOILER_CHARGE_PUMP_IS_ON: &str = "logBoilerChargePumpIsOn";
    pub const LED_BOILER_IS_ON: &str = "ledBoilerIsOn";
    pub const HEATING_PUMP_SPEED_ACTUAL: &str = "heatingPumpSpeedActual";
    pub const BOILER_PUMP_SPEED_ACTUAL: &str = "boilerPumpSpeedActual";
    pub const ERROR: &str = "error";
    pub const OPERATION_MODE_X: &str = "operationModeX";
    pub const HEATING_OPERATION_MODE_X: &str = "heatingOperationModeX";
    pub const CIRCUIT_1_OPERATION_MODE: &str = "circuit1OperationMode";
    pub const LOG_BOILER_PUMP_SPEED_ACTUAL: &str = "logBoilerPumpSpeedActual";
    pub const LOG_BOILER_OPERATION_MODE: &str = "logBoilerOperationMode";
    pub const BOILER_OPERATION_MODE: &str = "boilerOperationMode";
    pub const CIRCULATION_OPERATION_MODE: &str = "circulationOperationMode";
}

/// Relay word bits
pub mod masks {
    pub const HEATING_PUMP: u32 = 0x0001;
    pub const UNKNOWN_1: u32 = 0x0002;
    pub const UNKNOWN_2: u32 = 0x0003;
    pub const BURNER: u32 = 0x0004;
    pub const MIXER_WARM: u32 = 0x0008;
    pub const MIXER_COOL: u32 = 0x0010;
    pub const CHARGE_PUMP: u32 = 0x0080;
    pub const CIRCULATION_PUMP: u32 = 0x0100;
    pub const BOILER: u32 = 0x0200;
    pub const UNKNOWN_5: u32 = 0x0800;
    pub const LOG_BOILER_CHARGE_PUMP: u32 = 0x1000;
    pub const LED_BOILER: u32 = 0x2000;

    pub const LOG_BOILER_PARALLEL_OPERATION: u32 = 0x0008;
    pub const BOILER_HEATS_BUFFER: u32 = 0x0010;
}

fn systa_comfort_fields() -> Vec<FieldSpec> {
    use names::*;

    let temperatures = [
        OUTSIDE_TEMP,
        CIRCUIT_1_FLOW_TEMP,
        CIRCUIT_1_RETURN_TEMP,
        HOT_WATER_TEMP,
        BUFFER_TEMP_TOP,
        BUFFER_TEMP_BOTTOM,
        CIRCULATION_TEMP,
        CIRCUIT_2_FLOW_TEMP,
        CIRCUIT_2_RETURN_TEMP,
        ROOM_TEMP_ACTUAL_1,
        ROOM_TEMP_ACTUAL_2,
        COLLECTOR_TEMP_ACTUAL,
        BOILER_FLOW_TEMP,
        BOILER_RETURN_TEMP,
        LOG_BOILER_FLOW_TEMP,
        LOG_BOILER_RETURN_TEMP,
        LOG_BOILER_BUFFER_TEMP_TOP,
        SWIMMINGPOOL_TEMP,
        SWIMMINGPOOL_FLOW_TEMP,
        SWIMMINGPOOL_RETURN_TEMP,
    ];
    let mut fields: Vec<FieldSpec> = temperatures
        .iter()
        .enumerate()
        .map(|(offset, name)| FieldSpec::tenths(*name, offset))
        .collect();

    fields.extend([
        FieldSpec::tenths(HOT_WATER_TEMP_SET, 22),
        FieldSpec::tenths(ROOM_TEMP_SET_1, 23),
        FieldSpec::tenths(CIRCUIT_1_FLOW_TEMP_SET, 24),
        FieldSpec::tenths(CIRCUIT_2_FLOW_TEMP_SET, 25),
        FieldSpec::tenths(ROOM_TEMP_SET_2, 26),
        FieldSpec::tenths(BUFFER_TEMP_SET, 33),
        FieldSpec::tenths(BOILER_TEMP_SET, 34),
        FieldSpec::raw(OPERATION_MODE, 36),
        FieldSpec::tenths(ROOM_TEMP_SET_NORMAL, 39),
        FieldSpec::tenths(ROOM_TEMP_SET_COMFORT, 40),
        FieldSpec::tenths(ROOM_TEMP_SET_LOWERING, 41),
        FieldSpec::raw(HEATING_OPERATION_MODE, 42),
        FieldSpec::raw(CONTROLLED_BY, 47),
        FieldSpec::tenths(HEATING_CURVE_BASE_POINT, 48),
        FieldSpec::tenths(HEATING_CURVE_GRADIENT, 50),
        FieldSpec::tenths(MAX_FLOW_TEMP, 52),
        FieldSpec::tenths(HEATING_LIMIT_TEMP, 53),
        FieldSpec::tenths(HEATING_LIMIT_TEMP_LOWERING, 54),
        FieldSpec::tenths(ANTI_FREEZE_OUTSIDE_TEMP, 55),
        FieldSpec::raw(HEAT_UP_TIME, 56),
        FieldSpec::tenths(ROOM_IMPACT, 57),
        FieldSpec::raw(BOILER_SUPERELEVATION, 58),
        FieldSpec::tenths(HEATING_CIRCUIT_SPREADING, 59),
        FieldSpec::raw(HEATING_PUMP_SPEED_MIN, 60),
        FieldSpec::raw(MIXER_RUNTIME, 62),
        FieldSpec::tenths(ROOM_TEMP_CORRECTION, 65),
        FieldSpec::tenths(UNDERFLOOR_HEATING_BASE_POINT, 87),
        FieldSpec::tenths(UNDERFLOOR_HEATING_GRADIENT, 89),
        FieldSpec::tenths(HOT_WATER_TEMP_NORMAL, 149),
        FieldSpec::tenths(HOT_WATER_TEMP_COMFORT, 150),
        FieldSpec::raw(HOT_WATER_OPERATION_MODE, 151),
        FieldSpec::tenths(HOT_WATER_HYSTERESIS, 155),
        FieldSpec::tenths(HOT_WATER_TEMP_MAX, 156),
        FieldSpec::raw(BUFFER_TYPE, 157),
        FieldSpec::raw(HEATING_PUMP_OVERRUN, 158),
        FieldSpec::tenths(BUFFER_TEMP_MAX, 159),
        FieldSpec::tenths(BUFFER_TEMP_MIN, 160),
        FieldSpec::tenths(BOILER_HYSTERESIS, 161),
        FieldSpec::raw(BOILER_OPERATION_TIME, 162),
        FieldSpec::tenths(BOILER_SHUTDOWN_TEMP, 163),
        FieldSpec::raw(BOILER_PUMP_SPEED_MIN, 164),
        FieldSpec::raw(CIRCULATION_PUMP_OVERRUN, 169),
        FieldSpec::raw(CIRCULATION_LOCKOUT_TIME_PUSH_BUTTON, 170),
        FieldSpec::tenths(CIRCULATION_HYSTERESIS, 171),
        FieldSpec::raw(LOG_BOILER_SETTINGS, 175).unsigned(),
        FieldSpec::flag(LOG_BOILER_PARALLEL_OPERATION, 175, masks::LOG_BOILER_PARALLEL_OPERATION),
        FieldSpec::flag(BOILER_HEATS_BUFFER, 175, masks::BOILER_HEATS_BUFFER),
        FieldSpec::tenths(ADJUST_ROOM_TEMP_BY, 176),
        FieldSpec::raw(BOILER_OPERATION_TIME_HOURS, 179),
        FieldSpec::raw(BOILER_OPERATION_TIME_MINUTES, 180),
        FieldSpec::raw(BURNER_NUMBER_OF_STARTS, 181),
        FieldSpec::tenths(SOLAR_POWER_ACTUAL, 182),
        FieldSpec::tenths(SOLAR_GAIN_DAY, 183),
        FieldSpec::tenths(SOLAR_GAIN_TOTAL, 184),
        FieldSpec::raw(SYSTEM_NUMBER_OF_STARTS, 185),
        FieldSpec::raw(CIRCUIT_1_LEAD_TIME, 186),
        FieldSpec::raw(CIRCUIT_2_LEAD_TIME, 187),
        FieldSpec::raw(CIRCUIT_3_LEAD_TIME, 188),
        FieldSpec::tenths(LOG_BOILER_BUFFER_TEMP_MIN, 189),
        FieldSpec::tenths(LOG_BOILER_TEMP_MIN, 190),
        FieldSpec::raw(LOG_BOILER_SPREADING_MIN, 191),
        FieldSpec::raw(LOG_BOILER_PUMP_SPEED_MIN, 192),
        FieldSpec::raw(RELAY, 220).unsigned(),
        FieldSpec::flag(HEATING_PUMP_IS_ON, 220, masks::HEATING_PUMP),
        FieldSpec::flag(UNKNOWN_RELAY_STATE_1_IS_ON, 220, masks::UNKNOWN_1),
        FieldSpec::flag(UNKNOWN_RELAY_STATE_2_IS_ON, 220, masks::UNKNOWN_2),
        FieldSpec::flag(BURNER_RELAY_IS_ON, 220, masks::BURNER),
        FieldSpec::flag(MIXER_1_IS_ON_WARM, 220, masks::MIXER_WARM),
        FieldSpec::flag(MIXER_1_IS_ON_COOL, 220, masks::MIXER_COOL),
        FieldSpec::flag(CHARGE_PUMP_IS_ON, 220, masks::CHARGE_PUMP),
        FieldSpec::flag(CIRCULATION_PUMP_IS_ON, 220, masks::CIRCULATION_PUMP),
        FieldSpec::flag(BOILER_RELAY_IS_ON, 220, masks::BOILER),
        FieldSpec::flag(UNKNOWN_RELAY_STATE_5_IS_ON, 220, masks::UNKNOWN_5),
        FieldSpec::flag(LOG_BOILER_CHARGE_PUMP_IS_ON, 220, masks::LOG_BOILER_CHARGE_PUMP),
        FieldSpec::flag(LED_BOILER_IS_ON, 220, masks::LED_BOILER),
        FieldSpec::new(HEATING_PUMP_SPEED_ACTUAL, 221, Scale::Multiply(5)),
        FieldSpec::new(BOILER_PUMP_SPEED_ACTUAL, 227, Scale::Multiply(5)),
        FieldSpec::raw(ERROR, 228),
        FieldSpec::raw(OPERATION_MODE_X, 230),
        FieldSpec::raw(HEATING_OPERATION_MODE_X, 231),
        FieldSpec::raw(CIRCUIT_1_OPERATION_MODE, 232),
        FieldSpec::new(LOG_BOILER_PUMP_SPEED_ACTUAL, 246, Scale::Multiply(5)),
        FieldSpec::raw(LOG_BOILER_OPERATION_MODE, 247),
        FieldSpec::raw(BOILER_OPERATION_MODE, 248),
        FieldSpec::raw(CIRCULATION_OPERATION_MODE, 249),
    ]);
    fields
}
