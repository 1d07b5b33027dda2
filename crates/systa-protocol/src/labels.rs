//! Human readable names for enumerated status values

pub const OPERATION_MODES: [&str; 16] = [
    "Auto Prog. 1",
    "Auto Prog. 2",
    "Auto Prog. 3",
    "Continuous Normal",
    "Continuous Comfort",
    "Continuous Lowering",
    "Summer",
    "Off",
    "Party",
    "undef",
    "undef",
    "undef",
    "manual",
    "Test",
    "chimney",
    "undef",
];

pub const HEATING_OPERATION_MODES: [&str; 4] = ["off", "normal", "comfort", "lowering"];

pub const HOT_WATER_OPERATION_MODES: [&str; 4] = ["off", "normal", "comfort", "locked"];

pub const BOILER_OPERATION_MODES: [&str; 14] = [
    "off",
    "manual",
    "hot water",
    "heating circuit",
    "blocked (log boiler)",
    "blocked (pellet stove)",
    "blocked (outside temperature)",
    "cooling mode",
    "hot water (combi boiler)",
    "hot water (slave)",
    "cooling mode (slave)",
    "heating circuit (slave)",
    "minimum running time",
    "start delay active",
];

pub const CONTROL_METHODS: [&str; 3] = ["external temp", "room temp", "ext./room temp combined"];

/// Indexed by the derived mixer state
pub const MIXER_STATES: [&str; 4] = ["off", "warm", "cool", "undefined"];

fn lookup(labels: &'static [&'static str], value: i64) -> Option<&'static str> {
    usize::try_from(value).ok().and_then(|i| labels.get(i).copied())
}

pub fn operation_mode(value: i64) -> Option<&'static str> {
    lookup(&OPERATION_MODES, value)
}

pub fn heating_operation_mode(value: i64) -> Option<&'static str> {
    lookup(&HEATING_OPERATION_MODES, value)
}

pub fn hot_water_operation_mode(value: i64) -> Option<&'static str> {
    lookup(&HOT_WATER_OPERATION_MODES, value)
}

pub fn boiler_operation_mode(value: i64) -> Option<&'static str> {
    lookup(&BOILER_OPERATION_MODES, value)
}

pub fn control_method(value: i64) -> Option<&'static str> {
    lookup(&CONTROL_METHODS, value)
}

pub fn mixer_state(value: u8) -> Option<&'static str> {
    lookup(&MIXER_STATES, i64::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_bounds() {
        assert_eq!(operation_mode(0), Some("Auto Prog. 1"));
        assert_eq!(operation_mode(14), Some("chimney"));
        assert_eq!(operation_mode(16), None);
        assert_eq!(operation_mode(-1), None);
        assert_eq!(boiler_operation_mode(13), Some("start delay active"));
        assert_eq!(hot_water_operation_mode(3), Some("locked"));
        assert_eq!(mixer_state(1), Some("warm"));
    }
}
