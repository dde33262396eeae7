use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HvacMode {
    Heat,
    Cool,
    HeatCool,
    Eco,
    Off,
}

impl HvacMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::HeatCool => "heat-cool",
            Self::Eco => "eco",
            Self::Off => "off",
        }
    }
}

impl std::fmt::Display for HvacMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the equipment is doing right now, as opposed to the mode it was asked to run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacState {
    Heating,
    Cooling,
    Off,
}

impl HvacState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heating => "heating",
            Self::Cooling => "cooling",
            Self::Off => "off",
        }
    }
}

/// The two values fault detection compares between ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reading {
    pub is_cooling: bool,
    pub temperature_f: i32,
}

/// A point-in-time read of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub temperature_f: i32,
    pub mode: HvacMode,
    pub is_cooling: bool,
}

impl Sample {
    pub fn new(temperature_f: i32, mode: HvacMode, state: HvacState) -> Self {
        Self {
            temperature_f,
            mode,
            is_cooling: state == HvacState::Cooling,
        }
    }

    pub fn reading(&self) -> Reading {
        Reading {
            is_cooling: self.is_cooling,
            temperature_f: self.temperature_f,
        }
    }
}
