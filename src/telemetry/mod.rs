pub mod loader;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ReplayError;

pub use loader::load_session_jsonl;

/// Stable key of a replayed participant, the driver number in the source data.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A replayed participant and its display metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Short display code, e.g. "VER"
    pub abbreviation: String,
    /// Team color as 6 hex digits, without a leading '#'
    pub team_color: String,
}

impl Entity {
    pub fn new(
        id: impl Into<EntityId>,
        abbreviation: impl Into<String>,
        team_color: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            abbreviation: abbreviation.into(),
            team_color: team_color.into(),
        }
    }

    pub fn color(&self) -> Result<Rgb, ReplayError> {
        parse_team_color(&self.team_color)
    }
}

/// One row of recorded telemetry for one driver
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Absolute sample time in milliseconds
    pub timestamp_ms: u64,
    /// Track position
    pub x: f32,
    pub y: f32,
    /// Speed in km/h
    pub speed: f32,
    /// Engine RPM
    pub rpm: f32,
    /// Current gear
    pub gear: u32,
    /// Throttle use, 0 to 100 percent
    pub throttle: f32,
    /// Brake use, 0 to 100 percent
    pub brake: f32,
    /// Lap this sample was recorded on, if the provider tracks laps
    #[serde(default)]
    pub lap_number: Option<u32>,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            timestamp_ms: 0,
            x: 0.,
            y: 0.,
            speed: 0.,
            rpm: 0.,
            gear: 0,
            throttle: 0.,
            brake: 0.,
            lap_number: None,
        }
    }
}

/// Recorded lap time reported by the provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LapTime {
    pub lap_number: u32,
    pub lap_time_ms: u64,
}

/// Color decoded from a team color string
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const GREY: Rgb = Rgb(0x80, 0x80, 0x80);
}

/// Decodes a 6 hex digit color string, two digits per channel, into an [`Rgb`].
pub fn parse_team_color(value: &str) -> Result<Rgb, ReplayError> {
    let invalid = || ReplayError::InvalidColorFormat {
        value: value.to_string(),
    };
    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |i: usize| u8::from_str_radix(&value[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// Telemetry and lap times for a single driver
#[derive(Clone, Debug, PartialEq)]
pub struct DriverTelemetry {
    pub entity: Entity,
    pub samples: Vec<Sample>,
    pub laps: Vec<LapTime>,
}

impl DriverTelemetry {
    pub fn new(entity: Entity, samples: Vec<Sample>) -> Self {
        Self {
            entity,
            samples,
            laps: Vec::new(),
        }
    }
}

/// A fully loaded replay session. Drivers keep their declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub drivers: Vec<DriverTelemetry>,
}

impl Session {
    pub fn new(drivers: Vec<DriverTelemetry>) -> Self {
        Self { drivers }
    }

    pub fn driver(&self, id: &EntityId) -> Option<&DriverTelemetry> {
        self.drivers.iter().find(|d| &d.entity.id == id)
    }

    pub fn total_samples(&self) -> usize {
        self.drivers.iter().map(|d| d.samples.len()).sum()
    }
}

/// One line of a session file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SessionRecord {
    Driver(Entity),
    Lap {
        driver: EntityId,
        lap_number: u32,
        lap_time_ms: u64,
    },
    DataPoint {
        driver: EntityId,
        sample: Box<Sample>,
    },
}
