use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::ReplayError;
use crate::telemetry::parse_team_color;

const CONFIG_FILE_NAME: &str = "config.json";

/// Accepted replay speeds. Scaled due offsets stay well inside `Duration`.
pub const SPEED_MULTIPLIER_RANGE: RangeInclusive<f64> = 0.01..=1_000.0;

pub(crate) fn validate_speed_multiplier(speed_multiplier: f64) -> Result<(), ReplayError> {
    if !SPEED_MULTIPLIER_RANGE.contains(&speed_multiplier) {
        return Err(ReplayError::InvalidConfig {
            field: "speed_multiplier".to_string(),
            reason: format!(
                "must be between {} and {}, got {}",
                SPEED_MULTIPLIER_RANGE.start(),
                SPEED_MULTIPLIER_RANGE.end(),
                speed_multiplier
            ),
        });
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ReplayMode {
    /// Hold every sample back until its recorded gap has passed
    Realtime,
    /// Emit as fast as the sink drains, keeping only the order
    Accelerated,
}

/// Unit of the time value set on the timeline before each record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum TimeAxis {
    Seconds,
    Milliseconds,
}

/// Whether each driver gets its own timeline or all share one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum TimelineLayout {
    PerEntity,
    Shared,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    pub mode: ReplayMode,
    pub speed_multiplier: f64,
    pub lag_warning_ms: u64,
    pub time_axis: TimeAxis,
    pub timeline_layout: TimelineLayout,
    pub point_radius: f32,
    pub track_radius: f32,
    pub fallback_color: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            mode: ReplayMode::Realtime,
            speed_multiplier: 1.0,
            lag_warning_ms: 250,
            time_axis: TimeAxis::Seconds,
            timeline_layout: TimelineLayout::PerEntity,
            point_radius: 60.,
            track_radius: 20.,
            fallback_color: "808080".to_string(),
        }
    }
}

impl ReplayConfig {
    pub fn default_path() -> Option<PathBuf> {
        Some(
            dirs::config_dir()?
                .join("gridreplay")
                .join(CONFIG_FILE_NAME),
        )
    }

    /// Reads the config from the user's config directory, if one was saved.
    pub fn from_local_file() -> Result<Option<Self>, ReplayError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path).map(Some),
            _ => Ok(None),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ReplayError> {
        debug!("Loading config from {:?}", path);
        let file =
            std::fs::File::open(path).map_err(|e| ReplayError::ConfigIOError { source: e })?;
        let config: Self = serde_json::from_reader(file)
            .map_err(|e| ReplayError::ConfigSerializeError { source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Saves to the user's config directory and returns the path written.
    pub fn save(&self) -> Result<PathBuf, ReplayError> {
        let config_path = Self::default_path().ok_or(ReplayError::NoConfigDir)?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), ReplayError> {
        if let Some(parent) = config_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ReplayError::ConfigIOError { source: e })?;
            }
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| ReplayError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| ReplayError::ConfigSerializeError { source: e })
    }

    pub fn validate(&self) -> Result<(), ReplayError> {
        validate_speed_multiplier(self.speed_multiplier)?;
        if !(self.point_radius > 0. && self.track_radius > 0.) {
            return Err(ReplayError::InvalidConfig {
                field: "radius".to_string(),
                reason: "point and track radius must be positive".to_string(),
            });
        }
        parse_team_color(&self.fallback_color).map_err(|e| ReplayError::InvalidConfig {
            field: "fallback_color".to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}
