pub mod memory;

use std::collections::HashMap;
use std::sync::Arc;

use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::ReplayError;
use crate::config::{ReplayConfig, TimeAxis, TimelineLayout};
use crate::telemetry::{Entity, EntityId, Rgb, Sample, parse_team_color};

pub use memory::{CountingTarget, RecordingTarget};

/// Timeline used by every driver when the layout is [`TimelineLayout::Shared`]
pub const SHARED_TIMELINE: &str = "replay";
pub const TRACK_OUTLINE_PATH: &str = "track/outline";

/// Time coordinate set on a timeline before records are logged on it
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TimeValue {
    Seconds(f64),
    Milliseconds(u64),
}

/// One call made against a [`VisualizationTarget`], in serializable form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum VisRecord {
    SetTime {
        timeline: String,
        time: TimeValue,
    },
    Points {
        path: String,
        points: Vec<(f32, f32)>,
        colors: Vec<Rgb>,
        radius: f32,
    },
    LineStrip {
        path: String,
        points: Vec<(f32, f32)>,
        radius: f32,
        draw_order: f32,
        is_static: bool,
    },
    Scalar {
        path: String,
        value: f64,
    },
}

/// The external visualization boundary.
///
/// A target is created once per session and lent to the sink; nothing about it
/// is global. Paths use `/` as the hierarchy separator.
pub trait VisualizationTarget {
    /// Set the time used by the following records on `timeline`.
    fn set_time(&mut self, timeline: &str, time: TimeValue) -> Result<(), ReplayError>;

    fn log_points(
        &mut self,
        path: &str,
        points: &[(f32, f32)],
        colors: &[Rgb],
        radius: f32,
    ) -> Result<(), ReplayError>;

    /// Log a connected line through `points`. Static records are not bound to
    /// any timeline.
    fn log_line_strip(
        &mut self,
        path: &str,
        points: &[(f32, f32)],
        radius: f32,
        draw_order: f32,
        is_static: bool,
    ) -> Result<(), ReplayError>;

    fn log_scalar(&mut self, path: &str, value: f64) -> Result<(), ReplayError>;

    fn flush(&mut self) -> Result<(), ReplayError> {
        Ok(())
    }
}

/// Consumer of the batches produced by the scheduler
pub trait BatchSink {
    fn write_batch(&mut self, items: &[(Arc<Entity>, Sample)]);
}

#[derive(Clone, Debug, PartialEq)]
pub struct SinkOptions {
    pub time_axis: TimeAxis,
    pub timeline_layout: TimelineLayout,
    pub point_radius: f32,
    pub track_radius: f32,
    pub fallback_color: Rgb,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            time_axis: TimeAxis::Seconds,
            timeline_layout: TimelineLayout::PerEntity,
            point_radius: 60.,
            track_radius: 20.,
            fallback_color: Rgb::GREY,
        }
    }
}

impl SinkOptions {
    pub fn from_config(config: &ReplayConfig) -> Result<Self, ReplayError> {
        Ok(Self {
            time_axis: config.time_axis,
            timeline_layout: config.timeline_layout,
            point_radius: config.point_radius,
            track_radius: config.track_radius,
            fallback_color: parse_team_color(&config.fallback_color)?,
        })
    }
}

/// Projects replayed samples onto a [`VisualizationTarget`].
///
/// The timestamp of the first sample the sink ever sees becomes the time
/// origin; every record is tagged with the time elapsed since then.
pub struct TelemetrySink<'t, T: VisualizationTarget + ?Sized> {
    target: &'t mut T,
    options: SinkOptions,
    start_time: Option<u64>,
    colors: HashMap<EntityId, Rgb>,
    skipped: usize,
}

impl<'t, T: VisualizationTarget + ?Sized> TelemetrySink<'t, T> {
    pub fn new(target: &'t mut T, options: SinkOptions) -> Self {
        Self {
            target,
            options,
            start_time: None,
            colors: HashMap::new(),
            skipped: 0,
        }
    }

    /// Timestamp of the first sample written to this sink
    pub fn start_time(&self) -> Option<u64> {
        self.start_time
    }

    /// Number of samples whose projection failed
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Logs the static track outline. Meant to be called once per session.
    pub fn log_reference_path(&mut self, points: &[(f32, f32)]) -> Result<(), ReplayError> {
        self.target.log_line_strip(
            TRACK_OUTLINE_PATH,
            points,
            self.options.track_radius,
            -1.0,
            true,
        )
    }

    pub fn flush(&mut self) -> Result<(), ReplayError> {
        self.target.flush()
    }

    fn color_for(&mut self, entity: &Entity) -> Rgb {
        let fallback = self.options.fallback_color;
        *self
            .colors
            .entry(entity.id.clone())
            .or_insert_with(|| match entity.color() {
                Ok(color) => color,
                Err(e) => {
                    warn!(
                        "{} for {}, falling back to {:?}",
                        e, entity.abbreviation, fallback
                    );
                    fallback
                }
            })
    }

    fn project(&mut self, entity: &Entity, sample: &Sample) -> Result<(), ReplayError> {
        let start = *self.start_time.get_or_insert(sample.timestamp_ms);
        let elapsed_ms = sample.timestamp_ms.saturating_sub(start);
        let time = match self.options.time_axis {
            TimeAxis::Seconds => TimeValue::Seconds(elapsed_ms as f64 / 1000.),
            TimeAxis::Milliseconds => TimeValue::Milliseconds(elapsed_ms),
        };
        let timeline = match self.options.timeline_layout {
            TimelineLayout::PerEntity => entity.abbreviation.as_str(),
            TimelineLayout::Shared => SHARED_TIMELINE,
        };
        self.target.set_time(timeline, time)?;

        let color = self.color_for(entity);
        let name = &entity.abbreviation;
        self.target.log_points(
            &format!("track/{}", name),
            &[(sample.x, sample.y)],
            &[color],
            self.options.point_radius,
        )?;

        let channels = [
            ("speed", sample.speed as f64),
            ("rpm", sample.rpm as f64),
            ("gear", sample.gear as f64),
            ("throttle", sample.throttle as f64),
            ("brake", sample.brake as f64),
        ];
        for (channel, value) in channels {
            self.target
                .log_scalar(&format!("telemetry/{}/{}", channel, name), value)?;
        }
        Ok(())
    }
}

impl<T: VisualizationTarget + ?Sized> BatchSink for TelemetrySink<'_, T> {
    fn write_batch(&mut self, items: &[(Arc<Entity>, Sample)]) {
        for (entity, sample) in items {
            if let Err(e) = self.project(entity, sample) {
                self.skipped += 1;
                error!(
                    "Skipping sample of {} at {}ms: {}",
                    entity.abbreviation, sample.timestamp_ms, e
                );
            }
        }
    }
}
