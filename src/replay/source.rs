use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use itertools::Itertools;
use log::{debug, info, warn};

use super::stream::EntityStream;
use crate::ReplayError;
use crate::telemetry::{Entity, EntityId, Sample, Session, load_session_jsonl};

/// A fixed set of independently replayable partitions, one per entity.
///
/// # Lifecycle
///
/// 1. Call `list_entities()` once to learn the universe of the session. The
///    order is the enumeration order used to break scheduling ties.
/// 2. Call `build_stream()` for every listed entity.
/// 3. Read `reference_path()` whenever the static track overlay is needed.
pub trait PartitionedSource {
    /// The participants of this session, stable for its lifetime.
    fn list_entities(&self) -> Vec<EntityId>;

    /// Build a stream over the full sample table of `entity`, due first at `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::UnknownEntity`] if `entity` is not part of `list_entities()`.
    fn build_stream(&self, entity: &EntityId, origin: Instant)
    -> Result<EntityStream, ReplayError>;

    /// Positional trace of the fastest recorded lap, used as the track outline.
    fn reference_path(&self) -> &[(f32, f32)];
}

/// [`PartitionedSource`] over a fully loaded [`Session`]
pub struct SessionSource {
    session: Session,
    entities: Vec<Arc<Entity>>,
    reference_path: Vec<(f32, f32)>,
}

impl SessionSource {
    /// Drivers listed more than once are dropped, keeping the first entry.
    pub fn new(mut session: Session) -> Self {
        let mut seen = HashSet::new();
        session.drivers.retain(|d| {
            let first = seen.insert(d.entity.id.clone());
            if !first {
                warn!(
                    "Driver {} listed more than once, keeping the first entry",
                    d.entity.id
                );
            }
            first
        });

        let entities = session
            .drivers
            .iter()
            .map(|d| Arc::new(d.entity.clone()))
            .collect();
        let reference_path = reference_path(&session);
        Self {
            session,
            entities,
            reference_path,
        }
    }

    pub fn from_file(file: &Path) -> Result<Self, ReplayError> {
        Ok(Self::new(load_session_jsonl(file)?))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Arc<Entity>> {
        self.entities.iter().find(|e| &e.id == id)
    }
}

impl PartitionedSource for SessionSource {
    fn list_entities(&self) -> Vec<EntityId> {
        self.entities.iter().map(|e| e.id.clone()).collect()
    }

    fn build_stream(
        &self,
        entity: &EntityId,
        origin: Instant,
    ) -> Result<EntityStream, ReplayError> {
        let telemetry = self
            .session
            .driver(entity)
            .ok_or_else(|| ReplayError::UnknownEntity {
                entity: entity.clone(),
            })?;
        let entity = self
            .entity(entity)
            .cloned()
            .unwrap_or_else(|| Arc::new(telemetry.entity.clone()));

        info!(
            "Building input for {} ({} samples)",
            entity.abbreviation,
            telemetry.samples.len()
        );
        Ok(EntityStream::new(
            entity,
            telemetry.samples.clone(),
            origin,
        ))
    }

    fn reference_path(&self) -> &[(f32, f32)] {
        &self.reference_path
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LapSpan {
    driver: usize,
    lap_number: u32,
    duration_ms: u64,
}

/// Laps in the order they were first seen, timed from their first to last
/// sample. Samples of a lap are grouped even when other laps interleave.
fn observed_laps(driver: usize, samples: &[Sample]) -> Vec<LapSpan> {
    let times = samples
        .iter()
        .filter_map(|s| Some((s.lap_number?, s.timestamp_ms)))
        .into_group_map();

    samples
        .iter()
        .filter_map(|s| s.lap_number)
        .unique()
        .filter_map(|lap_number| {
            let (first, last) = times.get(&lap_number)?.iter().minmax().into_option()?;
            Some(LapSpan {
                driver,
                lap_number,
                duration_ms: last - first,
            })
        })
        .collect()
}

/// Picks the fastest lap of the session.
///
/// Recorded lap times win when the session has them. Otherwise laps are timed
/// from their samples, skipping each driver's first and last lap as those are
/// usually partial. If no complete lap exists the longest observed one is used.
fn fastest_lap(session: &Session) -> Option<LapSpan> {
    let has_samples = |driver: usize, lap_number: u32| {
        session.drivers[driver]
            .samples
            .iter()
            .filter(|s| s.lap_number == Some(lap_number))
            .count()
            >= 2
    };

    let recorded = session
        .drivers
        .iter()
        .enumerate()
        .flat_map(|(driver, d)| {
            d.laps.iter().map(move |lap| LapSpan {
                driver,
                lap_number: lap.lap_number,
                duration_ms: lap.lap_time_ms,
            })
        })
        .filter(|lap| has_samples(lap.driver, lap.lap_number))
        .min_by_key(|lap| lap.duration_ms);
    if recorded.is_some() {
        return recorded;
    }

    let observed: Vec<Vec<LapSpan>> = session
        .drivers
        .iter()
        .enumerate()
        .map(|(driver, d)| observed_laps(driver, &d.samples))
        .collect();

    let complete = observed
        .iter()
        .filter(|laps| laps.len() > 2)
        .flat_map(|laps| laps[1..laps.len() - 1].iter())
        .filter(|lap| lap.duration_ms > 0)
        .min_by_key(|lap| lap.duration_ms)
        .copied();
    if complete.is_some() {
        return complete;
    }

    observed
        .iter()
        .flatten()
        .max_by_key(|lap| lap.duration_ms)
        .copied()
}

fn reference_path(session: &Session) -> Vec<(f32, f32)> {
    match fastest_lap(session) {
        Some(lap) => {
            let driver = &session.drivers[lap.driver];
            let path: Vec<(f32, f32)> = driver
                .samples
                .iter()
                .filter(|s| s.lap_number == Some(lap.lap_number))
                .map(|s| (s.x, s.y))
                .collect();
            info!(
                "Reference path from lap {} of {} ({} ms, {} points)",
                lap.lap_number,
                driver.entity.abbreviation,
                lap.duration_ms,
                path.len()
            );
            path
        }
        None => {
            // no lap information at all, trace the first driver with data
            let path: Vec<(f32, f32)> = session
                .drivers
                .iter()
                .find(|d| !d.samples.is_empty())
                .map(|d| d.samples.iter().map(|s| (s.x, s.y)).collect())
                .unwrap_or_default();
            debug!(
                "No lap information in session, reference path has {} points",
                path.len()
            );
            path
        }
    }
}
