use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::source::PartitionedSource;
use super::stream::EntityStream;
use crate::ReplayError;
use crate::config::{ReplayConfig, ReplayMode, validate_speed_multiplier};
use crate::sink::BatchSink;
use crate::telemetry::{Entity, EntityId, Sample};

/// Longest single sleep while waiting for a due sample, so a stop request is
/// noticed promptly.
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Items handed to the sink on every wake. Always holds exactly one item.
pub type Batch = Vec<(Arc<Entity>, Sample)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PacingOptions {
    pub mode: ReplayMode,
    /// Replay speed relative to the recording, 2.0 replays twice as fast
    pub speed_multiplier: f64,
    /// How far behind a due time the scheduler may fall before warning
    pub lag_warning: Duration,
}

impl Default for PacingOptions {
    fn default() -> Self {
        Self {
            mode: ReplayMode::Realtime,
            speed_multiplier: 1.0,
            lag_warning: Duration::from_millis(250),
        }
    }
}

impl PacingOptions {
    pub fn accelerated() -> Self {
        Self {
            mode: ReplayMode::Accelerated,
            ..Default::default()
        }
    }
}

impl From<&ReplayConfig> for PacingOptions {
    fn from(config: &ReplayConfig) -> Self {
        Self {
            mode: config.mode,
            speed_multiplier: config.speed_multiplier,
            lag_warning: Duration::from_millis(config.lag_warning_ms),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayStats {
    pub emitted: usize,
    pub emitted_per_entity: HashMap<EntityId, usize>,
    pub lag_warnings: usize,
    pub max_lag: Duration,
    pub wall_time: Duration,
}

/// Queue entry for a live stream, ordered so the heap pops the earliest due
/// time first and breaks ties by enumeration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Due {
    at: Instant,
    order: usize,
}

impl PartialOrd for Due {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Due {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse ordering for min-heap (earliest time first)
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Merges every entity stream of a session into one time-ordered sequence of
/// single-item batches.
///
/// In realtime mode each sample is held back until its due time (scaled by the
/// speed multiplier); a sample whose due time already passed goes out at once.
/// In accelerated mode nothing waits and only the order is kept.
pub struct Scheduler {
    streams: Vec<EntityStream>,
    queue: BinaryHeap<Due>,
    options: PacingOptions,
    origin: Instant,
    started: Option<Instant>,
    stats: ReplayStats,
}

impl Scheduler {
    pub fn new<P>(source: &P, options: PacingOptions) -> Result<Self, ReplayError>
    where
        P: PartitionedSource + ?Sized,
    {
        Self::with_origin(source, options, Instant::now())
    }

    /// Builds the scheduler with every stream due first at `origin`.
    pub fn with_origin<P>(
        source: &P,
        options: PacingOptions,
        origin: Instant,
    ) -> Result<Self, ReplayError>
    where
        P: PartitionedSource + ?Sized,
    {
        validate_speed_multiplier(options.speed_multiplier)?;

        let streams = source
            .list_entities()
            .iter()
            .map(|id| source.build_stream(id, origin))
            .collect::<Result<Vec<_>, _>>()?;

        let mut queue = BinaryHeap::with_capacity(streams.len());
        for (order, stream) in streams.iter().enumerate() {
            if stream.is_exhausted() {
                debug!(
                    "No telemetry for {}, not scheduling it",
                    stream.entity().abbreviation
                );
                continue;
            }
            queue.push(Due {
                at: stream.next_emit_time(),
                order,
            });
        }

        info!(
            "Replaying {} streams in {:?} mode at {}x",
            queue.len(),
            options.mode,
            options.speed_multiplier
        );
        Ok(Self {
            streams,
            queue,
            options,
            origin,
            started: None,
            stats: ReplayStats::default(),
        })
    }

    pub fn state(&self) -> SessionState {
        if self.queue.is_empty() {
            SessionState::Terminated
        } else {
            SessionState::Running
        }
    }

    /// Number of streams that still have samples to emit
    pub fn live_streams(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    /// Waits until the earliest live stream is due and emits its next sample.
    /// Returns `None` once every stream is exhausted.
    pub fn next_batch(&mut self) -> Option<Batch> {
        self.next_batch_until(&AtomicBool::new(false))
    }

    /// Like [`Scheduler::next_batch`], but gives up waiting as soon as `stop` is
    /// set. A stop leaves the scheduler untouched, so it can be resumed.
    pub fn next_batch_until(&mut self, stop: &AtomicBool) -> Option<Batch> {
        self.started.get_or_insert_with(Instant::now);
        loop {
            let due = *self.queue.peek()?;
            if self.streams[due.order].is_exhausted() {
                self.retire(due);
                continue;
            }

            if self.options.mode == ReplayMode::Realtime {
                let wake = self.wake_time(due.at);
                if !wait_until(wake, stop) {
                    return None;
                }
                self.track_lag(wake);
            } else if stop.load(Ordering::Relaxed) {
                return None;
            }

            self.queue.pop();
            let stream = &mut self.streams[due.order];
            match stream.advance() {
                Ok(sample) => {
                    let entity = stream.entity().clone();
                    if !stream.is_exhausted() {
                        self.queue.push(Due {
                            at: stream.next_emit_time(),
                            order: due.order,
                        });
                    } else {
                        debug!("{} finished replaying", entity.abbreviation);
                    }
                    self.stats.emitted += 1;
                    *self
                        .stats
                        .emitted_per_entity
                        .entry(entity.id.clone())
                        .or_insert(0) += 1;
                    return Some(vec![(entity, sample)]);
                }
                Err(ReplayError::StreamExhausted { entity }) => {
                    debug!("Stream {} exhausted, removing it", entity);
                }
                Err(e) => {
                    error!("Dropping stream {}: {}", stream.entity().id, e);
                }
            }
        }
    }

    /// Drives the replay to the end, handing every batch to `sink` before the
    /// next wake is computed. Stops early between emissions when `stop` is set.
    pub fn run<S>(&mut self, sink: &mut S, stop: &AtomicBool) -> ReplayStats
    where
        S: BatchSink + ?Sized,
    {
        let start = Instant::now();
        while let Some(batch) = self.next_batch_until(stop) {
            sink.write_batch(&batch);
            if stop.load(Ordering::Relaxed) {
                break;
            }
        }
        self.stats.wall_time = self.started.map(|s| s.elapsed()).unwrap_or(start.elapsed());

        match self.state() {
            SessionState::Terminated => info!(
                "Replay finished: {} samples in {:?}",
                self.stats.emitted, self.stats.wall_time
            ),
            SessionState::Running => info!(
                "Replay stopped after {} samples, {} streams still live",
                self.stats.emitted,
                self.live_streams()
            ),
        }
        if self.stats.lag_warnings > 0 {
            warn!(
                "Replay fell behind {} times, max lag {:?}",
                self.stats.lag_warnings, self.stats.max_lag
            );
        }
        self.stats.clone()
    }

    fn retire(&mut self, due: Due) {
        self.queue.pop();
        debug!(
            "Stream {} exhausted, removing it",
            self.streams[due.order].entity().id
        );
    }

    fn wake_time(&self, due: Instant) -> Instant {
        if self.options.speed_multiplier == 1.0 {
            return due;
        }
        let offset = due.saturating_duration_since(self.origin);
        // out of range only for offsets of centuries, keep the unscaled due time then
        Duration::try_from_secs_f64(offset.as_secs_f64() / self.options.speed_multiplier)
            .ok()
            .and_then(|scaled| self.origin.checked_add(scaled))
            .unwrap_or(due)
    }

    fn track_lag(&mut self, wake: Instant) {
        let lag = Instant::now().saturating_duration_since(wake);
        if lag > self.stats.max_lag {
            self.stats.max_lag = lag;
        }
        if lag > self.options.lag_warning {
            self.stats.lag_warnings += 1;
            warn!("Replay lagging by {}ms", lag.as_millis());
        }
    }
}

/// Sleeps until `wake`, in slices so `stop` is checked regularly. Returns
/// `false` if stopped first. Never sleeps for an instant already in the past.
fn wait_until(wake: Instant, stop: &AtomicBool) -> bool {
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= wake {
            return true;
        }
        thread::sleep((wake - now).min(MAX_SLEEP_SLICE));
    }
}
