use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use crate::ReplayError;
use crate::telemetry::{Entity, Sample};

/// Lifecycle of an [`EntityStream`]. There is no way back from `Exhausted`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Fresh,
    Active,
    Exhausted,
}

/// Forward-only cursor over one driver's samples, paced against the wall clock.
///
/// The stream is due at its construction instant for the first sample. Every
/// later sample is due after the recorded gap to the sample before it, so
/// sample `k` is due at `origin + (t_k - t_0)` whatever wall-clock instant the
/// replay starts at.
#[derive(Debug)]
pub struct EntityStream {
    entity: Arc<Entity>,
    samples: Vec<Sample>,
    cursor: usize,
    last_time: Option<u64>,
    next_emit: Instant,
}

impl EntityStream {
    pub fn new(entity: Arc<Entity>, samples: Vec<Sample>, origin: Instant) -> Self {
        Self {
            entity,
            samples,
            cursor: 0,
            last_time: None,
            next_emit: origin,
        }
    }

    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    /// Wall-clock instant the next sample is due.
    pub fn next_emit_time(&self) -> Instant {
        self.next_emit
    }

    /// Timestamp of the most recently emitted sample
    pub fn last_time(&self) -> Option<u64> {
        self.last_time
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.samples.len()
    }

    pub fn state(&self) -> StreamState {
        if self.is_exhausted() {
            StreamState::Exhausted
        } else if self.cursor == 0 {
            StreamState::Fresh
        } else {
            StreamState::Active
        }
    }

    /// Emits the next sample in source order and moves the due time forward by
    /// the recorded gap to the sample after it.
    pub fn advance(&mut self) -> Result<Sample, ReplayError> {
        let sample = self
            .samples
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| ReplayError::StreamExhausted {
                entity: self.entity.id.clone(),
            })?;
        self.cursor += 1;
        self.last_time = Some(sample.timestamp_ms);

        match self.samples.get(self.cursor) {
            Some(next) => {
                // a timestamp going backwards yields a zero gap, never a rewind
                let gap_ms = next.timestamp_ms.saturating_sub(sample.timestamp_ms);
                self.next_emit += Duration::from_millis(gap_ms);
            }
            None => debug!(
                "Telemetry stream for {} exhausted after {} samples",
                self.entity.abbreviation,
                self.samples.len()
            ),
        }

        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples_at(times: &[u64]) -> Vec<Sample> {
        times
            .iter()
            .map(|t| Sample {
                timestamp_ms: *t,
                ..Sample::default()
            })
            .collect()
    }

    fn stream(times: &[u64], origin: Instant) -> EntityStream {
        EntityStream::new(
            Arc::new(Entity::new("1", "VER", "3671C6")),
            samples_at(times),
            origin,
        )
    }

    #[test]
    fn test_first_sample_due_at_construction() {
        let origin = Instant::now();
        let stream = stream(&[5_000, 6_000], origin);
        assert_eq!(stream.next_emit_time(), origin);
        assert_eq!(stream.state(), StreamState::Fresh);
        assert_eq!(stream.last_time(), None);
    }

    #[test]
    fn test_gaps_are_preserved() {
        let origin = Instant::now();
        let mut stream = stream(&[5_000, 6_000, 6_000, 8_500], origin);

        let first = stream.advance().unwrap();
        assert_eq!(first.timestamp_ms, 5_000);
        assert_eq!(stream.state(), StreamState::Active);
        assert_eq!(stream.next_emit_time() - origin, Duration::from_millis(1_000));

        stream.advance().unwrap();
        assert_eq!(stream.next_emit_time() - origin, Duration::from_millis(1_000));

        stream.advance().unwrap();
        assert_eq!(stream.next_emit_time() - origin, Duration::from_millis(3_500));
        assert_eq!(stream.last_time(), Some(6_000));

        let last = stream.advance().unwrap();
        assert_eq!(last.timestamp_ms, 8_500);
        assert_eq!(stream.next_emit_time() - origin, Duration::from_millis(3_500));
        assert_eq!(stream.state(), StreamState::Exhausted);
    }

    #[test]
    fn test_exhausted_stream_keeps_failing() {
        let mut stream = stream(&[0], Instant::now());
        stream.advance().unwrap();
        for _ in 0..2 {
            match stream.advance() {
                Err(ReplayError::StreamExhausted { entity }) => assert_eq!(entity.as_str(), "1"),
                other => panic!("Expected StreamExhausted, got {:?}", other),
            }
        }
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn test_empty_stream_is_exhausted_from_the_start() {
        let stream = stream(&[], Instant::now());
        assert!(stream.is_exhausted());
        assert_eq!(stream.state(), StreamState::Exhausted);
    }

    #[test]
    fn test_backwards_timestamp_does_not_rewind() {
        let origin = Instant::now();
        let mut stream = stream(&[1_000, 3_000, 2_000], origin);
        stream.advance().unwrap();
        let due = stream.next_emit_time();
        stream.advance().unwrap();
        assert_eq!(stream.next_emit_time(), due);
    }
}
