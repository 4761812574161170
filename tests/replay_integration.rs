// Integration tests for replaying a recorded session end to end
//
// 1. Write a session file with several drivers
// 2. Load it through SessionSource
// 3. Replay it through the scheduler into a TelemetrySink
// 4. Check the records that reach the visualization target

use std::io::Write;
use std::sync::atomic::AtomicBool;

use gridreplay::replay::{PacingOptions, SessionState};
use gridreplay::sink::{RecordingTarget, SinkOptions, TimeValue, VisRecord};
use gridreplay::telemetry::{Entity, EntityId, Sample, SessionRecord};
use gridreplay::writer::JsonLinesTarget;
use gridreplay::{
    PartitionedSource, ReplayError, Scheduler, SessionSource, TelemetrySink, VisualizationTarget,
};
use tempfile::NamedTempFile;

fn sample(timestamp_ms: u64, lap_number: u32, x: f32) -> Sample {
    Sample {
        timestamp_ms,
        x,
        y: x * 2.,
        speed: 200. + x,
        rpm: 10_000.,
        gear: 6,
        throttle: 100.,
        brake: 0.,
        lap_number: Some(lap_number),
    }
}

/// Three drivers with different sample rates; LEC has a broken team color.
fn write_session() -> NamedTempFile {
    let mut records = vec![
        SessionRecord::Driver(Entity::new("1", "VER", "3671C6")),
        SessionRecord::Driver(Entity::new("16", "LEC", "red")),
        SessionRecord::Driver(Entity::new("4", "NOR", "FF8000")),
    ];
    for i in 0..10u64 {
        records.push(SessionRecord::DataPoint {
            driver: EntityId::from("1"),
            sample: Box::new(sample(1_000 + i * 100, 1 + (i / 4) as u32, i as f32)),
        });
    }
    for i in 0..4u64 {
        records.push(SessionRecord::DataPoint {
            driver: EntityId::from("16"),
            sample: Box::new(sample(1_050 + i * 250, 1, 100. + i as f32)),
        });
    }
    records.push(SessionRecord::Lap {
        driver: EntityId::from("1"),
        lap_number: 2,
        lap_time_ms: 300,
    });

    let mut file = NamedTempFile::new().unwrap();
    for record in &records {
        writeln!(file, "{}", serde_json::to_string(record).unwrap()).unwrap();
    }
    file.flush().unwrap();
    file
}

fn set_times(records: &[VisRecord], timeline: &str) -> Vec<TimeValue> {
    records
        .iter()
        .filter_map(|r| match r {
            VisRecord::SetTime { timeline: t, time } if t == timeline => Some(*time),
            _ => None,
        })
        .collect()
}

#[test]
fn test_full_session_replay() {
    let file = write_session();
    let source = SessionSource::from_file(file.path()).unwrap();
    assert_eq!(
        source.list_entities(),
        vec![EntityId::from("1"), EntityId::from("16"), EntityId::from("4")]
    );

    // recorded lap 2 of VER: samples 4..8
    assert_eq!(
        source.reference_path(),
        &[(4., 8.), (5., 10.), (6., 12.), (7., 14.)]
    );

    let mut target = RecordingTarget::default();
    let mut sink = TelemetrySink::new(&mut target, SinkOptions::default());
    sink.log_reference_path(source.reference_path()).unwrap();

    let mut scheduler = Scheduler::new(&source, PacingOptions::accelerated()).unwrap();
    let stats = scheduler.run(&mut sink, &AtomicBool::new(false));
    assert_eq!(scheduler.state(), SessionState::Terminated);
    assert_eq!(stats.emitted, 14);
    assert_eq!(stats.emitted_per_entity[&EntityId::from("1")], 10);
    assert_eq!(stats.emitted_per_entity[&EntityId::from("16")], 4);
    assert!(!stats.emitted_per_entity.contains_key(&EntityId::from("4")));

    // VER's first sample is the first one the sink ever sees
    assert_eq!(sink.start_time(), Some(1_000));
    assert_eq!(sink.skipped(), 0);

    // outline plus one time, one point and five scalars per sample
    assert_eq!(target.records.len(), 1 + 14 * 7);

    let ver_times = set_times(&target.records, "VER");
    assert_eq!(ver_times.len(), 10);
    assert_eq!(ver_times[0], TimeValue::Seconds(0.));
    assert_eq!(ver_times[9], TimeValue::Seconds(0.9));

    // LEC is timed against VER's first sample, and gets the fallback color
    let lec_times = set_times(&target.records, "LEC");
    assert_eq!(lec_times[0], TimeValue::Seconds(0.05));
    assert!(target.records.iter().any(|r| matches!(
        r,
        VisRecord::Points { path, colors, .. } if path == "track/LEC" && colors[0] == gridreplay::telemetry::Rgb::GREY
    )));
}

#[test]
fn test_replay_to_json_lines() {
    let file = write_session();
    let source = SessionSource::from_file(file.path()).unwrap();
    let output = NamedTempFile::new().unwrap();

    let mut target = JsonLinesTarget::create(output.path()).unwrap();
    {
        let mut sink = TelemetrySink::new(&mut target, SinkOptions::default());
        let mut scheduler = Scheduler::new(&source, PacingOptions::accelerated()).unwrap();
        scheduler.run(&mut sink, &AtomicBool::new(false));
        sink.flush().unwrap();
    }
    assert_eq!(target.written(), 14 * 7);
    target.flush().unwrap();

    let records = serde_jsonlines::json_lines::<VisRecord, _>(output.path())
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(records.len(), 14 * 7);
}

#[test]
fn test_replay_is_reproducible() {
    let file = write_session();
    let source = SessionSource::from_file(file.path()).unwrap();

    let replay = || {
        let mut target = RecordingTarget::default();
        let mut sink = TelemetrySink::new(&mut target, SinkOptions::default());
        Scheduler::new(&source, PacingOptions::accelerated())
            .unwrap()
            .run(&mut sink, &AtomicBool::new(false));
        target.records
    };
    assert_eq!(replay(), replay());
}

#[test]
fn test_stopped_replay_emits_nothing() {
    let file = write_session();
    let source = SessionSource::from_file(file.path()).unwrap();

    let mut target = RecordingTarget::default();
    let mut sink = TelemetrySink::new(&mut target, SinkOptions::default());
    let mut scheduler = Scheduler::new(&source, PacingOptions::default()).unwrap();
    let stats = scheduler.run(&mut sink, &AtomicBool::new(true));

    assert_eq!(stats.emitted, 0);
    assert_eq!(scheduler.state(), SessionState::Running);
    assert!(target.records.is_empty());
}

#[test]
fn test_unknown_entity() {
    let file = write_session();
    let source = SessionSource::from_file(file.path()).unwrap();
    assert!(matches!(
        source.build_stream(&EntityId::from("44"), std::time::Instant::now()),
        Err(ReplayError::UnknownEntity { .. })
    ));
}
