use criterion::{Criterion, black_box, criterion_group, criterion_main};
use gridreplay::replay::PacingOptions;
use gridreplay::sink::{CountingTarget, SinkOptions};
use gridreplay::telemetry::{DriverTelemetry, Entity, Sample, Session, parse_team_color};
use gridreplay::{Scheduler, SessionSource, TelemetrySink};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

fn create_session(drivers: usize, samples: usize) -> Session {
    let drivers = (0..drivers)
        .map(|d| {
            let samples = (0..samples)
                .map(|i| Sample {
                    // ~4Hz with a per-driver phase, like position data from a timing feed
                    timestamp_ms: (i * 250 + d * 13) as u64,
                    x: i as f32,
                    y: d as f32,
                    speed: 250.0,
                    rpm: 11_000.0,
                    gear: 7,
                    throttle: 100.0,
                    brake: 0.0,
                    lap_number: Some((i / 360) as u32 + 1),
                })
                .collect();
            DriverTelemetry::new(
                Entity::new(d.to_string(), format!("D{:02}", d), "FF8000"),
                samples,
            )
        })
        .collect();
    Session::new(drivers)
}

fn bench_scheduler(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler");

    for (drivers, samples) in [(2, 1_000), (20, 1_000)] {
        let source = SessionSource::new(create_session(drivers, samples));
        group.bench_function(format!("drain_{}x{}", drivers, samples), |b| {
            b.iter(|| {
                let mut scheduler =
                    Scheduler::new(&source, PacingOptions::accelerated()).unwrap();
                let mut emitted = 0;
                while let Some(batch) = scheduler.next_batch() {
                    emitted += batch.len();
                }
                black_box(emitted)
            });
        });
    }

    group.finish();
}

fn bench_replay_to_sink(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    let source = SessionSource::new(create_session(20, 1_000));
    let stop = AtomicBool::new(false);

    group.bench_function("replay_20x1000_counting", |b| {
        b.iter(|| {
            let mut target = CountingTarget::default();
            let mut sink = TelemetrySink::new(&mut target, SinkOptions::default());
            Scheduler::new(&source, PacingOptions::accelerated())
                .unwrap()
                .run(&mut sink, &stop);
            black_box(target.records)
        });
    });

    group.finish();
}

fn bench_color(c: &mut Criterion) {
    c.bench_function("parse_team_color", |b| {
        b.iter(|| black_box(parse_team_color(black_box("3671C6")).unwrap()));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(100);
    targets = bench_scheduler, bench_replay_to_sink, bench_color
}
criterion_main!(benches);
