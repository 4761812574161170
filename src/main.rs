use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use clap::{Parser, Subcommand};
use gridreplay::{
    PartitionedSource, ReplayConfig, ReplayError, ReplayMode, Scheduler, SessionSource, TimeAxis,
    TimelineLayout,
    replay::{PacingOptions, ReplayStats},
    sink::{CountingTarget, SinkOptions, TelemetrySink, VisualizationTarget},
    writer::JsonLinesTarget,
};
use log::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded session, paced like the original
    Replay {
        #[arg(short, long)]
        input: PathBuf,

        /// Write visualization records as JSON Lines instead of only counting them
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum)]
        mode: Option<ReplayMode>,

        #[arg(short, long)]
        speed: Option<f64>,

        #[arg(long, value_enum)]
        time_axis: Option<TimeAxis>,

        #[arg(long, value_enum)]
        timeline: Option<TimelineLayout>,

        /// Config file to use instead of the one in the user config directory
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Store the effective settings in the user config directory
        #[arg(long)]
        save_config: bool,
    },
    /// Show the drivers and reference path of a recorded session
    Inspect {
        #[arg(short, long)]
        input: PathBuf,
    },
}

struct ReplayArgs<'a> {
    input: &'a Path,
    output: Option<&'a Path>,
    mode: Option<ReplayMode>,
    speed: Option<f64>,
    time_axis: Option<TimeAxis>,
    timeline: Option<TimelineLayout>,
    config: Option<&'a Path>,
    save_config: bool,
}

fn load_config(args: &ReplayArgs<'_>) -> Result<ReplayConfig, ReplayError> {
    let mut config = match args.config {
        Some(path) => ReplayConfig::from_file(path)?,
        None => ReplayConfig::from_local_file()?.unwrap_or_default(),
    };
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(speed) = args.speed {
        config.speed_multiplier = speed;
    }
    if let Some(time_axis) = args.time_axis {
        config.time_axis = time_axis;
    }
    if let Some(timeline) = args.timeline {
        config.timeline_layout = timeline;
    }
    config.validate()?;
    if args.save_config {
        let path = config.save()?;
        info!("Saved config to {:?}", path);
    }
    Ok(config)
}

fn run_session<T: VisualizationTarget>(
    source: &SessionSource,
    config: &ReplayConfig,
    target: &mut T,
    stop: &AtomicBool,
) -> Result<ReplayStats, ReplayError> {
    let mut sink = TelemetrySink::new(target, SinkOptions::from_config(config)?);
    sink.log_reference_path(source.reference_path())?;

    let mut scheduler = Scheduler::new(source, PacingOptions::from(config))?;
    let stats = scheduler.run(&mut sink, stop);
    if sink.skipped() > 0 {
        info!("{} samples could not be projected", sink.skipped());
    }
    sink.flush()?;
    Ok(stats)
}

fn replay(args: ReplayArgs<'_>, stop: &AtomicBool) -> Result<(), ReplayError> {
    let config = load_config(&args)?;
    let source = SessionSource::from_file(args.input)?;

    let (stats, records) = match args.output {
        Some(output) => {
            let mut target = JsonLinesTarget::create(output)?;
            let stats = run_session(&source, &config, &mut target, stop)?;
            (stats, target.written())
        }
        None => {
            let mut target = CountingTarget::default();
            let stats = run_session(&source, &config, &mut target, stop)?;
            (stats, target.records)
        }
    };

    println!(
        "Replayed {} samples from {} drivers as {} records in {:?}",
        stats.emitted,
        stats.emitted_per_entity.len(),
        records,
        stats.wall_time
    );
    Ok(())
}

fn inspect(input: &Path) -> Result<(), ReplayError> {
    let source = SessionSource::from_file(input)?;
    for driver in &source.session().drivers {
        let entity = &driver.entity;
        let color = entity
            .color()
            .map(|c| format!("{:?}", c))
            .unwrap_or_else(|e| e.to_string());
        let duration_s = match (driver.samples.first(), driver.samples.last()) {
            (Some(first), Some(last)) => {
                last.timestamp_ms.saturating_sub(first.timestamp_ms) as f64 / 1000.
            }
            _ => 0.,
        };
        println!(
            "{:>4} {:<4} {:>8} samples {:>9.1}s  {}",
            entity.id,
            entity.abbreviation,
            driver.samples.len(),
            duration_s,
            color
        );
    }
    println!(
        "{} drivers, reference path with {} points",
        source.list_entities().len(),
        source.reference_path().len()
    );
    Ok(())
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let cli = Args::parse();
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        handler_stop.store(true, Ordering::Relaxed);
    })
    .expect("Could not set Ctrl-C handler");

    match &cli.command {
        Commands::Replay {
            input,
            output,
            mode,
            speed,
            time_axis,
            timeline,
            config,
            save_config,
        } => {
            let args = ReplayArgs {
                input: input.as_path(),
                output: output.as_deref(),
                mode: *mode,
                speed: *speed,
                time_axis: *time_axis,
                timeline: *timeline,
                config: config.as_deref(),
                save_config: *save_config,
            };
            replay(args, &stop).expect("Error while replaying session");
        }
        Commands::Inspect { input } => {
            inspect(input).expect("Error while inspecting session file");
        }
    };
}
