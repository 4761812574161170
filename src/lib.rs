// Library interface for gridreplay
// This allows integration tests to access internal modules

pub mod config;
pub mod errors;
pub mod replay;
pub mod sink;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use config::{ReplayConfig, ReplayMode, TimeAxis, TimelineLayout};
pub use errors::ReplayError;
pub use replay::{EntityStream, PartitionedSource, Scheduler, SessionSource};
pub use sink::{BatchSink, TelemetrySink, VisualizationTarget};
pub use telemetry::{Entity, EntityId, Sample, Session};
