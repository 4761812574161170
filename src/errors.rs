// Error types for gridreplay

use snafu::Snafu;
use std::io;

use crate::telemetry::EntityId;

#[derive(Debug, Snafu)]
pub enum ReplayError {
    // Replay errors
    #[snafu(display("Telemetry stream for {entity} has no samples left"))]
    StreamExhausted { entity: EntityId },
    #[snafu(display("Unknown entity {entity}, not part of this session"))]
    UnknownEntity { entity: EntityId },

    // Sink errors
    #[snafu(display("Invalid color format: {value:?}, expected 6 hex digits"))]
    InvalidColorFormat { value: String },
    #[snafu(display("Visualization sink error: {description}"))]
    SinkError { description: String },

    // Session file errors
    #[snafu(display("Error reading session file"))]
    SessionFileError { source: io::Error },
    #[snafu(display("Invalid session file: {reason}"))]
    SessionParseError { reason: String },
    #[snafu(display("Record at line {line} refers to undeclared driver {driver}"))]
    UndeclaredDriver { driver: EntityId, line: usize },

    // Output errors
    #[snafu(display("Error writing visualization records"))]
    WriterError { source: io::Error },

    // Config management errors
    #[snafu(display("Invalid configuration: {field} - {reason}"))]
    InvalidConfig { field: String, reason: String },
    #[snafu(display("Could not find application config directory"))]
    NoConfigDir,
    #[snafu(display("Error accessing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },
}
